//! HTTP error responses for failed runs.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use merlinflow_workflow::{ErrorKind, ExecutionContext, NodeId, RunError, RunFailure};
use serde::Serialize;
use tracing::warn;

/// Maps an error kind to the response status.
#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Configuration | ErrorKind::Dependency | ErrorKind::Cycle => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::Collaborator => StatusCode::BAD_GATEWAY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetails {
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_id: Option<NodeId>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    details: ErrorDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<ExecutionContext>,
}

/// A failed request, rendered as `{error, details, results?}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// A request body that is not a workflow submission.
    #[must_use]
    pub fn invalid_body(rejection: &JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: format!("invalid request body: {}", rejection.body_text()),
                details: ErrorDetails {
                    kind: ErrorKind::Validation,
                    node_id: None,
                },
                results: None,
            },
        }
    }

    /// Returns the response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RunFailure> for ApiError {
    fn from(failure: RunFailure) -> Self {
        let kind = failure.error.kind();
        let results = match failure.error {
            RunError::Execution(_) => Some(failure.partial),
            RunError::Validation(_) => None,
        };
        Self {
            status: status_for(kind),
            body: ErrorBody {
                error: failure.error.to_string(),
                details: ErrorDetails {
                    kind,
                    node_id: failure.error.node_id().cloned(),
                },
                results,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(
            status = self.status.as_u16(),
            kind = %self.body.details.kind,
            error = %self.body.error,
            "Request failed"
        );
        (self.status, Json(self.body)).into_response()
    }
}
