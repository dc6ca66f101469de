//! Contracts for the external services node handlers call.
//!
//! The workflow crate only defines the traits; `merlinflow-integration`
//! provides HTTP implementations and [`crate::testing`] provides in-memory
//! doubles.

use crate::node::{HttpMethod, NodeKind};
use async_trait::async_trait;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Failures talking to an external service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The service could not be reached.
    Unavailable { service: String, details: String },
    /// The service did not answer in time.
    Timeout { service: String },
    /// The service answered with a non-success status.
    Status {
        service: String,
        status: u16,
        body: String,
    },
    /// The response body did not have the expected shape.
    InvalidResponse { service: String, details: String },
    /// The request could not be built from the node's inputs.
    InvalidRequest { service: String, details: String },
}

impl CollaboratorError {
    /// Returns true if repeating the call might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::InvalidResponse { .. } | Self::InvalidRequest { .. } => false,
        }
    }

    /// Returns the name of the service that failed.
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::Unavailable { service, .. }
            | Self::Timeout { service }
            | Self::Status { service, .. }
            | Self::InvalidResponse { service, .. }
            | Self::InvalidRequest { service, .. } => service,
        }
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { service, details } => {
                write!(f, "{service} unavailable: {details}")
            }
            Self::Timeout { service } => write!(f, "{service} timed out"),
            Self::Status {
                service,
                status,
                body,
            } => write!(f, "{service} returned status {status}: {body}"),
            Self::InvalidResponse { service, details } => {
                write!(f, "{service} returned an invalid response: {details}")
            }
            Self::InvalidRequest { service, details } => {
                write!(f, "invalid request for {service}: {details}")
            }
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// Input to context generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextRequest {
    /// Sheet rows the context is generated from.
    pub content: JsonValue,
    /// How the content should be interpreted.
    pub content_type: Option<String>,
    /// The user's prompt.
    pub prompt: String,
}

/// Input to image generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Prompt template applied per row.
    pub prompt: String,
    /// Columns selected on the sheet node.
    pub columns: Vec<String>,
    /// Sheet rows, exactly as the sheet node produced them.
    pub data: JsonValue,
}

/// A notification about a finished upstream node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Kind of the node being reported on.
    pub source: NodeKind,
    /// Rendered message text.
    pub message: String,
    /// The upstream node's data (a sheet URL or report text).
    pub payload: JsonValue,
}

impl Notification {
    /// Builds the notification for an upstream result.
    #[must_use]
    pub fn for_source(source: NodeKind, payload: JsonValue) -> Self {
        let text = match &payload {
            JsonValue::String(text) => text.clone(),
            JsonValue::Null => String::new(),
            other => other.to_string(),
        };
        let message = match source {
            NodeKind::ImageGeneration => {
                format!("Hi your task is done. Here is the link: {text}")
            }
            _ => text,
        };
        Self {
            source,
            message,
            payload,
        }
    }
}

/// Acknowledgement returned by the notification service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// Raw acknowledgement body.
    #[serde(default)]
    pub details: JsonValue,
}

/// A generic outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

/// Fetches tabular rows from a shared spreadsheet link.
#[async_trait]
pub trait SheetFetcher: Send + Sync {
    /// Returns one JSON object per data row, keyed by header.
    async fn fetch_rows(&self, link: &str) -> Result<Vec<JsonValue>, Report<CollaboratorError>>;
}

/// Generates context text from sheet content.
#[async_trait]
pub trait ContextGenerator: Send + Sync {
    async fn generate_context(
        &self,
        request: ContextRequest,
    ) -> Result<String, Report<CollaboratorError>>;
}

/// Generates images for sheet rows.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the URL of the sheet the images were written to.
    async fn generate(&self, request: ImageRequest) -> Result<String, Report<CollaboratorError>>;
}

/// Analyzes a crypto portfolio.
#[async_trait]
pub trait PortfolioAnalyzer: Send + Sync {
    /// Returns the report text for the given holdings rows.
    async fn analyze(&self, rows: JsonValue) -> Result<String, Report<CollaboratorError>>;
}

/// Delivers notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification)
    -> Result<Delivery, Report<CollaboratorError>>;
}

/// Sends arbitrary HTTP requests.
#[async_trait]
pub trait HttpRequester: Send + Sync {
    /// Returns the response body, parsed as JSON when possible.
    async fn send(&self, request: ApiRequest) -> Result<JsonValue, Report<CollaboratorError>>;
}

/// The full set of collaborators the standard handlers need.
#[derive(Clone)]
pub struct Collaborators {
    pub sheets: Arc<dyn SheetFetcher>,
    pub context: Arc<dyn ContextGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub portfolio: Arc<dyn PortfolioAnalyzer>,
    pub notifier: Arc<dyn Notifier>,
    pub http: Arc<dyn HttpRequester>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
