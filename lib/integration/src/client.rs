//! Request helpers shared by the service clients.

use crate::error::{IntegrationError, request_failure};
use merlinflow_core::Result;
use merlinflow_workflow::CollaboratorError;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest response body quoted back in a status error.
const MAX_ERROR_BODY: usize = 512;

/// Builds the HTTP client every service client shares.
pub(crate) fn http_client(timeout: Duration) -> Result<HttpClient, IntegrationError> {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| {
            IntegrationError::ClientBuild {
                details: err.to_string(),
            }
            .into()
        })
}

/// Checks that a configured URL is absolute HTTP(S).
pub(crate) fn require_http_url(url: &str) -> Result<(), IntegrationError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(IntegrationError::InvalidUrl {
            url: url.to_string(),
            reason: "URL must start with http:// or https://".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Joins a base URL and a path with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Sends the request and rejects non-success statuses.
pub(crate) async fn send(
    service: &str,
    request: RequestBuilder,
) -> Result<Response, CollaboratorError> {
    let response = request
        .send()
        .await
        .map_err(|err| request_failure(service, &err))?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(CollaboratorError::Status {
            service: service.to_string(),
            status: status.as_u16(),
            body,
        }
        .into());
    }
    Ok(response)
}

/// Reads a JSON response body.
pub(crate) async fn json_body<T: DeserializeOwned>(
    service: &str,
    response: Response,
) -> Result<T, CollaboratorError> {
    let text = response
        .text()
        .await
        .map_err(|err| request_failure(service, &err))?;
    serde_json::from_str(&text).map_err(|err| {
        CollaboratorError::InvalidResponse {
            service: service.to_string(),
            details: err.to_string(),
        }
        .into()
    })
}
