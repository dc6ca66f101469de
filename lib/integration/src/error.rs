//! Error types for the integration crate.
//!
//! Clients report per-call failures as `CollaboratorError` (defined by the
//! workflow crate, since handlers consume it). `IntegrationError` covers
//! building the clients themselves.

use merlinflow_workflow::CollaboratorError;
use std::fmt;

/// Errors while constructing service clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// The HTTP client could not be created.
    ClientBuild { details: String },
    /// A configured service URL is unusable.
    InvalidUrl { url: String, reason: String },
    /// The configured token cannot be sent as a header.
    InvalidToken { reason: String },
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientBuild { details } => write!(f, "failed to build HTTP client: {details}"),
            Self::InvalidUrl { url, reason } => write!(f, "invalid service URL '{url}': {reason}"),
            Self::InvalidToken { reason } => write!(f, "invalid service token: {reason}"),
        }
    }
}

impl std::error::Error for IntegrationError {}

/// Classifies a transport failure.
pub(crate) fn request_failure(service: &str, err: &reqwest::Error) -> CollaboratorError {
    let service = service.to_string();
    if err.is_timeout() {
        CollaboratorError::Timeout { service }
    } else if err.is_builder() {
        CollaboratorError::InvalidRequest {
            service,
            details: err.to_string(),
        }
    } else if err.is_decode() {
        CollaboratorError::InvalidResponse {
            service,
            details: err.to_string(),
        }
    } else {
        CollaboratorError::Unavailable {
            service,
            details: err.to_string(),
        }
    }
}
