//! Endpoints and limits for the external services.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the collaborator services live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Base URL of the automation backend (context and image generation).
    pub automation_base_url: String,
    /// Bearer token for the automation backend.
    pub automation_token: Option<String>,
    /// Notification handler endpoint.
    pub notification_url: String,
    /// Crypto portfolio analysis endpoint.
    pub crypto_analysis_url: String,
    /// Base URL spreadsheets are exported from.
    pub sheets_export_base_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            automation_base_url: "http://localhost:8080".to_string(),
            automation_token: None,
            notification_url: "http://localhost:3000/api/notificationHandler".to_string(),
            crypto_analysis_url: "http://localhost:3000/api/getCryptoNewsData".to_string(),
            sheets_export_base_url: "https://docs.google.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ServicesConfig {
    /// Returns the per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
