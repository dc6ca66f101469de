//! Service clients for merlinflow.
//!
//! Each client implements one of the collaborator traits the workflow
//! handlers call. [`collaborators`] wires them all up from configuration.

pub mod api;
pub mod automation;
mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod notify;
pub mod sheets;

#[cfg(test)]
mod test_support;

pub use api::HttpApiClient;
pub use automation::AutomationClient;
pub use config::ServicesConfig;
pub use crypto::CryptoAnalysisClient;
pub use error::IntegrationError;
pub use notify::NotificationClient;
pub use sheets::{GoogleSheetsClient, extract_sheet_id, parse_csv_rows};

use merlinflow_core::Result;
use merlinflow_workflow::Collaborators;
use std::sync::Arc;

/// Builds HTTP-backed collaborators for every node kind.
///
/// # Errors
///
/// Returns an error if a configured URL is not absolute or the HTTP client
/// cannot be created.
pub fn collaborators(config: &ServicesConfig) -> Result<Collaborators, IntegrationError> {
    for url in [
        &config.automation_base_url,
        &config.notification_url,
        &config.crypto_analysis_url,
        &config.sheets_export_base_url,
    ] {
        client::require_http_url(url)?;
    }
    if let Some(token) = &config.automation_token
        && token.chars().any(char::is_control)
    {
        return Err(IntegrationError::InvalidToken {
            reason: "token contains control characters".to_string(),
        }
        .into());
    }

    let http = client::http_client(config.request_timeout())?;
    let automation = Arc::new(AutomationClient::new(
        http.clone(),
        config.automation_base_url.clone(),
        config.automation_token.clone(),
    ));

    Ok(Collaborators {
        sheets: Arc::new(GoogleSheetsClient::new(
            http.clone(),
            config.sheets_export_base_url.clone(),
        )),
        context: automation.clone(),
        images: automation,
        portfolio: Arc::new(CryptoAnalysisClient::new(
            http.clone(),
            config.crypto_analysis_url.clone(),
        )),
        notifier: Arc::new(NotificationClient::new(
            http.clone(),
            config.notification_url.clone(),
        )),
        http: Arc::new(HttpApiClient::new(http)),
    })
}
