//! Client for the notification handler.
//!
//! The handler takes the source kind and the raw payload text; it applies its
//! own templates and chooses channels (email for finished image runs,
//! WhatsApp for everything).

use crate::client::send;
use crate::error::request_failure;
use async_trait::async_trait;
use merlinflow_workflow::{CollaboratorError, Delivery, Notification, Notifier};
use reqwest::Client as HttpClient;
use rootcause::prelude::Report;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

const SERVICE: &str = "notification";

#[derive(Serialize)]
struct NotificationRequest<'a> {
    config: NotificationConfig<'a>,
}

#[derive(Serialize)]
struct NotificationConfig<'a> {
    #[serde(rename = "type")]
    source: &'a str,
    message: String,
}

fn payload_text(payload: &JsonValue) -> String {
    match payload {
        JsonValue::String(text) => text.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Delivers notifications through the notification handler.
#[derive(Debug, Clone)]
pub struct NotificationClient {
    http: HttpClient,
    url: String,
}

impl NotificationClient {
    #[must_use]
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for NotificationClient {
    #[instrument(skip_all, fields(source = notification.source.as_str()))]
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<Delivery, Report<CollaboratorError>> {
        let body = NotificationRequest {
            config: NotificationConfig {
                source: notification.source.as_str(),
                message: payload_text(&notification.payload),
            },
        };
        let response = send(SERVICE, self.http.post(&self.url).json(&body)).await?;
        let text = response
            .text()
            .await
            .map_err(|err| request_failure(SERVICE, &err))?;
        let details = serde_json::from_str(&text).unwrap_or(JsonValue::String(text));

        info!(message = %notification.message, "Notification delivered");
        Ok(Delivery { details })
    }
}
