//! Arbitrary HTTP calls made by `api-request` nodes.

use crate::client::send;
use crate::error::request_failure;
use async_trait::async_trait;
use merlinflow_workflow::{ApiRequest, CollaboratorError, HttpMethod, HttpRequester};
use reqwest::{Client as HttpClient, Method};
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

const SERVICE: &str = "api-request";

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Sends user-configured requests.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    http: HttpClient,
}

impl HttpApiClient {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpRequester for HttpApiClient {
    /// Returns the JSON body, or the raw text as a string when the body is not
    /// JSON.
    #[instrument(skip_all, fields(url = %request.url, method = ?request.method))]
    async fn send(&self, request: ApiRequest) -> Result<JsonValue, Report<CollaboratorError>> {
        let mut builder = self.http.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = send(SERVICE, builder).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| request_failure(SERVICE, &err))?;
        debug!(status = status.as_u16(), length = text.len(), "API request answered");

        if text.is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)))
    }
}
