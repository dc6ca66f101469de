//! Client for the automation backend's context and image tools.

use crate::client::{join_url, json_body, send};
use async_trait::async_trait;
use merlinflow_workflow::{
    CollaboratorError, ContextGenerator, ContextRequest, ImageGenerator, ImageRequest,
};
use reqwest::{Client as HttpClient, RequestBuilder};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CONTEXT_SERVICE: &str = "context-generation";
const IMAGE_SERVICE: &str = "image-generation";
const CONTEXT_PATH: &str = "v1/superAutomationTools/context-generate-sat";
const IMAGE_PATH: &str = "v1/superAutomationTools/image-generate-sat";

#[derive(Serialize)]
struct Envelope<T> {
    config: T,
}

#[derive(Deserialize)]
struct ContextResponse {
    context: String,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: ImageData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageData {
    sheet_url: String,
}

/// Calls the automation backend.
#[derive(Debug, Clone)]
pub struct AutomationClient {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl AutomationClient {
    #[must_use]
    pub fn new(http: HttpClient, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    fn post<T: Serialize>(&self, path: &str, config: &T) -> RequestBuilder {
        let request = self
            .http
            .post(join_url(&self.base_url, path))
            .json(&Envelope { config });
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ContextGenerator for AutomationClient {
    #[instrument(skip_all)]
    async fn generate_context(
        &self,
        request: ContextRequest,
    ) -> Result<String, Report<CollaboratorError>> {
        let response = send(CONTEXT_SERVICE, self.post(CONTEXT_PATH, &request)).await?;
        let body: ContextResponse = json_body(CONTEXT_SERVICE, response).await?;
        debug!(length = body.context.len(), "Generated context");
        Ok(body.context)
    }
}

#[async_trait]
impl ImageGenerator for AutomationClient {
    #[instrument(skip_all, fields(columns = request.columns.len()))]
    async fn generate(&self, request: ImageRequest) -> Result<String, Report<CollaboratorError>> {
        let response = send(IMAGE_SERVICE, self.post(IMAGE_PATH, &request)).await?;
        let body: ImageResponse = json_body(IMAGE_SERVICE, response).await?;
        debug!(sheet_url = %body.data.sheet_url, "Generated images");
        Ok(body.data.sheet_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::Json;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use serde_json::{Value as JsonValue, json};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(Option<String>, JsonValue)>>>;

    fn backend(captured: Captured) -> Router {
        let context_seen = captured.clone();
        let image_seen = captured;
        Router::new()
            .route(
                "/v1/superAutomationTools/context-generate-sat",
                post(move |headers: HeaderMap, Json(body): Json<JsonValue>| {
                    let seen = context_seen.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push((auth, body));
                        Json(json!({ "context": "A friendly summary" }))
                    }
                }),
            )
            .route(
                "/v1/superAutomationTools/image-generate-sat",
                post(move |Json(body): Json<JsonValue>| {
                    let seen = image_seen.clone();
                    async move {
                        seen.lock().unwrap().push((None, body));
                        Json(json!({ "data": { "sheetUrl": "https://sheets/out" } }))
                    }
                }),
            )
    }

    #[tokio::test]
    async fn context_request_is_wrapped_in_config() {
        let captured = Captured::default();
        let base = serve(backend(captured.clone())).await;
        let client = AutomationClient::new(HttpClient::new(), base, Some("secret".to_string()));

        let context = client
            .generate_context(ContextRequest {
                content: json!([{ "col": "x" }]),
                content_type: Some("sheet".to_string()),
                prompt: "Summarize".to_string(),
            })
            .await
            .expect("context");

        assert_eq!(context, "A friendly summary");
        let captured = captured.lock().unwrap();
        assert_eq!(captured[0].0.as_deref(), Some("Bearer secret"));
        assert_eq!(
            captured[0].1,
            json!({ "config": {
                "content": [{ "col": "x" }],
                "contentType": "sheet",
                "prompt": "Summarize",
            }})
        );
    }

    #[tokio::test]
    async fn image_request_returns_sheet_url() {
        let captured = Captured::default();
        let base = serve(backend(captured.clone())).await;
        let client = AutomationClient::new(HttpClient::new(), base, None);

        let url = client
            .generate(ImageRequest {
                prompt: "a cat".to_string(),
                columns: vec!["name".to_string()],
                data: json!([{ "name": "cat" }]),
            })
            .await
            .expect("image");

        assert_eq!(url, "https://sheets/out");
        assert_eq!(
            captured.lock().unwrap()[0].1,
            json!({ "config": {
                "prompt": "a cat",
                "columns": ["name"],
                "data": [{ "name": "cat" }],
            }})
        );
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let router = Router::new().route(
            "/v1/superAutomationTools/context-generate-sat",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let base = serve(router).await;
        let client = AutomationClient::new(HttpClient::new(), base, None);

        let err = client
            .generate_context(ContextRequest {
                content: json!([]),
                content_type: None,
                prompt: String::new(),
            })
            .await
            .unwrap_err();
        assert!(err.current_context().is_transient());
        assert_eq!(err.current_context().service(), CONTEXT_SERVICE);
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let router = Router::new().route(
            "/v1/superAutomationTools/image-generate-sat",
            post(|| async { Json(json!({ "data": {} })) }),
        );
        let base = serve(router).await;
        let client = AutomationClient::new(HttpClient::new(), base, None);

        let err = client
            .generate(ImageRequest {
                prompt: String::new(),
                columns: Vec::new(),
                data: json!([]),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            CollaboratorError::InvalidResponse { .. }
        ));
    }
}
