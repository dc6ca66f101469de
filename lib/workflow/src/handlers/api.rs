use super::{collaborator_failure, parse_config};
use crate::collaborator::{ApiRequest, HttpRequester};
use crate::context::ExecutionResult;
use crate::error::HandlerError;
use crate::node::{ApiRequestConfig, HttpMethod, Node, NodeKind};
use crate::registry::{NodeHandler, ResolvedInputs};
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Calls the configured HTTP endpoint and extracts the requested fields.
pub struct ApiRequestHandler {
    http: Arc<dyn HttpRequester>,
    retry: RetryPolicy,
}

impl ApiRequestHandler {
    #[must_use]
    pub fn new(http: Arc<dyn HttpRequester>, retry: RetryPolicy) -> Self {
        Self { http, retry }
    }
}

#[async_trait]
impl NodeHandler for ApiRequestHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::ApiRequest
    }

    async fn produce(
        &self,
        node: &Node,
        _inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        let config: ApiRequestConfig = parse_config(node)?;
        let request = ApiRequest {
            url: config.url,
            method: config.method,
            headers: config.headers,
            body: match config.method {
                HttpMethod::Get => None,
                _ => config.body,
            },
        };

        let policy = if config.method.is_idempotent() {
            self.retry
        } else {
            RetryPolicy::none()
        };
        let body = with_retry(&policy, "http", || self.http.send(request.clone()))
            .await
            .map_err(collaborator_failure)?;

        Ok(ExecutionResult::with_data(
            extract_output_fields(&body, &config.output_fields),
            "API request completed",
        ))
    }
}

/// Picks dotted paths (`data.items.0.name`) out of a response body.
///
/// Returns the whole body when `fields` is empty. Paths that do not resolve
/// map to `null`.
#[must_use]
pub fn extract_output_fields(body: &JsonValue, fields: &[String]) -> JsonValue {
    if fields.is_empty() {
        return body.clone();
    }
    let extracted: Map<String, JsonValue> = fields
        .iter()
        .map(|field| {
            let value = lookup_path(body, field).cloned().unwrap_or(JsonValue::Null);
            (field.clone(), value)
        })
        .collect();
    JsonValue::Object(extracted)
}

fn lookup_path<'a>(body: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(body, |current, segment| match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::CollaboratorError;
    use crate::testing::MockCollaborators;
    use serde_json::json;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    fn unavailable() -> CollaboratorError {
        CollaboratorError::Unavailable {
            service: "http".to_string(),
            details: "connection reset".to_string(),
        }
    }

    #[test]
    fn extracts_dotted_paths() {
        let body = json!({ "data": { "items": [{ "name": "first" }, { "name": "second" }] }, "total": 2 });
        let fields = vec![
            "data.items.1.name".to_string(),
            "total".to_string(),
            "data.missing".to_string(),
        ];
        assert_eq!(
            extract_output_fields(&body, &fields),
            json!({ "data.items.1.name": "second", "total": 2, "data.missing": null })
        );
    }

    #[test]
    fn no_fields_returns_whole_body() {
        let body = json!({ "ok": true });
        assert_eq!(extract_output_fields(&body, &[]), body);
    }

    #[tokio::test]
    async fn get_drops_body_and_retries() {
        let mocks = MockCollaborators::new();
        mocks.http.fail_next(unavailable());
        mocks.http.respond_with(json!({ "price": 42 }));
        let handler = ApiRequestHandler::new(mocks.http.clone(), fast());
        let node = Node::new("a1", NodeKind::ApiRequest).with_data(json!({
            "config": {
                "url": "https://api.example.com/price",
                "method": "GET",
                "headers": { "Accept": "application/json" },
                "body": "ignored",
                "outputFields": ["price"]
            }
        }));

        let result = handler
            .produce(&node, &ResolvedInputs::new())
            .await
            .expect("produce");

        assert_eq!(result.data, Some(json!({ "price": 42 })));
        assert_eq!(result.message.as_deref(), Some("API request completed"));
        let calls = mocks.http.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].body, None);
        assert_eq!(calls[0].headers.get("Accept").map(String::as_str), Some("application/json"));
    }

    #[tokio::test]
    async fn post_is_not_retried() {
        let mocks = MockCollaborators::new();
        mocks.http.fail_next(unavailable());
        let handler = ApiRequestHandler::new(mocks.http.clone(), fast());
        let node = Node::new("a1", NodeKind::ApiRequest).with_data(json!({
            "config": { "url": "https://api.example.com/orders", "method": "POST", "body": "{\"qty\":1}" }
        }));

        let err = handler
            .produce(&node, &ResolvedInputs::new())
            .await
            .unwrap_err();

        assert_eq!(err, HandlerError::Collaborator(unavailable()));
        let calls = mocks.http.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body.as_deref(), Some("{\"qty\":1}"));
    }
}
