//! Client for the crypto portfolio analysis service.

use crate::client::{json_body, send};
use async_trait::async_trait;
use merlinflow_workflow::{CollaboratorError, PortfolioAnalyzer};
use reqwest::Client as HttpClient;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::instrument;

const SERVICE: &str = "crypto-analysis";

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    data: &'a JsonValue,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    data: String,
}

/// Sends portfolio rows for analysis and returns the report text.
#[derive(Debug, Clone)]
pub struct CryptoAnalysisClient {
    http: HttpClient,
    url: String,
}

impl CryptoAnalysisClient {
    #[must_use]
    pub fn new(http: HttpClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PortfolioAnalyzer for CryptoAnalysisClient {
    #[instrument(skip_all)]
    async fn analyze(&self, rows: JsonValue) -> Result<String, Report<CollaboratorError>> {
        let request = self.http.post(&self.url).json(&AnalysisRequest { data: &rows });
        let response = send(SERVICE, request).await?;
        let body: AnalysisResponse = json_body(SERVICE, response).await?;
        Ok(body.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    #[tokio::test]
    async fn posts_rows_and_returns_report() {
        let router = Router::new().route(
            "/api/getCryptoNewsData",
            post(|Json(body): Json<JsonValue>| async move {
                let count = body["data"].as_array().map_or(0, Vec::len);
                Json(json!({ "data": format!("{count} holdings analyzed") }))
            }),
        );
        let base = serve(router).await;
        let client = CryptoAnalysisClient::new(
            HttpClient::new(),
            format!("{base}/api/getCryptoNewsData"),
        );

        let report = client
            .analyze(json!([
                { "Coin": "Bitcoin", "Symbol": "BTC", "Holding": "0.5" },
                { "Coin": "Ether", "Symbol": "ETH", "Holding": "2" },
            ]))
            .await
            .expect("report");
        assert_eq!(report, "2 holdings analyzed");
    }

    #[tokio::test]
    async fn unreachable_service_is_transient() {
        let client = CryptoAnalysisClient::new(HttpClient::new(), "http://127.0.0.1:9/analyze");
        let err = client.analyze(json!([])).await.unwrap_err();
        assert!(err.current_context().is_transient());
    }
}
