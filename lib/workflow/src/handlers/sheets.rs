use super::{collaborator_failure, parse_config};
use crate::collaborator::SheetFetcher;
use crate::context::ExecutionResult;
use crate::error::HandlerError;
use crate::node::{GoogleIntegrationConfig, Node, NodeKind};
use crate::registry::{NodeHandler, ResolvedInputs};
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::debug;

/// Fetches the rows of the configured spreadsheet.
pub struct GoogleIntegrationHandler {
    sheets: Arc<dyn SheetFetcher>,
    retry: RetryPolicy,
}

impl GoogleIntegrationHandler {
    #[must_use]
    pub fn new(sheets: Arc<dyn SheetFetcher>, retry: RetryPolicy) -> Self {
        Self { sheets, retry }
    }
}

#[async_trait]
impl NodeHandler for GoogleIntegrationHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::GoogleIntegration
    }

    async fn produce(
        &self,
        node: &Node,
        _inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        let config: GoogleIntegrationConfig = parse_config(node)?;
        let rows = with_retry(&self.retry, "sheets", || self.sheets.fetch_rows(&config.link))
            .await
            .map_err(collaborator_failure)?;
        debug!(node_id = %node.id, rows = rows.len(), "Fetched sheet rows");

        Ok(ExecutionResult::with_data(
            JsonValue::Array(rows),
            "Google Sheets integration executed",
        ))
    }
}
