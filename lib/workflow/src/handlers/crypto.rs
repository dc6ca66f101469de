use super::{collaborator_failure, input_data, parse_config};
use crate::collaborator::PortfolioAnalyzer;
use crate::context::ExecutionResult;
use crate::error::HandlerError;
use crate::node::{CryptoAnalyzerConfig, Dependency, Node, NodeKind};
use crate::registry::{NodeHandler, ResolvedInputs};
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Produces a portfolio report from the upstream sheet's holdings.
pub struct CryptoAnalyzerHandler {
    analyzer: Arc<dyn PortfolioAnalyzer>,
    retry: RetryPolicy,
}

impl CryptoAnalyzerHandler {
    #[must_use]
    pub fn new(analyzer: Arc<dyn PortfolioAnalyzer>, retry: RetryPolicy) -> Self {
        Self { analyzer, retry }
    }
}

#[async_trait]
impl NodeHandler for CryptoAnalyzerHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::CryptoAnalyzer
    }

    async fn produce(
        &self,
        node: &Node,
        inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        let config: Option<CryptoAnalyzerConfig> = parse_config(node)?;
        if let Some(config) = &config {
            debug!(
                node_id = %node.id,
                symbol = config.symbol.as_deref().unwrap_or("*"),
                timeframe = config.timeframe.as_deref().unwrap_or("default"),
                "Analyzing portfolio"
            );
        }
        let rows = input_data(inputs.require(Dependency::SHEET.slot)?)?;

        let report = with_retry(&self.retry, "portfolio-analyzer", || {
            self.analyzer.analyze(rows.clone())
        })
        .await
        .map_err(collaborator_failure)?;

        Ok(ExecutionResult::with_data(report, "Crypto analysis completed"))
    }
}
