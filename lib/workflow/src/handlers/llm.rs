use super::{collaborator_failure, input_data, parse_data};
use crate::collaborator::{ContextGenerator, ContextRequest};
use crate::context::ExecutionResult;
use crate::error::HandlerError;
use crate::node::{Dependency, LlmConfig, Node, NodeKind};
use crate::registry::{NodeHandler, ResolvedInputs};
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use std::sync::Arc;

/// Generates context text from the upstream sheet's rows.
pub struct LlmHandler {
    generator: Arc<dyn ContextGenerator>,
    retry: RetryPolicy,
}

impl LlmHandler {
    #[must_use]
    pub fn new(generator: Arc<dyn ContextGenerator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }
}

#[async_trait]
impl NodeHandler for LlmHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Llm
    }

    async fn produce(
        &self,
        node: &Node,
        inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        let config: LlmConfig = parse_data(node)?;
        let content = input_data(inputs.require(Dependency::SHEET.slot)?)?;
        let request = ContextRequest {
            content,
            content_type: config.content_type,
            prompt: config.input,
        };

        let context = with_retry(&self.retry, "context-generator", || {
            self.generator.generate_context(request.clone())
        })
        .await
        .map_err(collaborator_failure)?;

        Ok(ExecutionResult::with_data(context, "Context generation completed"))
    }
}
