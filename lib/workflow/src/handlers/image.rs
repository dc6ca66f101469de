use super::{collaborator_failure, input_data, parse_config};
use crate::collaborator::{ImageGenerator, ImageRequest};
use crate::context::ExecutionResult;
use crate::error::HandlerError;
use crate::node::{Dependency, GoogleIntegrationConfig, ImageGenerationConfig, Node, NodeKind};
use crate::registry::{NodeHandler, ResolvedInputs};
use async_trait::async_trait;
use std::sync::Arc;

/// Generates images for the upstream sheet's rows.
///
/// Each call writes a new sheet; failures are not retried.
pub struct ImageGenerationHandler {
    generator: Arc<dyn ImageGenerator>,
}

impl ImageGenerationHandler {
    #[must_use]
    pub fn new(generator: Arc<dyn ImageGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl NodeHandler for ImageGenerationHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::ImageGeneration
    }

    async fn produce(
        &self,
        node: &Node,
        inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        let config: ImageGenerationConfig = parse_config(node)?;
        let sheet = inputs.require(Dependency::SHEET.slot)?;
        let data = input_data(sheet)?;
        let columns = sheet
            .node
            .config::<GoogleIntegrationConfig>()
            .map(|sheet_config| sheet_config.columns)
            .unwrap_or_default();

        let sheet_url = self
            .generator
            .generate(ImageRequest {
                prompt: config.prompt,
                columns,
                data,
            })
            .await
            .map_err(collaborator_failure)?;

        Ok(ExecutionResult::with_data(sheet_url, "Image generation completed"))
    }
}
