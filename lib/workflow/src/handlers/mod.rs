//! Standard handlers, one per node kind.

mod api;
mod crypto;
mod flow;
mod image;
mod llm;
mod notify;
mod sheets;

pub use api::{ApiRequestHandler, extract_output_fields};
pub use crypto::CryptoAnalyzerHandler;
pub use flow::{EndHandler, StartHandler};
pub use image::ImageGenerationHandler;
pub use llm::LlmHandler;
pub use notify::TextMessageHandler;
pub use sheets::GoogleIntegrationHandler;

use crate::collaborator::{CollaboratorError, Collaborators};
use crate::error::HandlerError;
use crate::node::Node;
use crate::registry::{NodeHandler, ResolvedInput};
use crate::retry::RetryPolicy;
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Builds one handler per node kind over the given collaborators.
pub(crate) fn standard(
    collaborators: Collaborators,
    retry: RetryPolicy,
) -> Vec<Arc<dyn NodeHandler>> {
    vec![
        Arc::new(StartHandler),
        Arc::new(EndHandler),
        Arc::new(GoogleIntegrationHandler::new(collaborators.sheets, retry)),
        Arc::new(LlmHandler::new(collaborators.context, retry)),
        Arc::new(CryptoAnalyzerHandler::new(collaborators.portfolio, retry)),
        Arc::new(ImageGenerationHandler::new(collaborators.images)),
        Arc::new(TextMessageHandler::new(collaborators.notifier)),
        Arc::new(ApiRequestHandler::new(collaborators.http, retry)),
    ]
}

fn parse_config<T: DeserializeOwned>(node: &Node) -> Result<T, HandlerError> {
    node.config().map_err(|err| HandlerError::InvalidConfig {
        reason: err.to_string(),
    })
}

fn parse_data<T: DeserializeOwned>(node: &Node) -> Result<T, HandlerError> {
    node.data_as().map_err(|err| HandlerError::InvalidConfig {
        reason: err.to_string(),
    })
}

/// Returns the `data` of a resolved predecessor result.
fn input_data(input: &ResolvedInput) -> Result<JsonValue, HandlerError> {
    input
        .result
        .data
        .clone()
        .ok_or_else(|| HandlerError::MissingInput {
            slot: input.slot.to_string(),
            reason: format!("node {} produced no data", input.node.id),
        })
}

fn collaborator_failure(report: Report<CollaboratorError>) -> HandlerError {
    HandlerError::Collaborator(report.current_context().clone())
}
