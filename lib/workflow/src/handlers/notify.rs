use super::{collaborator_failure, input_data};
use crate::collaborator::{Notification, Notifier};
use crate::context::ExecutionResult;
use crate::error::HandlerError;
use crate::node::{Dependency, Node, NodeKind};
use crate::registry::{NodeHandler, ResolvedInputs};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Sends a notification about the upstream image or crypto result.
///
/// Sends are never retried.
pub struct TextMessageHandler {
    notifier: Arc<dyn Notifier>,
}

impl TextMessageHandler {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl NodeHandler for TextMessageHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::TextMessage
    }

    async fn produce(
        &self,
        node: &Node,
        inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        let source = inputs.require(Dependency::NOTIFICATION_SOURCE.slot)?;
        let source_kind = source.node.kind().map_err(|err| HandlerError::MissingInput {
            slot: source.slot.to_string(),
            reason: err.to_string(),
        })?;
        let payload = input_data(source)?;

        self.notifier
            .notify(Notification::for_source(source_kind, payload))
            .await
            .map_err(collaborator_failure)?;
        info!(node_id = %node.id, source = %source.node.id, "Notification sent");

        Ok(ExecutionResult::message("Text message sent").with_status("sent"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::CollaboratorError;
    use crate::registry::ResolvedInput;
    use crate::testing::MockCollaborators;
    use serde_json::json;

    fn from_image() -> ResolvedInputs {
        [ResolvedInput {
            slot: "source",
            node: Node::new("i1", NodeKind::ImageGeneration),
            result: ExecutionResult::with_data("https://x/sheet", "Image generation completed"),
        }]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn sends_link_and_reports_sent() {
        let mocks = MockCollaborators::new();
        let handler = TextMessageHandler::new(mocks.notifier.clone());

        let result = handler
            .produce(&Node::new("t1", NodeKind::TextMessage), &from_image())
            .await
            .expect("produce");

        assert_eq!(result.status.as_deref(), Some("sent"));
        assert_eq!(result.message.as_deref(), Some("Text message sent"));
        let calls = mocks.notifier.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source, NodeKind::ImageGeneration);
        assert_eq!(calls[0].payload, json!("https://x/sheet"));
    }

    #[tokio::test]
    async fn transient_failure_is_not_retried() {
        let mocks = MockCollaborators::new();
        mocks.notifier.fail_next(CollaboratorError::Status {
            service: "notifier".to_string(),
            status: 503,
            body: "busy".to_string(),
        });
        let handler = TextMessageHandler::new(mocks.notifier.clone());

        let err = handler
            .produce(&Node::new("t1", NodeKind::TextMessage), &from_image())
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Collaborator(_)));
        assert_eq!(mocks.notifier.call_count(), 1);
    }

    #[tokio::test]
    async fn source_without_data_sends_nothing() {
        let mocks = MockCollaborators::new();
        let handler = TextMessageHandler::new(mocks.notifier.clone());
        let inputs: ResolvedInputs = [ResolvedInput {
            slot: "source",
            node: Node::new("c1", NodeKind::CryptoAnalyzer),
            result: ExecutionResult::message("Crypto analysis completed"),
        }]
        .into_iter()
        .collect();

        let err = handler
            .produce(&Node::new("t1", NodeKind::TextMessage), &inputs)
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::MissingInput { slot, .. } if slot == "source"));
        assert_eq!(mocks.notifier.call_count(), 0);
    }
}
