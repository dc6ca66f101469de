//! Node handlers and the registry that maps kinds to them.

use crate::collaborator::Collaborators;
use crate::context::ExecutionResult;
use crate::error::{HandlerError, RegistryError};
use crate::handlers;
use crate::node::{Node, NodeKind};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A predecessor result resolved for a node's declared dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    /// The dependency slot this input fills.
    pub slot: &'static str,
    /// The predecessor node.
    pub node: Node,
    /// The predecessor's result.
    pub result: ExecutionResult,
}

/// All inputs resolved for one node invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedInputs {
    inputs: Vec<ResolvedInput>,
}

impl ResolvedInputs {
    /// Creates an empty input set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an input.
    pub fn insert(&mut self, input: ResolvedInput) {
        self.inputs.push(input);
    }

    /// Returns the input for `slot`, if resolved.
    #[must_use]
    pub fn get(&self, slot: &str) -> Option<&ResolvedInput> {
        self.inputs.iter().find(|input| input.slot == slot)
    }

    /// Returns the input for `slot`.
    ///
    /// # Errors
    ///
    /// Returns `MissingInput` when the slot was not resolved.
    pub fn require(&self, slot: &str) -> Result<&ResolvedInput, HandlerError> {
        self.get(slot).ok_or_else(|| HandlerError::MissingInput {
            slot: slot.to_string(),
            reason: "not resolved".to_string(),
        })
    }

    /// Returns the number of resolved inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns true if no inputs were resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl FromIterator<ResolvedInput> for ResolvedInputs {
    fn from_iter<I: IntoIterator<Item = ResolvedInput>>(iter: I) -> Self {
        Self {
            inputs: iter.into_iter().collect(),
        }
    }
}

/// Executes one kind of node.
///
/// Handlers see the node and the results of its declared dependencies; they
/// never touch the graph or the run's context directly.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// The kind this handler serves.
    fn kind(&self) -> NodeKind;

    /// Performs the node's effect and returns its result.
    async fn produce(
        &self,
        node: &Node,
        inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError>;
}

/// Maps every node kind to its handler.
#[derive(Clone)]
pub struct NodeRegistry {
    handlers: HashMap<NodeKind, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> NodeRegistryBuilder {
        NodeRegistryBuilder::default()
    }

    /// Creates a registry with the standard handler for every kind.
    #[must_use]
    pub fn with_collaborators(collaborators: Collaborators, retry: RetryPolicy) -> Self {
        Self {
            handlers: handlers::standard(collaborators, retry)
                .into_iter()
                .map(|handler| (handler.kind(), handler))
                .collect(),
        }
    }

    /// Returns the handler for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no handler is registered for the kind.
    pub fn resolve(&self, kind: NodeKind) -> Result<Arc<dyn NodeHandler>, RegistryError> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or(RegistryError::NotFound { kind })
    }

    /// Returns the kinds with a registered handler.
    #[must_use]
    pub fn kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<NodeKind> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Builder for [`NodeRegistry`].
#[derive(Default)]
pub struct NodeRegistryBuilder {
    handlers: HashMap<NodeKind, Arc<dyn NodeHandler>>,
}

impl NodeRegistryBuilder {
    /// Registers a handler, replacing any earlier handler for its kind.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn NodeHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    /// Registers the standard handler set, leaving earlier registrations in place.
    #[must_use]
    pub fn standard_handlers(mut self, collaborators: Collaborators, retry: RetryPolicy) -> Self {
        for handler in handlers::standard(collaborators, retry) {
            self.handlers.entry(handler.kind()).or_insert(handler);
        }
        self
    }

    /// Finishes the registry.
    ///
    /// # Errors
    ///
    /// Returns `MissingHandler` for the first kind without a handler.
    pub fn build(self) -> Result<NodeRegistry, RegistryError> {
        if let Some(kind) = NodeKind::ALL
            .into_iter()
            .find(|kind| !self.handlers.contains_key(kind))
        {
            return Err(RegistryError::MissingHandler { kind });
        }
        Ok(NodeRegistry {
            handlers: self.handlers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCollaborators;

    struct Fixed(NodeKind);

    #[async_trait]
    impl NodeHandler for Fixed {
        fn kind(&self) -> NodeKind {
            self.0
        }

        async fn produce(
            &self,
            _node: &Node,
            _inputs: &ResolvedInputs,
        ) -> Result<ExecutionResult, HandlerError> {
            Ok(ExecutionResult::message("fixed"))
        }
    }

    #[test]
    fn incomplete_registry_fails_to_build() {
        let err = NodeRegistry::builder()
            .handler(Arc::new(Fixed(NodeKind::Start)))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::MissingHandler {
                kind: NodeKind::End
            }
        );
    }

    #[test]
    fn standard_registry_covers_every_kind() {
        let mocks = MockCollaborators::new();
        let registry = NodeRegistry::with_collaborators(mocks.collaborators(), RetryPolicy::none());
        assert_eq!(registry.kinds(), NodeKind::ALL.to_vec());
        for kind in NodeKind::ALL {
            assert_eq!(registry.resolve(kind).expect("handler").kind(), kind);
        }
    }

    #[tokio::test]
    async fn custom_handler_overrides_standard() {
        let mocks = MockCollaborators::new();
        let registry = NodeRegistry::builder()
            .handler(Arc::new(Fixed(NodeKind::Start)))
            .standard_handlers(mocks.collaborators(), RetryPolicy::none())
            .build()
            .expect("build");

        let handler = registry.resolve(NodeKind::Start).expect("start");
        let result = handler
            .produce(&Node::new("s1", NodeKind::Start), &ResolvedInputs::new())
            .await
            .expect("produce");
        assert_eq!(result.message.as_deref(), Some("fixed"));
    }

    #[test]
    fn resolved_inputs_lookup_by_slot() {
        let inputs: ResolvedInputs = [ResolvedInput {
            slot: "sheet",
            node: Node::new("g1", NodeKind::GoogleIntegration),
            result: ExecutionResult::message("Google Sheets integration executed"),
        }]
        .into_iter()
        .collect();

        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs.require("sheet").expect("sheet").node.id.as_str(), "g1");
        assert!(matches!(
            inputs.require("source"),
            Err(HandlerError::MissingInput { slot, .. }) if slot == "source"
        ));
    }
}
