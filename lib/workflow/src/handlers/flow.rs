use crate::context::ExecutionResult;
use crate::error::HandlerError;
use crate::node::{Node, NodeKind};
use crate::registry::{NodeHandler, ResolvedInputs};
use async_trait::async_trait;

/// Marks the beginning of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartHandler;

#[async_trait]
impl NodeHandler for StartHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::Start
    }

    async fn produce(
        &self,
        _node: &Node,
        _inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        Ok(ExecutionResult::message("Workflow started"))
    }
}

/// Marks the end of a branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndHandler;

#[async_trait]
impl NodeHandler for EndHandler {
    fn kind(&self) -> NodeKind {
        NodeKind::End
    }

    async fn produce(
        &self,
        _node: &Node,
        _inputs: &ResolvedInputs,
    ) -> Result<ExecutionResult, HandlerError> {
        Ok(ExecutionResult::message("Workflow completed"))
    }
}
