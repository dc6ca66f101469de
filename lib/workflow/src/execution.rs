//! Per-node visit state and execution events.
//!
//! The walker keeps one [`NodeExecution`] per graph vertex. Each record moves
//! through `Pending -> Resolving -> Executing -> Completed | Failed` at most
//! once per run; observers receive an [`ExecutionEvent`] at every step that
//! matters to the outside.

use crate::error::ErrorKind;
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use merlinflow_core::{NodeExecutionId, RunId};
use serde::{Deserialize, Serialize};

/// Where a node is in its single visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitState {
    /// Not yet reached, or waiting for predecessors.
    Pending,
    /// Declared dependencies are being looked up.
    Resolving,
    /// The handler is running.
    Executing,
    /// The node produced a result.
    Completed,
    /// The node failed; the run is aborting.
    Failed,
}

/// Execution record for a single node within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    /// Unique identifier for this node execution.
    pub id: NodeExecutionId,
    /// The node being executed.
    pub node_id: NodeId,
    /// Current visit state.
    pub state: VisitState,
    /// When the handler was invoked.
    pub started_at: Option<DateTime<Utc>>,
    /// When the visit finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Error message if failed.
    pub error: Option<String>,
}

impl NodeExecution {
    /// Creates a new record in pending state.
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            id: NodeExecutionId::new(),
            node_id,
            state: VisitState::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Starts resolving the node's dependencies.
    pub fn resolve(&mut self) {
        self.state = VisitState::Resolving;
    }

    /// Starts running the handler.
    pub fn execute(&mut self) {
        self.state = VisitState::Executing;
        self.started_at = Some(Utc::now());
    }

    /// Marks the node as completed.
    pub fn complete(&mut self) {
        self.state = VisitState::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Marks the node as failed.
    pub fn fail(&mut self, error: String) {
        self.state = VisitState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    /// Returns how long the handler ran, if it has finished.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

/// Events emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// Traversal began.
    RunStarted {
        run_id: RunId,
        node_count: usize,
        timestamp: DateTime<Utc>,
    },
    /// A node's handler was invoked.
    NodeStarted {
        run_id: RunId,
        execution_id: NodeExecutionId,
        node_id: NodeId,
        node_type: String,
        timestamp: DateTime<Utc>,
    },
    /// A node produced its result.
    NodeCompleted {
        run_id: RunId,
        execution_id: NodeExecutionId,
        node_id: NodeId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A node failed.
    NodeFailed {
        run_id: RunId,
        execution_id: NodeExecutionId,
        node_id: NodeId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Every reachable node completed.
    RunCompleted {
        run_id: RunId,
        completed_nodes: usize,
        timestamp: DateTime<Utc>,
    },
    /// The run was aborted or rejected.
    RunFailed {
        run_id: RunId,
        kind: ErrorKind,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    /// Returns the run ID associated with this event.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::NodeStarted { run_id, .. }
            | Self::NodeCompleted { run_id, .. }
            | Self::NodeFailed { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunFailed { run_id, .. } => *run_id,
        }
    }

    /// Returns the node this event concerns, if any.
    #[must_use]
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. } => Some(node_id),
            Self::RunStarted { .. } | Self::RunCompleted { .. } | Self::RunFailed { .. } => None,
        }
    }

    /// Returns the timestamp of this event.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::RunStarted { timestamp, .. }
            | Self::NodeStarted { timestamp, .. }
            | Self::NodeCompleted { timestamp, .. }
            | Self::NodeFailed { timestamp, .. }
            | Self::RunCompleted { timestamp, .. }
            | Self::RunFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// Receives execution events as a run progresses.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_execution_lifecycle() {
        let mut exec = NodeExecution::new(NodeId::from("g1"));
        assert_eq!(exec.state, VisitState::Pending);
        assert!(exec.duration().is_none());

        exec.resolve();
        assert_eq!(exec.state, VisitState::Resolving);

        exec.execute();
        assert_eq!(exec.state, VisitState::Executing);
        assert!(exec.started_at.is_some());

        exec.complete();
        assert_eq!(exec.state, VisitState::Completed);
        assert!(exec.duration().is_some());
    }

    #[test]
    fn failed_execution_keeps_error() {
        let mut exec = NodeExecution::new(NodeId::from("i1"));
        exec.resolve();
        exec.fail("no google-integration predecessor".to_string());
        assert_eq!(exec.state, VisitState::Failed);
        assert_eq!(
            exec.error.as_deref(),
            Some("no google-integration predecessor")
        );
    }

    #[test]
    fn execution_event_serde_roundtrip() {
        let execution_id = NodeExecutionId::new();
        let event = ExecutionEvent::NodeCompleted {
            run_id: RunId::new(),
            execution_id,
            node_id: NodeId::from("s1"),
            duration_ms: 3,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "node_completed");
        assert_eq!(json["execution_id"], serde_json::to_value(execution_id).expect("id"));
        let parsed: ExecutionEvent = serde_json::from_value(json).expect("deserialize");

        assert_eq!(event.run_id(), parsed.run_id());
        assert_eq!(parsed.node_id(), Some(&NodeId::from("s1")));
        assert_eq!(parsed, event);
    }
}
