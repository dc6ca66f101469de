//! Workflow execution entry point.
//!
//! The executor validates a submitted node list, indexes its connections and
//! walks it from the start node with a fresh [`ExecutionContext`]. Nothing
//! outlives a run except what is handed back to the caller.

use crate::context::ExecutionContext;
use crate::error::{RunError, ValidationError};
use crate::execution::{ExecutionEvent, ExecutionObserver};
use crate::graph::ConnectionIndex;
use crate::node::Node;
use crate::registry::NodeRegistry;
use crate::walker::{GraphWalker, TraversalMode, WalkFailure};
use chrono::Utc;
use merlinflow_core::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, info_span, warn};

/// Limits and scheduling for runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Time budget for a single handler.
    pub node_timeout_secs: u64,
    /// Time budget for a whole run.
    pub run_timeout_secs: u64,
    /// How ready nodes are scheduled.
    pub traversal: TraversalMode,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            node_timeout_secs: 60,
            run_timeout_secs: 300,
            traversal: TraversalMode::Sequential,
        }
    }
}

/// Results of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub results: ExecutionContext,
}

/// A run that did not complete.
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub run_id: RunId,
    pub error: RunError,
    /// Results recorded before the failure.
    pub partial: ExecutionContext,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} failed: {}", self.run_id, self.error)
    }
}

impl std::error::Error for RunFailure {}

/// Runs submitted workflows against a node registry.
#[derive(Clone)]
pub struct WorkflowExecutor {
    registry: Arc<NodeRegistry>,
    config: ExecutorConfig,
    observer: Option<Arc<dyn ExecutionObserver>>,
}

impl WorkflowExecutor {
    /// Creates an executor with default limits.
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            config: ExecutorConfig::default(),
            observer: None,
        }
    }

    /// Sets limits and scheduling.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches an observer for run and node events.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Checks a submitted node list and indexes its connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, IDs repeat, a connection names an
    /// unknown node, or there is not exactly one start node.
    pub fn validate(nodes: Vec<Node>) -> Result<ConnectionIndex, ValidationError> {
        if nodes.is_empty() {
            return Err(ValidationError::EmptyGraph);
        }
        let index = ConnectionIndex::build(nodes)?;
        index.start_node()?;
        Ok(index)
    }

    /// Validates and runs a workflow.
    ///
    /// # Errors
    ///
    /// Returns the failure with any results recorded before it.
    pub async fn run(&self, nodes: Vec<Node>) -> Result<RunReport, RunFailure> {
        let run_id = RunId::new();
        let span = info_span!("workflow_run", run_id = %run_id, node_count = nodes.len());
        self.run_with_id(run_id, nodes).instrument(span).await
    }

    async fn run_with_id(&self, run_id: RunId, nodes: Vec<Node>) -> Result<RunReport, RunFailure> {
        let prepared = Self::validate(nodes).and_then(|index| {
            let start = index.start_node()?.id.clone();
            Ok((index, start))
        });
        let (index, start) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(error = %err, "Rejected workflow");
                return Err(self.failed(run_id, err.into(), ExecutionContext::new()));
            }
        };

        info!(start = %start, "Workflow run started");
        self.emit(ExecutionEvent::RunStarted {
            run_id,
            node_count: index.len(),
            timestamp: Utc::now(),
        });

        let mut walker = GraphWalker::new(&index, &self.registry, run_id)
            .with_node_timeout(Duration::from_secs(self.config.node_timeout_secs))
            .with_run_timeout(Duration::from_secs(self.config.run_timeout_secs))
            .with_traversal(self.config.traversal);
        if let Some(observer) = &self.observer {
            walker = walker.with_observer(observer.as_ref());
        }

        match walker.walk(&start).await {
            Ok(results) => {
                info!(completed_nodes = results.len(), "Workflow run completed");
                self.emit(ExecutionEvent::RunCompleted {
                    run_id,
                    completed_nodes: results.len(),
                    timestamp: Utc::now(),
                });
                Ok(RunReport { run_id, results })
            }
            Err(WalkFailure { error, context }) => {
                error!(
                    error = %error,
                    completed_nodes = context.len(),
                    "Workflow run failed"
                );
                Err(self.failed(run_id, error.into(), context))
            }
        }
    }

    fn failed(&self, run_id: RunId, error: RunError, partial: ExecutionContext) -> RunFailure {
        self.emit(ExecutionEvent::RunFailed {
            run_id,
            kind: error.kind(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
        RunFailure {
            run_id,
            error,
            partial,
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

impl fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::node::NodeKind;
    use crate::retry::RetryPolicy;
    use crate::testing::{MockCollaborators, RecordingObserver};

    fn executor(mocks: &MockCollaborators) -> WorkflowExecutor {
        WorkflowExecutor::new(Arc::new(NodeRegistry::with_collaborators(
            mocks.collaborators(),
            RetryPolicy::none(),
        )))
    }

    #[test]
    fn empty_graph_is_rejected() {
        assert_eq!(
            WorkflowExecutor::validate(Vec::new()).unwrap_err(),
            ValidationError::EmptyGraph
        );
    }

    #[test]
    fn multiple_starts_are_rejected() {
        let err = WorkflowExecutor::validate(vec![
            Node::new("s1", NodeKind::Start),
            Node::new("s2", NodeKind::Start),
        ])
        .unwrap_err();
        assert!(matches!(err, ValidationError::MultipleStartNodes { .. }));
    }

    #[tokio::test]
    async fn start_and_end_only() {
        let mocks = MockCollaborators::new();
        let report = executor(&mocks)
            .run(vec![
                Node::new("s1", NodeKind::Start).with_outgoing("e1"),
                Node::new("e1", NodeKind::End).with_incoming("s1"),
            ])
            .await
            .expect("run");

        assert_eq!(report.results.len(), 2);
        assert_eq!(
            report.results.get(&"e1".into()).expect("e1").message.as_deref(),
            Some("Workflow completed")
        );
        assert_eq!(mocks.total_calls(), 0);
    }

    #[tokio::test]
    async fn rejected_run_emits_run_failed_only() {
        let mocks = MockCollaborators::new();
        let observer = Arc::new(RecordingObserver::new());
        let failure = executor(&mocks)
            .with_observer(observer.clone())
            .run(vec![Node::new("e1", NodeKind::End)])
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Validation);
        assert!(failure.partial.is_empty());
        let events = observer.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ExecutionEvent::RunFailed { kind: ErrorKind::Validation, run_id, .. } if *run_id == failure.run_id
        ));
    }

    #[tokio::test]
    async fn observed_run_brackets_node_events() {
        let mocks = MockCollaborators::new();
        let observer = Arc::new(RecordingObserver::new());
        let report = executor(&mocks)
            .with_observer(observer.clone())
            .run(vec![
                Node::new("s1", NodeKind::Start).with_outgoing("e1"),
                Node::new("e1", NodeKind::End),
            ])
            .await
            .expect("run");

        let events = observer.events();
        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], ExecutionEvent::RunStarted { node_count: 2, .. }));
        assert!(matches!(
            events[5],
            ExecutionEvent::RunCompleted { completed_nodes: 2, .. }
        ));
        assert!(events.iter().all(|event| event.run_id() == report.run_id));
    }
}
