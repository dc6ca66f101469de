//! Graph traversal.
//!
//! The walker starts at the entry node and visits every node reachable from
//! it exactly once. A node is visited only after every predecessor that is
//! itself reachable from the entry node has completed, so fan-in nodes run
//! once, after all of their branches. A cycle reachable from the entry node
//! fails the walk before any handler runs.
//!
//! The walker is the only writer of the [`ExecutionContext`]. In concurrent
//! mode handlers of one wave run together and their results are recorded in
//! wave order once the whole wave has settled.

use crate::context::{ExecutionContext, ExecutionResult};
use crate::error::ExecutionError;
use crate::execution::{ExecutionEvent, ExecutionObserver, NodeExecution, VisitState};
use crate::graph::ConnectionIndex;
use crate::node::{Node, NodeId, NodeKind};
use crate::registry::{NodeHandler, NodeRegistry, ResolvedInput, ResolvedInputs};
use chrono::Utc;
use futures::future::join_all;
use merlinflow_core::{NodeExecutionId, RunId};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span};

/// Stand-in deadline for run budgets too large to add to the clock.
const UNBOUNDED_RUN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// How ready nodes are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalMode {
    /// Depth-first, one node at a time, successors in edge order.
    #[default]
    Sequential,
    /// Every ready node of a wave runs at once.
    Concurrent,
}

/// A walk that stopped early, with whatever completed before it stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkFailure {
    pub error: ExecutionError,
    pub context: ExecutionContext,
}

/// A handler ready to run, with its resolved inputs.
struct Prepared {
    index: NodeIndex,
    execution_id: NodeExecutionId,
    kind: NodeKind,
    handler: Arc<dyn NodeHandler>,
    inputs: ResolvedInputs,
}

/// Walks one workflow from its entry node.
pub struct GraphWalker<'a> {
    index: &'a ConnectionIndex,
    registry: &'a NodeRegistry,
    run_id: RunId,
    node_timeout: Duration,
    run_timeout: Duration,
    traversal: TraversalMode,
    observer: Option<&'a dyn ExecutionObserver>,
}

/// Mutable state of one walk.
struct Walk {
    records: Vec<NodeExecution>,
    reachable: Vec<bool>,
    context: ExecutionContext,
    deadline: Instant,
}

impl<'a> GraphWalker<'a> {
    /// Creates a walker with default timeouts and sequential traversal.
    #[must_use]
    pub fn new(index: &'a ConnectionIndex, registry: &'a NodeRegistry, run_id: RunId) -> Self {
        Self {
            index,
            registry,
            run_id,
            node_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(300),
            traversal: TraversalMode::Sequential,
            observer: None,
        }
    }

    /// Sets the per-handler time budget.
    #[must_use]
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    /// Sets the time budget for the whole walk.
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Sets the traversal mode.
    #[must_use]
    pub fn with_traversal(mut self, traversal: TraversalMode) -> Self {
        self.traversal = traversal;
        self
    }

    /// Attaches an observer for node events.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a dyn ExecutionObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Visits every node reachable from `start`.
    ///
    /// # Errors
    ///
    /// Returns the first error along with the results recorded before it.
    pub async fn walk(&self, start: &NodeId) -> Result<ExecutionContext, WalkFailure> {
        let fail = |error| WalkFailure {
            error,
            context: ExecutionContext::new(),
        };
        let start_index = self.index.index_of(start).ok_or_else(|| {
            fail(ExecutionError::Internal {
                reason: format!("start node {start} is not in the graph"),
            })
        })?;

        if let Some((from, to)) = self
            .index
            .find_cycle_from(start)
            .map_err(|err| fail(ExecutionError::Internal { reason: err.to_string() }))?
        {
            return Err(fail(ExecutionError::CycleDetected { from, to }));
        }

        let mut walk = Walk {
            records: self
                .index
                .nodes()
                .map(|node| NodeExecution::new(node.id.clone()))
                .collect(),
            reachable: self.index.reachable_mask(start_index),
            context: ExecutionContext::new(),
            deadline: self.deadline_from(Instant::now()),
        };

        let outcome = match self.traversal {
            TraversalMode::Sequential => self.walk_sequential(start_index, &mut walk).await,
            TraversalMode::Concurrent => self.walk_concurrent(start_index, &mut walk).await,
        };

        match outcome {
            Ok(()) => Ok(walk.context),
            Err(error) => Err(WalkFailure {
                error,
                context: walk.context,
            }),
        }
    }

    async fn walk_sequential(
        &self,
        start: NodeIndex,
        walk: &mut Walk,
    ) -> Result<(), ExecutionError> {
        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            if walk.records[index.index()].state != VisitState::Pending
                || !self.is_ready(index, walk)
            {
                continue;
            }
            self.check_deadline(walk)?;

            let prepared = self.prepare(index, walk)?;
            let node = self.index.node_at(index);
            self.begin(&prepared, walk);
            let outcome = self.invoke(&prepared, walk.deadline).await;
            self.record(node, outcome, walk)?;

            for successor in self.index.successors(index).iter().rev() {
                stack.push(*successor);
            }
        }
        Ok(())
    }

    async fn walk_concurrent(
        &self,
        start: NodeIndex,
        walk: &mut Walk,
    ) -> Result<(), ExecutionError> {
        let mut wave = vec![start];
        while !wave.is_empty() {
            self.check_deadline(walk)?;
            debug!(run_id = %self.run_id, wave_size = wave.len(), "Starting wave");

            let mut prepared = Vec::with_capacity(wave.len());
            for index in &wave {
                prepared.push(self.prepare(*index, walk)?);
            }
            for job in &prepared {
                self.begin(job, walk);
            }

            let deadline = walk.deadline;
            let outcomes = join_all(prepared.iter().map(|job| self.invoke(job, deadline))).await;

            let mut first_error = None;
            for (job, outcome) in prepared.iter().zip(outcomes) {
                let node = self.index.node_at(job.index);
                if let Err(err) = self.record(node, outcome, walk) {
                    first_error.get_or_insert(err);
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }

            let mut next = Vec::new();
            for index in &wave {
                for successor in self.index.successors(*index) {
                    if walk.records[successor.index()].state == VisitState::Pending
                        && !next.contains(successor)
                        && self.is_ready(*successor, walk)
                    {
                        next.push(*successor);
                    }
                }
            }
            wave = next;
        }
        Ok(())
    }

    fn deadline_from(&self, now: Instant) -> Instant {
        now.checked_add(self.run_timeout)
            .or_else(|| now.checked_add(UNBOUNDED_RUN))
            .unwrap_or(now)
    }

    /// True when every reachable predecessor has completed.
    fn is_ready(&self, index: NodeIndex, walk: &Walk) -> bool {
        self.index
            .predecessors(index)
            .iter()
            .filter(|pred| walk.reachable[pred.index()])
            .all(|pred| walk.records[pred.index()].state == VisitState::Completed)
    }

    fn check_deadline(&self, walk: &Walk) -> Result<(), ExecutionError> {
        if Instant::now() >= walk.deadline {
            return Err(ExecutionError::RunTimeout {
                after: self.run_timeout,
            });
        }
        Ok(())
    }

    /// Resolves the node's kind, handler and declared inputs.
    fn prepare(&self, index: NodeIndex, walk: &mut Walk) -> Result<Prepared, ExecutionError> {
        let node = self.index.node_at(index);
        walk.records[index.index()].resolve();

        let prepared = self.resolve_inputs(index, node, walk);
        if let Err(err) = &prepared {
            self.fail_node(node, err, walk);
        }
        prepared
    }

    fn resolve_inputs(
        &self,
        index: NodeIndex,
        node: &Node,
        walk: &Walk,
    ) -> Result<Prepared, ExecutionError> {
        let kind = node.kind().map_err(|_| ExecutionError::UnknownNodeType {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
        })?;
        let handler = self
            .registry
            .resolve(kind)
            .map_err(|err| ExecutionError::Internal {
                reason: err.to_string(),
            })?;

        let mut inputs = ResolvedInputs::new();
        for dependency in kind.dependencies() {
            // Predecessors the walk never reaches cannot supply a result.
            let predecessor = self
                .index
                .predecessors(index)
                .iter()
                .filter(|pred| walk.reachable[pred.index()])
                .map(|pred| self.index.node_at(*pred))
                .find(|pred| pred.kind().is_ok_and(|k| dependency.any_of.contains(&k)))
                .ok_or_else(|| ExecutionError::MissingDependency {
                    node_id: node.id.clone(),
                    node_type: kind,
                    expected: dependency.expected(),
                })?;
            let result = walk
                .context
                .get(&predecessor.id)
                .map_err(|_| ExecutionError::MissingResult {
                    node_id: node.id.clone(),
                    predecessor: predecessor.id.clone(),
                })?;
            inputs.insert(ResolvedInput {
                slot: dependency.slot,
                node: predecessor.clone(),
                result: result.clone(),
            });
        }

        Ok(Prepared {
            index,
            execution_id: walk.records[index.index()].id,
            kind,
            handler,
            inputs,
        })
    }

    fn begin(&self, job: &Prepared, walk: &mut Walk) {
        let node = self.index.node_at(job.index);
        walk.records[job.index.index()].execute();
        self.emit(ExecutionEvent::NodeStarted {
            run_id: self.run_id,
            execution_id: job.execution_id,
            node_id: node.id.clone(),
            node_type: job.kind.as_str().to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Runs the handler within the tighter of the node and run budgets.
    async fn invoke(
        &self,
        job: &Prepared,
        deadline: Instant,
    ) -> Result<ExecutionResult, ExecutionError> {
        let node = self.index.node_at(job.index);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let budget = self.node_timeout.min(remaining);
        let span = info_span!(
            "node",
            run_id = %self.run_id,
            execution_id = %job.execution_id,
            node_id = %node.id,
            node_type = %job.kind,
        );

        match tokio::time::timeout(budget, job.handler.produce(node, &job.inputs))
            .instrument(span)
            .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(ExecutionError::from_handler(node.id.clone(), job.kind, err)),
            Err(_) if remaining <= self.node_timeout => Err(ExecutionError::RunTimeout {
                after: self.run_timeout,
            }),
            Err(_) => Err(ExecutionError::NodeTimeout {
                node_id: node.id.clone(),
                after: self.node_timeout,
            }),
        }
    }

    fn record(
        &self,
        node: &Node,
        outcome: Result<ExecutionResult, ExecutionError>,
        walk: &mut Walk,
    ) -> Result<(), ExecutionError> {
        let position = self
            .index
            .index_of(&node.id)
            .map(NodeIndex::index)
            .ok_or_else(|| ExecutionError::Internal {
                reason: format!("node {} vanished from the graph", node.id),
            })?;

        let outcome = outcome.and_then(|result| {
            walk.context
                .put(node.id.clone(), result)
                .map_err(|err| ExecutionError::Internal {
                    reason: err.to_string(),
                })
        });

        match outcome {
            Ok(()) => {
                let record = &mut walk.records[position];
                record.complete();
                let duration_ms = record
                    .duration()
                    .and_then(|duration| u64::try_from(duration.num_milliseconds()).ok())
                    .unwrap_or_default();
                info!(
                    run_id = %self.run_id,
                    node_id = %node.id,
                    node_type = %node.node_type,
                    duration_ms,
                    "Node completed"
                );
                let execution_id = record.id;
                self.emit(ExecutionEvent::NodeCompleted {
                    run_id: self.run_id,
                    execution_id,
                    node_id: node.id.clone(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(err) => {
                self.fail_node(node, &err, walk);
                Err(err)
            }
        }
    }

    fn fail_node(&self, node: &Node, err: &ExecutionError, walk: &mut Walk) {
        error!(
            run_id = %self.run_id,
            node_id = %node.id,
            node_type = %node.node_type,
            error = %err,
            "Node failed"
        );
        let Some(index) = self.index.index_of(&node.id) else {
            return;
        };
        let record = &mut walk.records[index.index()];
        record.fail(err.to_string());
        let execution_id = record.id;
        self.emit(ExecutionEvent::NodeFailed {
            run_id: self.run_id,
            execution_id,
            node_id: node.id.clone(),
            error: err.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(observer) = self.observer {
            observer.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::CollaboratorError;
    use crate::retry::RetryPolicy;
    use crate::testing::{MockCollaborators, RecordingObserver};
    use serde_json::json;

    fn registry(mocks: &MockCollaborators) -> NodeRegistry {
        NodeRegistry::with_collaborators(mocks.collaborators(), RetryPolicy::none())
    }

    fn order(context: &ExecutionContext) -> Vec<&str> {
        context.node_ids().into_iter().map(NodeId::as_str).collect()
    }

    fn diamond() -> ConnectionIndex {
        ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start)
                .with_outgoing("a")
                .with_outgoing("b"),
            Node::new("a", NodeKind::End).with_outgoing("c"),
            Node::new("b", NodeKind::End).with_outgoing("c"),
            Node::new("c", NodeKind::End),
        ])
        .expect("build")
    }

    #[tokio::test]
    async fn diamond_joins_before_running_fan_in_node() {
        let mocks = MockCollaborators::new();
        let registry = registry(&mocks);
        let index = diamond();

        let context = GraphWalker::new(&index, &registry, RunId::new())
            .walk(&"s1".into())
            .await
            .expect("walk");

        assert_eq!(order(&context), ["s1", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn concurrent_diamond_runs_in_waves() {
        let mocks = MockCollaborators::new();
        let registry = registry(&mocks);
        let index = diamond();

        let context = GraphWalker::new(&index, &registry, RunId::new())
            .with_traversal(TraversalMode::Concurrent)
            .walk(&"s1".into())
            .await
            .expect("walk");

        assert_eq!(order(&context), ["s1", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn unreachable_nodes_are_not_visited() {
        let mocks = MockCollaborators::new();
        let registry = registry(&mocks);
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start).with_outgoing("e1"),
            Node::new("e1", NodeKind::End),
            Node::new("orphan", NodeKind::End).with_outgoing("e1"),
        ])
        .expect("build");

        let context = GraphWalker::new(&index, &registry, RunId::new())
            .walk(&"s1".into())
            .await
            .expect("walk");

        assert_eq!(order(&context), ["s1", "e1"]);
    }

    #[tokio::test]
    async fn cycle_fails_before_any_handler() {
        let mocks = MockCollaborators::new();
        let registry = registry(&mocks);
        let observer = RecordingObserver::new();
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start).with_outgoing("a"),
            Node::new("a", NodeKind::End).with_outgoing("b"),
            Node::new("b", NodeKind::End).with_outgoing("a"),
        ])
        .expect("build");

        let failure = GraphWalker::new(&index, &registry, RunId::new())
            .with_observer(&observer)
            .walk(&"s1".into())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ExecutionError::CycleDetected { .. }));
        assert!(failure.context.is_empty());
        assert!(observer.events().is_empty());
    }

    #[tokio::test]
    async fn missing_dependency_stops_the_walk() {
        let mocks = MockCollaborators::new();
        let registry = registry(&mocks);
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start).with_outgoing("i1"),
            Node::new("i1", NodeKind::ImageGeneration)
                .with_data(json!({ "config": { "prompt": "p" } }))
                .with_outgoing("e1"),
            Node::new("e1", NodeKind::End),
        ])
        .expect("build");

        let failure = GraphWalker::new(&index, &registry, RunId::new())
            .walk(&"s1".into())
            .await
            .unwrap_err();

        assert_eq!(
            failure.error,
            ExecutionError::MissingDependency {
                node_id: "i1".into(),
                node_type: NodeKind::ImageGeneration,
                expected: "google-integration".to_string(),
            }
        );
        assert_eq!(order(&failure.context), ["s1"]);
        assert_eq!(mocks.images.call_count(), 0);
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let mocks = MockCollaborators::new();
        mocks.sheets.with_delay(Duration::from_millis(200));
        let registry = registry(&mocks);
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start).with_outgoing("g1"),
            Node::new("g1", NodeKind::GoogleIntegration)
                .with_data(json!({ "config": { "link": "https://docs.google.com/spreadsheets/d/x/edit" } })),
        ])
        .expect("build");

        let failure = GraphWalker::new(&index, &registry, RunId::new())
            .with_node_timeout(Duration::from_millis(20))
            .walk(&"s1".into())
            .await
            .unwrap_err();

        assert_eq!(
            failure.error,
            ExecutionError::NodeTimeout {
                node_id: "g1".into(),
                after: Duration::from_millis(20),
            }
        );
        assert_eq!(order(&failure.context), ["s1"]);
    }

    #[tokio::test]
    async fn run_deadline_preempts_node_budget() {
        let mocks = MockCollaborators::new();
        mocks.sheets.with_delay(Duration::from_millis(200));
        let registry = registry(&mocks);
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start).with_outgoing("g1"),
            Node::new("g1", NodeKind::GoogleIntegration)
                .with_data(json!({ "config": { "link": "https://docs.google.com/spreadsheets/d/x/edit" } })),
        ])
        .expect("build");

        let failure = GraphWalker::new(&index, &registry, RunId::new())
            .with_node_timeout(Duration::from_secs(10))
            .with_run_timeout(Duration::from_millis(30))
            .walk(&"s1".into())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ExecutionError::RunTimeout { .. }));
        assert!(failure.context.contains(&"s1".into()));
    }

    #[tokio::test]
    async fn unbounded_run_budget_completes() {
        let mocks = MockCollaborators::new();
        let registry = registry(&mocks);
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start).with_outgoing("e1"),
            Node::new("e1", NodeKind::End),
        ])
        .expect("build");

        let context = GraphWalker::new(&index, &registry, RunId::new())
            .with_run_timeout(Duration::MAX)
            .walk(&"s1".into())
            .await
            .expect("walk");

        assert_eq!(order(&context), ["s1", "e1"]);
    }

    #[tokio::test]
    async fn concurrent_failure_keeps_completed_siblings() {
        let mocks = MockCollaborators::new();
        mocks.http.fail_always(CollaboratorError::Status {
            service: "api-request".to_string(),
            status: 400,
            body: "bad request".to_string(),
        });
        let registry = registry(&mocks);
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start)
                .with_outgoing("a1")
                .with_outgoing("g1"),
            Node::new("a1", NodeKind::ApiRequest)
                .with_data(json!({ "config": { "url": "https://api.example.com/items", "method": "POST" } }))
                .with_outgoing("e1"),
            Node::new("g1", NodeKind::GoogleIntegration)
                .with_data(json!({ "config": { "link": "https://docs.google.com/spreadsheets/d/x/edit" } }))
                .with_outgoing("e1"),
            Node::new("e1", NodeKind::End),
        ])
        .expect("build");

        let failure = GraphWalker::new(&index, &registry, RunId::new())
            .with_traversal(TraversalMode::Concurrent)
            .walk(&"s1".into())
            .await
            .unwrap_err();

        assert!(matches!(
            &failure.error,
            ExecutionError::Collaborator { node_id, .. } if node_id.as_str() == "a1"
        ));
        assert_eq!(order(&failure.context), ["s1", "g1"]);
        assert_eq!(mocks.sheets.call_count(), 1);
        assert!(!failure.context.contains(&"e1".into()));
    }

    #[tokio::test]
    async fn observer_sees_node_lifecycle() {
        let mocks = MockCollaborators::new();
        let registry = registry(&mocks);
        let observer = RecordingObserver::new();
        let index = ConnectionIndex::build(vec![
            Node::new("s1", NodeKind::Start).with_outgoing("x1"),
            Node::with_type("x1", "conditional-path"),
        ])
        .expect("build");

        let failure = GraphWalker::new(&index, &registry, RunId::new())
            .with_observer(&observer)
            .walk(&"s1".into())
            .await
            .unwrap_err();

        assert_eq!(
            failure.error,
            ExecutionError::UnknownNodeType {
                node_id: "x1".into(),
                node_type: "conditional-path".to_string(),
            }
        );
        let events = observer.events();
        let ExecutionEvent::NodeStarted { execution_id: started, .. } = &events[0] else {
            panic!("expected NodeStarted, got {:?}", events[0]);
        };
        let ExecutionEvent::NodeCompleted { execution_id: completed, .. } = &events[1] else {
            panic!("expected NodeCompleted, got {:?}", events[1]);
        };
        assert_eq!(started, completed);
        assert!(matches!(&events[2], ExecutionEvent::NodeFailed { node_id, .. } if node_id.as_str() == "x1"));
        let ExecutionEvent::NodeFailed { execution_id: failed, .. } = &events[2] else {
            unreachable!();
        };
        assert_ne!(failed, started);
    }
}
