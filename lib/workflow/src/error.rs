//! Error types for the workflow crate.
//!
//! Errors are layered:
//! - `ValidationError`: the submitted graph is malformed; no node runs
//! - `ExecutionError`: a run started and was aborted at some node
//! - `HandlerError`: what a single node handler reports back to the walker
//! - `RunError`: what the executor hands to its caller, classified by [`ErrorKind`]
//!
//! Collaborator failures cross the I/O seam as `rootcause::Report<CollaboratorError>`
//! and are folded into `HandlerError::Collaborator` by the handlers.

use crate::collaborator::CollaboratorError;
use crate::node::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Errors found while validating a submitted graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The node list is empty.
    EmptyGraph,
    /// No node has type `start`.
    MissingStartNode,
    /// More than one node has type `start`.
    MultipleStartNodes { node_ids: Vec<NodeId> },
    /// Two nodes share an ID.
    DuplicateNodeId { node_id: NodeId },
    /// A connection list names a node that is not in the graph.
    DanglingReference { node_id: NodeId, target: NodeId },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGraph => write!(f, "workflow contains no nodes"),
            Self::MissingStartNode => write!(f, "no start node found"),
            Self::MultipleStartNodes { node_ids } => {
                let ids: Vec<&str> = node_ids.iter().map(NodeId::as_str).collect();
                write!(f, "multiple start nodes found: {}", ids.join(", "))
            }
            Self::DuplicateNodeId { node_id } => write!(f, "duplicate node id: {node_id}"),
            Self::DanglingReference { node_id, target } => {
                write!(f, "node {node_id} references unknown node {target}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Lookup failures in the connection index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// None of the node's incoming neighbors has one of the expected kinds.
    DependencyNotFound { node_id: NodeId, expected: String },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::DependencyNotFound { node_id, expected } => {
                write!(f, "no {expected} predecessor found for node {node_id}")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from the per-run result store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A result was already stored for this node.
    AlreadyRecorded { node_id: NodeId },
    /// No result has been stored for this node.
    MissingResult { node_id: NodeId },
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyRecorded { node_id } => {
                write!(f, "result for node {node_id} already recorded")
            }
            Self::MissingResult { node_id } => write!(f, "no result recorded for node {node_id}"),
        }
    }
}

impl std::error::Error for ContextError {}

/// Errors while assembling a node registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A node kind has no registered handler.
    MissingHandler { kind: NodeKind },
    /// A kind was looked up that the registry does not cover.
    NotFound { kind: NodeKind },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHandler { kind } => write!(f, "no handler registered for {kind}"),
            Self::NotFound { kind } => write!(f, "handler not found for {kind}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Failure reported by a node handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The node's configuration could not be parsed.
    InvalidConfig { reason: String },
    /// A resolved input was absent or did not have the expected shape.
    MissingInput { slot: String, reason: String },
    /// The handler's collaborator failed.
    Collaborator(CollaboratorError),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { reason } => write!(f, "invalid node configuration: {reason}"),
            Self::MissingInput { slot, reason } => write!(f, "input '{slot}' unusable: {reason}"),
            Self::Collaborator(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<CollaboratorError> for HandlerError {
    fn from(err: CollaboratorError) -> Self {
        Self::Collaborator(err)
    }
}

/// Errors that abort a run after traversal has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The node's type tag names no supported kind.
    UnknownNodeType { node_id: NodeId, node_type: String },
    /// The node's configuration could not be used.
    InvalidNodeConfig {
        node_id: NodeId,
        node_type: NodeKind,
        reason: String,
    },
    /// A declared predecessor kind is not connected to the node.
    MissingDependency {
        node_id: NodeId,
        node_type: NodeKind,
        expected: String,
    },
    /// A predecessor is connected but has no result yet.
    MissingResult { node_id: NodeId, predecessor: NodeId },
    /// A predecessor's result lacks what the node consumes.
    UnusableInput {
        node_id: NodeId,
        node_type: NodeKind,
        slot: String,
        reason: String,
    },
    /// The handler's collaborator failed.
    Collaborator {
        node_id: NodeId,
        node_type: NodeKind,
        error: CollaboratorError,
    },
    /// The graph contains a cycle reachable from the start node.
    CycleDetected { from: NodeId, to: NodeId },
    /// A handler exceeded its time budget.
    NodeTimeout { node_id: NodeId, after: Duration },
    /// The run exceeded its deadline.
    RunTimeout { after: Duration },
    /// An invariant of the executor was broken.
    Internal { reason: String },
}

impl ExecutionError {
    /// Returns the node the error is attributed to, if any.
    #[must_use]
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::UnknownNodeType { node_id, .. }
            | Self::InvalidNodeConfig { node_id, .. }
            | Self::MissingDependency { node_id, .. }
            | Self::MissingResult { node_id, .. }
            | Self::UnusableInput { node_id, .. }
            | Self::Collaborator { node_id, .. }
            | Self::NodeTimeout { node_id, .. } => Some(node_id),
            Self::CycleDetected { to, .. } => Some(to),
            Self::RunTimeout { .. } | Self::Internal { .. } => None,
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownNodeType { .. } | Self::InvalidNodeConfig { .. } => {
                ErrorKind::Configuration
            }
            Self::MissingDependency { .. }
            | Self::MissingResult { .. }
            | Self::UnusableInput { .. } => ErrorKind::Dependency,
            Self::Collaborator { .. } => ErrorKind::Collaborator,
            Self::CycleDetected { .. } => ErrorKind::Cycle,
            Self::NodeTimeout { .. } | Self::RunTimeout { .. } => ErrorKind::Timeout,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub(crate) fn from_handler(node_id: NodeId, node_type: NodeKind, err: HandlerError) -> Self {
        match err {
            HandlerError::InvalidConfig { reason } => Self::InvalidNodeConfig {
                node_id,
                node_type,
                reason,
            },
            HandlerError::MissingInput { slot, reason } => Self::UnusableInput {
                node_id,
                node_type,
                slot,
                reason,
            },
            HandlerError::Collaborator(error) => Self::Collaborator {
                node_id,
                node_type,
                error,
            },
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "node {node_id} has unknown type '{node_type}'")
            }
            Self::InvalidNodeConfig {
                node_id,
                node_type,
                reason,
            } => write!(f, "node {node_id} ({node_type}) is misconfigured: {reason}"),
            Self::MissingDependency {
                node_id,
                node_type,
                expected,
            } => write!(
                f,
                "node {node_id} ({node_type}) requires a {expected} predecessor"
            ),
            Self::MissingResult {
                node_id,
                predecessor,
            } => write!(
                f,
                "node {node_id} depends on {predecessor}, which has not produced a result"
            ),
            Self::UnusableInput {
                node_id,
                node_type,
                slot,
                reason,
            } => write!(
                f,
                "node {node_id} ({node_type}) cannot use its {slot} input: {reason}"
            ),
            Self::Collaborator {
                node_id,
                node_type,
                error,
            } => write!(f, "node {node_id} ({node_type}) failed: {error}"),
            Self::CycleDetected { from, to } => {
                write!(f, "workflow contains a cycle through {from} -> {to}")
            }
            Self::NodeTimeout { node_id, after } => {
                write!(f, "node {node_id} timed out after {}s", after.as_secs_f64())
            }
            Self::RunTimeout { after } => {
                write!(f, "workflow run timed out after {}s", after.as_secs_f64())
            }
            Self::Internal { reason } => write!(f, "internal executor error: {reason}"),
        }
    }
}

impl std::error::Error for ExecutionError {}

/// The taxonomy entry an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Configuration,
    Dependency,
    Collaborator,
    Cycle,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Configuration => "configuration",
            Self::Dependency => "dependency",
            Self::Collaborator => "collaborator",
            Self::Cycle => "cycle",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The graph was rejected before traversal.
    Validation(ValidationError),
    /// Traversal was aborted.
    Execution(ExecutionError),
}

impl RunError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Execution(err) => err.kind(),
        }
    }

    /// Returns the node the error is attributed to, if any.
    #[must_use]
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            Self::Validation(ValidationError::DuplicateNodeId { node_id })
            | Self::Validation(ValidationError::DanglingReference { node_id, .. }) => Some(node_id),
            Self::Validation(_) => None,
            Self::Execution(err) => err.node_id(),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid workflow: {err}"),
            Self::Execution(err) => write!(f, "workflow execution failed: {err}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ValidationError> for RunError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<ExecutionError> for RunError {
    fn from(err: ExecutionError) -> Self {
        Self::Execution(err)
    }
}
