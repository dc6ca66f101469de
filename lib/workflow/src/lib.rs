//! Workflow engine for merlinflow.
//!
//! This crate runs workflows submitted by the flow builder:
//!
//! - **Node Model**: String-identified nodes with a closed set of kinds and
//!   per-kind configuration
//! - **Connection Index**: petgraph-backed neighbor lookups derived from each
//!   node's embedded connection lists
//! - **Registry**: One handler per node kind, each with a declared set of
//!   predecessor dependencies
//! - **Walker**: Visits each reachable node once, after its predecessors, in
//!   sequential or concurrent waves
//! - **Executor**: Validation, run deadlines and execution events
//!
//! External services are reached through the traits in [`collaborator`].

pub mod collaborator;
pub mod context;
pub mod error;
pub mod execution;
pub mod executor;
pub mod graph;
pub mod handlers;
pub mod node;
pub mod registry;
pub mod retry;
pub mod testing;
pub mod walker;

pub use collaborator::{
    ApiRequest, CollaboratorError, Collaborators, ContextGenerator, ContextRequest, Delivery,
    HttpRequester, ImageGenerator, ImageRequest, Notification, Notifier, PortfolioAnalyzer,
    SheetFetcher,
};
pub use context::{ExecutionContext, ExecutionResult};
pub use error::{
    ContextError, ErrorKind, ExecutionError, GraphError, HandlerError, RegistryError, RunError,
    ValidationError,
};
pub use execution::{ExecutionEvent, ExecutionObserver, NodeExecution, VisitState};
pub use executor::{ExecutorConfig, RunFailure, RunReport, WorkflowExecutor};
pub use graph::ConnectionIndex;
pub use node::{
    ApiRequestConfig, Connections, CryptoAnalyzerConfig, Dependency, GoogleIntegrationConfig,
    HttpMethod, ImageGenerationConfig, LlmConfig, Node, NodeId, NodeKind,
};
pub use registry::{NodeHandler, NodeRegistry, NodeRegistryBuilder, ResolvedInput, ResolvedInputs};
pub use retry::{RetryPolicy, with_retry};
pub use walker::{GraphWalker, TraversalMode, WalkFailure};
