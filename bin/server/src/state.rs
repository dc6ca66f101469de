//! Shared application state.

use crate::config::ServerConfig;
use merlinflow_integration::IntegrationError;
use merlinflow_workflow::{NodeRegistry, WorkflowExecutor};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::info;

/// State handed to every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub executor: Arc<WorkflowExecutor>,
}

impl AppState {
    #[must_use]
    pub fn new(executor: WorkflowExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Wires HTTP collaborators into an executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the service clients cannot be built.
    pub fn from_config(config: &ServerConfig) -> Result<Self, Report<IntegrationError>> {
        let collaborators = merlinflow_integration::collaborators(&config.services)?;
        let registry = NodeRegistry::with_collaborators(collaborators, config.retry);
        info!(kinds = ?registry.kinds(), "Node handlers registered");
        Ok(Self::new(
            WorkflowExecutor::new(Arc::new(registry)).with_config(config.executor),
        ))
    }
}
