//! Centralized server configuration.
//!
//! Loaded via the `config` crate from an optional file, then from
//! `MERLINFLOW__`-prefixed environment variables (nested keys separated by
//! `__`, e.g. `MERLINFLOW__SERVICES__AUTOMATION_TOKEN`).

use axum::http::HeaderValue;
use axum::http::header::InvalidHeaderValue;
use merlinflow_integration::ServicesConfig;
use merlinflow_workflow::{ExecutorConfig, RetryPolicy};
use serde::Deserialize;
use std::path::Path;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_address: String,

    /// Origin of the flow editor allowed to submit runs.
    pub allowed_origin: String,

    /// Run limits and scheduling.
    pub executor: ExecutorConfig,

    /// Retry policy for idempotent collaborator calls.
    pub retry: RetryPolicy,

    /// External service endpoints.
    pub services: ServicesConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            allowed_origin: "http://localhost:5173".to_string(),
            executor: ExecutorConfig::default(),
            retry: RetryPolicy::default(),
            services: ServicesConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `file` (if given), overridden by environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(config::File::from(file));
        }
        builder
            .add_source(
                config::Environment::with_prefix("MERLINFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the allowed origin as a header value for CORS.
    ///
    /// # Errors
    ///
    /// Returns an error if the origin is not a valid header value.
    pub fn cors_origin(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.allowed_origin)
    }
}
