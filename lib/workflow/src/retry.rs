//! Bounded exponential backoff for idempotent collaborator calls.

use crate::collaborator::CollaboratorError;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single backoff.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 200,
            max_backoff_ms: 2000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Returns the backoff before retry number `attempt + 1`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);
        // 0.8x to 1.2x
        let jitter = 0.8 + rand::random::<f64>() * 0.4;
        Duration::from_millis((ms as f64 * jitter) as u64)
    }
}

/// Runs `call`, retrying transient collaborator failures per `policy`.
///
/// # Errors
///
/// Returns the last error once it is not transient or retries run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    service: &str,
    mut call: F,
) -> Result<T, Report<CollaboratorError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Report<CollaboratorError>>>,
{
    let mut attempt = 0;
    loop {
        let backoff = match call().await {
            Ok(value) => return Ok(value),
            Err(report) => {
                if attempt >= policy.max_retries || !report.current_context().is_transient() {
                    return Err(report);
                }
                let backoff = policy.backoff(attempt);
                warn!(
                    service,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %report.current_context(),
                    "Retrying collaborator call"
                );
                backoff
            }
        };
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
