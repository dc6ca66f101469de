//! Request handlers.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use merlinflow_workflow::{ExecutionContext, Node};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A workflow submitted by the flow editor.
#[derive(Debug, Deserialize)]
pub struct ExecuteFlowRequest {
    pub config: Vec<Node>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteFlowResponse {
    pub status: &'static str,
    pub results: ExecutionContext,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Runs a submitted workflow to completion.
///
/// # Errors
///
/// Returns `400` for an unreadable body or an invalid workflow, and the
/// status for the failure kind otherwise.
pub async fn execute_flow(
    State(state): State<AppState>,
    payload: Result<Json<ExecuteFlowRequest>, JsonRejection>,
) -> Result<Json<ExecuteFlowResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::invalid_body(&rejection))?;
    let report = state.executor.run(request.config).await?;
    info!(
        run_id = %report.run_id,
        completed_nodes = report.results.len(),
        "Workflow executed"
    );
    Ok(Json(ExecuteFlowResponse {
        status: "success",
        results: report.results,
    }))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
