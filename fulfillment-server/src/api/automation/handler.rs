//! Automation API Handlers

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::fulfillment::{CycleOutcome, PipelineStatus, ProcessOutcome};
use crate::utils::{ApiResponse, AppResult};

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    /// Seconds between cycles; the configured interval when absent
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub interval_secs: u64,
}

/// Collect then process
pub async fn collect(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<CycleOutcome>>> {
    let outcome = state.runner.trigger_collection().await?;
    let message = format!("{}; {}", outcome.collect.message, outcome.process.message);
    Ok(Json(ApiResponse::success_with_message(message, outcome)))
}

pub async fn process(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<ProcessOutcome>>> {
    let outcome = state.runner.trigger_processing().await?;
    Ok(Json(ApiResponse::success_with_message(
        outcome.message.clone(),
        outcome,
    )))
}

pub async fn status(State(state): State<ServerState>) -> Json<ApiResponse<PipelineStatus>> {
    Json(ApiResponse::success(state.runner.status()))
}

pub async fn start(
    State(state): State<ServerState>,
    payload: Option<Json<StartRequest>>,
) -> AppResult<Json<ApiResponse<StartResponse>>> {
    let requested = payload
        .and_then(|Json(body)| body.interval)
        .unwrap_or(state.config.collect_interval_secs);
    let interval_secs = state.start_schedule(requested)?;
    Ok(Json(ApiResponse::success_with_message(
        format!("Scheduled collection every {interval_secs}s"),
        StartResponse { interval_secs },
    )))
}

pub async fn stop(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<()>>> {
    state.runner.stop()?;
    Ok(Json(ApiResponse::ok()))
}
