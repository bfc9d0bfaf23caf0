// SPDX-License-Identifier: CC0-1.0

//! The background job queue: long-running traces queued via `POST /jobs`,
//! polled via `GET /jobs/{id}`, advisory-cancelled via `DELETE /jobs/{id}`.
//! A background runner (spawned from `main`) drains `pending` rows.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub job_type: String,
    pub params: serde_json::Value,
}

pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = state.store.create_job(&request.job_type, request.params).await?;
    state.ws_tx.send(format!("{{\"event\":\"job_created\",\"id\":\"{}\"}}", job.id)).ok();
    Ok(Json(serde_json::to_value(job).expect("AnalysisJob serializes")))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let job = state.store.get_job(id).await?.ok_or_else(|| AppError::NotFound(format!("job not found: {id}")))?;
    Ok(Json(serde_json::to_value(job).expect("AnalysisJob serializes")))
}

pub async fn list_jobs(State(_state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    // Listing all jobs is intentionally unsupported: `analysis_jobs` has no
    // upper bound on row count, and the core contract only promises
    // lookup-by-id plus advisory cancellation.
    Err(AppError::BadRequest("job listing is not supported; poll GET /jobs/{id}".to_string()))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let cancelled = state.store.cancel_job(id).await?;
    Ok(Json(serde_json::json!({ "cancelled": cancelled })))
}

/// Polls for `pending` jobs of type `trace_forward` / `trace_backward` /
/// `kyc_trace` and executes them, one at a time, honouring cancellation
/// only at the suspension points the engine itself already yields at.
pub async fn run_background_indexer(state: AppState) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
    loop {
        interval.tick().await;
        if let Err(e) = poll_once(&state).await {
            tracing::warn!(error = %e, "background indexer poll failed");
        }
    }
}

async fn poll_once(state: &AppState) -> Result<(), AppError> {
    let Some(job) = state.store.claim_next_pending().await? else { return Ok(()) };

    let outcome = match job.job_type.as_str() {
        "trace_forward" => run_trace_forward(state, &job.params).await,
        "trace_backward" => run_trace_backward(state, &job.params).await,
        "kyc_trace" => run_kyc_trace(state, &job.params).await,
        other => Err(AppError::BadRequest(format!("unknown job_type: {other}"))),
    };

    match outcome {
        Ok(result) => {
            state.store.complete_job(job.id, result).await?;
            state.ws_tx.send(format!("{{\"event\":\"job_completed\",\"id\":\"{}\"}}", job.id)).ok();
        }
        Err(e) => {
            state.store.fail_job(job.id, e.to_string()).await?;
            state.ws_tx.send(format!("{{\"event\":\"job_failed\",\"id\":\"{}\"}}", job.id)).ok();
        }
    }
    Ok(())
}

fn parse_txid_param(params: &serde_json::Value, key: &str) -> Result<bitcoin::Txid, AppError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadRequest(format!("missing '{key}' in job params")))?
        .parse()
        .map_err(|e| AppError::BadRequest(format!("invalid {key}: {e}")))
}

async fn run_trace_forward(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let txid = parse_txid_param(params, "txid")?;
    let vout = params.get("vout").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let max_depth = params
        .get("max_depth")
        .and_then(|v| v.as_u64())
        .map(|d| d as u32)
        .unwrap_or(state.config.default_trace_depth);
    let result = state.engine.trace_forward(txid, vout, max_depth, None).await;
    serde_json::to_value(result).map_err(|e| AppError::Internal(e.to_string()))
}

async fn run_trace_backward(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let txid = parse_txid_param(params, "txid")?;
    let max_depth = params
        .get("max_depth")
        .and_then(|v| v.as_u64())
        .map(|d| d as u32)
        .unwrap_or(state.config.default_trace_depth);
    let result = state.engine.trace_backward(txid, max_depth, None).await;
    serde_json::to_value(result).map_err(|e| AppError::Internal(e.to_string()))
}

async fn run_kyc_trace(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, AppError> {
    let exchange_txid = parse_txid_param(params, "exchange_txid")?;
    let destination_address = params
        .get("destination_address")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadRequest("missing 'destination_address' in job params".to_string()))?;
    let depth_preset = params
        .get("depth_preset")
        .and_then(|v| v.as_str())
        .and_then(kyc::DepthPreset::parse)
        .unwrap_or(kyc::DepthPreset::Standard);
    let result = state.kyc.trace_kyc_withdrawal(exchange_txid, destination_address, depth_preset).await;
    serde_json::to_value(result).map_err(|e| AppError::Internal(e.to_string()))
}
