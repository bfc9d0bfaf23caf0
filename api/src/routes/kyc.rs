// SPDX-License-Identifier: CC0-1.0

use axum::extract::{Query, State};
use axum::Json;
use bitcoin::Txid;
use kyc::DepthPreset;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct KycTraceRequest {
    pub exchange_txid: String,
    pub destination_address: String,
    #[serde(default)]
    pub depth_preset: Option<String>,
}

pub async fn trace(
    State(state): State<AppState>,
    body: axum::extract::Json<KycTraceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    trace_inner(state, body.0).await
}

pub async fn trace_query(
    State(state): State<AppState>,
    Query(query): Query<KycTraceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    trace_inner(state, query).await
}

async fn trace_inner(state: AppState, request: KycTraceRequest) -> Result<Json<serde_json::Value>, AppError> {
    let exchange_txid =
        Txid::from_str(&request.exchange_txid).map_err(|e| AppError::BadRequest(format!("invalid txid: {e}")))?;
    let depth_preset = request
        .depth_preset
        .as_deref()
        .map(|s| DepthPreset::parse(s).ok_or_else(|| AppError::BadRequest(format!("unknown depth preset: {s}"))))
        .transpose()?
        .unwrap_or(DepthPreset::Standard);

    let result = state.kyc.trace_kyc_withdrawal(exchange_txid, &request.destination_address, depth_preset).await;
    Ok(Json(serde_json::to_value(result).map_err(|e| AppError::Internal(e.to_string()))?))
}

#[derive(Deserialize)]
pub struct QuickCheckQuery {
    pub exchange_txid: String,
    pub destination_address: String,
}

/// A `quick`-preset trace, trimmed to the top-line verdict.
pub async fn quick_check(
    State(state): State<AppState>,
    Query(query): Query<QuickCheckQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let exchange_txid =
        Txid::from_str(&query.exchange_txid).map_err(|e| AppError::BadRequest(format!("invalid txid: {e}")))?;
    let result = state.kyc.trace_kyc_withdrawal(exchange_txid, &query.destination_address, DepthPreset::Quick).await;
    Ok(Json(serde_json::json!({
        "overall_privacy_score": result.overall_privacy_score,
        "privacy_rating": result.privacy_rating,
        "summary": result.summary,
    })))
}

pub async fn presets() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "quick": DepthPreset::Quick.depth(),
        "standard": DepthPreset::Standard.depth(),
        "deep": DepthPreset::Deep.depth(),
        "thorough": DepthPreset::Thorough.depth(),
    }))
}
