// SPDX-License-Identifier: CC0-1.0

use axum::extract::{Path, Query, State};
use axum::Json;
use bitcoin::Txid;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::AppError;
use crate::state::AppState;

fn parse_txid(s: &str) -> Result<Txid, AppError> {
    Txid::from_str(s).map_err(|e| AppError::BadRequest(format!("invalid txid: {e}")))
}

#[derive(Deserialize)]
pub struct ForwardQuery {
    pub txid: String,
    pub vout: u32,
    pub max_depth: Option<u32>,
}

pub async fn trace_forward(
    State(state): State<AppState>,
    Query(query): Query<ForwardQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let txid = parse_txid(&query.txid)?;
    let max_depth = query.max_depth.unwrap_or(state.config.default_trace_depth).min(state.config.max_trace_depth);
    let result = state.engine.trace_forward(txid, query.vout, max_depth, None).await;
    Ok(Json(serde_json::to_value(result).map_err(|e| AppError::Internal(e.to_string()))?))
}

#[derive(Deserialize)]
pub struct BackwardQuery {
    pub txid: String,
    pub max_depth: Option<u32>,
}

pub async fn trace_backward(
    State(state): State<AppState>,
    Query(query): Query<BackwardQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let txid = parse_txid(&query.txid)?;
    let max_depth = query.max_depth.unwrap_or(state.config.default_trace_depth).min(state.config.max_trace_depth);
    let result = state.engine.trace_backward(txid, max_depth, None).await;
    Ok(Json(serde_json::to_value(result).map_err(|e| AppError::Internal(e.to_string()))?))
}

pub async fn coinjoin_score(
    State(state): State<AppState>,
    Path(txid): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let txid = parse_txid(&txid)?;
    let tx = state
        .node
        .get_raw_transaction_verbose(txid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction not found: {txid}")))?;
    let score = coinjoin::score(&tx);
    Ok(Json(serde_json::json!({
        "txid": txid.to_string(),
        "score": score,
        "is_coinjoin": score > coinjoin::COINJOIN_THRESHOLD,
    })))
}

#[derive(Deserialize)]
pub struct CoinjoinHistoryQuery {
    pub direction: Option<String>,
    pub max_depth: Option<u32>,
}

pub async fn coinjoin_history(
    State(state): State<AppState>,
    Path(txid): Path<String>,
    Query(query): Query<CoinjoinHistoryQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let txid = parse_txid(&txid)?;
    let max_depth = query.max_depth.unwrap_or(state.config.default_trace_depth).min(state.config.max_trace_depth);
    let backward = query.direction.as_deref() != Some("forward");

    let result = if backward {
        state.engine.trace_backward(txid, max_depth, None).await
    } else {
        state.engine.trace_forward(txid, 0, max_depth, None).await
    };

    Ok(Json(serde_json::json!({
        "txid": txid.to_string(),
        "coinjoin_txids": result.coinjoin_txids.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        "total_transactions": result.total_transactions,
    })))
}

#[derive(Deserialize)]
pub struct PrivacyScoreQuery {
    pub txid: String,
    pub vout: u32,
}

/// A standalone 0-100 privacy estimate for one UTXO's forward trace. Unlike
/// `/kyc/trace`, this endpoint has no known destination address to seed a
/// ranked-destination trail, so it derives a score directly from the
/// traversal: CoinJoin density, and how much traced value has come to rest
/// at unspent endpoints versus still moving.
pub async fn privacy_score(
    State(state): State<AppState>,
    Query(query): Query<PrivacyScoreQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let txid = parse_txid(&query.txid)?;
    let max_depth = state.config.default_trace_depth.min(state.config.max_trace_depth);
    let result = state.engine.trace_forward(txid, query.vout, max_depth, None).await;

    let score = if result.nodes.is_empty() {
        100.0
    } else {
        let total_tx = result.total_transactions.max(1) as f64;
        let coinjoin_ratio = result.coinjoin_txids.len() as f64 / total_tx;
        let unspent_ratio = result.unspent_endpoints.len() as f64 / total_tx;
        let mut s = (coinjoin_ratio * 40.0).min(40.0);
        s += if result.coinjoin_txids.len() >= 2 { 30.0 } else if result.coinjoin_txids.len() == 1 { 15.0 } else { 0.0 };
        s += ((1.0 - unspent_ratio) * 20.0).max(0.0);
        s.min(100.0)
    };

    Ok(Json(serde_json::json!({
        "txid": txid.to_string(),
        "vout": query.vout,
        "privacy_score": score,
        "coinjoins_encountered": result.coinjoin_txids.len(),
        "total_transactions": result.total_transactions,
    })))
}
