// SPDX-License-Identifier: CC0-1.0

use axum::extract::{Path, Query, State};
use axum::Json;
use bitcoin::Txid;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ResolveInputsQuery {
    #[serde(default)]
    pub resolve_inputs: bool,
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(txid): Path<String>,
    Query(query): Query<ResolveInputsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let txid = Txid::from_str(&txid).map_err(|e| AppError::BadRequest(format!("invalid txid: {e}")))?;

    let rpc = state.rpc.clone();
    let tx = tokio::task::spawn_blocking(move || rpc.get_raw_transaction_verbose(txid))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??
        .ok_or_else(|| AppError::NotFound(format!("transaction not found: {txid}")))?;

    let mut body = serde_json::json!({
        "txid": tx.txid.to_string(),
        "block_hash": tx.block_hash.map(|h| h.to_string()),
        "block_time": tx.block_time,
        "confirmations": tx.confirmations,
        "vout": tx.vout.iter().map(|o| serde_json::json!({
            "n": o.n,
            "value_sats": o.value_sats,
            "address": o.script_pubkey.address.as_ref().map(|a| a.to_string()),
            "script_type": o.script_pubkey.type_,
        })).collect::<Vec<_>>(),
    });

    if query.resolve_inputs {
        let mut resolved = Vec::new();
        for vin in &tx.vin {
            match vin {
                types::model::Vin::Coinbase => resolved.push(serde_json::json!({ "coinbase": true })),
                types::model::Vin::PrevOut { txid: prev_txid, vout } => {
                    let rpc = state.rpc.clone();
                    let prev_txid = *prev_txid;
                    let vout = *vout;
                    let prev = tokio::task::spawn_blocking(move || rpc.get_raw_transaction_verbose(prev_txid))
                        .await
                        .map_err(|e| AppError::Internal(e.to_string()))??;
                    let out = prev.as_ref().and_then(|p| p.vout.iter().find(|o| o.n == vout));
                    resolved.push(serde_json::json!({
                        "txid": prev_txid.to_string(),
                        "vout": vout,
                        "value_sats": out.map(|o| o.value_sats),
                        "address": out.and_then(|o| o.script_pubkey.address.as_ref()).map(|a| a.to_string()),
                    }));
                }
            }
        }
        body["vin"] = serde_json::Value::Array(resolved);
    }

    Ok(Json(body))
}
