// SPDX-License-Identifier: CC0-1.0

use axum::extract::{Path, State};
use axum::Json;
use bitcoin::{Address, Network};
use labels::LabelCategory;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

fn network_from_chain(chain: &str) -> Network {
    match chain {
        "test" => Network::Testnet,
        "signet" => Network::Signet,
        "regtest" => Network::Regtest,
        _ => Network::Bitcoin,
    }
}

async fn resolve_scripthash(state: &AppState, address: &str) -> Result<String, AppError> {
    let rpc = state.rpc.clone();
    let address = address.to_string();
    let validated = tokio::task::spawn_blocking(move || rpc.validate_address(&address))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    let unchecked = validated.address.ok_or_else(|| AppError::BadRequest("invalid address".to_string()))?;
    let info = state.node.get_blockchain_info().await?;
    let checked: Address<bitcoin::address::NetworkChecked> = unchecked
        .require_network(network_from_chain(&info.chain))
        .map_err(|e| AppError::BadRequest(format!("address/network mismatch: {e}")))?;
    Ok(electrum::scripthash_for_address(&checked))
}

pub async fn validate(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let rpc = state.rpc.clone();
    let addr = address.clone();
    let validated = tokio::task::spawn_blocking(move || rpc.validate_address(&addr))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(Json(serde_json::json!({
        "address": address,
        "is_valid": validated.is_valid,
    })))
}

pub async fn info(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let rpc = state.rpc.clone();
    let addr = address.clone();
    let validated = tokio::task::spawn_blocking(move || rpc.validate_address(&addr))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    let label = state.store.get_label(&address).await?;
    Ok(Json(serde_json::json!({
        "address": address,
        "is_valid": validated.is_valid,
        "label": label.map(|l| l.label),
    })))
}

pub async fn balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let electrum = state.electrum.as_ref().ok_or_else(|| AppError::ServiceUnavailable("Electrs not configured".to_string()))?;
    let scripthash = resolve_scripthash(&state, &address).await?;
    let balance = electrum
        .scripthash_get_balance(&scripthash)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "address": address,
        "confirmed_sats": balance.confirmed,
        "unconfirmed_sats": balance.unconfirmed,
    })))
}

pub async fn history(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let electrum = state.electrum.as_ref().ok_or_else(|| AppError::ServiceUnavailable("Electrs not configured".to_string()))?;
    let scripthash = resolve_scripthash(&state, &address).await?;
    let history = electrum
        .scripthash_get_history(&scripthash)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "address": address,
        "history": history.iter().map(|h| serde_json::json!({
            "tx_hash": h.tx_hash.to_string(),
            "height": h.height,
        })).collect::<Vec<_>>(),
    })))
}

pub async fn utxos(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let electrum = state.electrum.as_ref().ok_or_else(|| AppError::ServiceUnavailable("Electrs not configured".to_string()))?;
    let scripthash = resolve_scripthash(&state, &address).await?;
    let unspent = electrum
        .scripthash_listunspent(&scripthash)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    Ok(Json(serde_json::json!({
        "address": address,
        "utxos": unspent.iter().map(|u| serde_json::json!({
            "tx_hash": u.tx_hash.to_string(),
            "tx_pos": u.tx_pos,
            "value_sats": u.value,
            "height": u.height,
        })).collect::<Vec<_>>(),
    })))
}

/// Dust threshold: 546 sats, the standard relay-policy minimum for a
/// non-segwit P2PKH output.
const DUST_THRESHOLD_SATS: i64 = 546;

pub async fn dust_check(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let electrum = state.electrum.as_ref().ok_or_else(|| AppError::ServiceUnavailable("Electrs not configured".to_string()))?;
    let scripthash = resolve_scripthash(&state, &address).await?;
    let unspent = electrum
        .scripthash_listunspent(&scripthash)
        .await
        .map_err(|e| AppError::ServiceUnavailable(e.to_string()))?;
    let dust: Vec<_> = unspent.iter().filter(|u| u.value < DUST_THRESHOLD_SATS).collect();
    Ok(Json(serde_json::json!({
        "address": address,
        "dust_utxo_count": dust.len(),
        "dust_threshold_sats": DUST_THRESHOLD_SATS,
    })))
}

pub async fn get_label(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let label = state.store.get_label(&address).await?;
    match label {
        Some(l) => Ok(Json(serde_json::to_value(l).expect("AddressLabel serializes"))),
        None => Err(AppError::NotFound(format!("no label for {address}"))),
    }
}

fn default_category() -> LabelCategory {
    LabelCategory::Other
}

#[derive(Deserialize)]
pub struct PutLabelRequest {
    pub label: String,
    #[serde(default = "default_category")]
    pub category: LabelCategory,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct PutLabelBodyRequest {
    pub address: String,
    pub label: String,
    #[serde(default = "default_category")]
    pub category: LabelCategory,
    pub notes: Option<String>,
}

pub async fn put_label_body(
    State(state): State<AppState>,
    Json(request): Json<PutLabelBodyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let label = state
        .store
        .put_label(&request.address, &request.label, request.category, request.notes.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(label).expect("AddressLabel serializes")))
}

pub async fn put_label(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(request): Json<PutLabelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let label = state
        .store
        .put_label(&address, &request.label, request.category, request.notes.as_deref())
        .await?;
    Ok(Json(serde_json::to_value(label).expect("AddressLabel serializes")))
}

pub async fn list_labels(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let labels = state.store.list_labels().await?;
    Ok(Json(serde_json::to_value(labels).expect("Vec<AddressLabel> serializes")))
}

pub async fn delete_label(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.store.delete_label(&address).await?;
    if deleted {
        Ok(Json(serde_json::json!({ "deleted": true })))
    } else {
        Err(AppError::NotFound(format!("no label for {address}")))
    }
}
