// SPDX-License-Identifier: CC0-1.0

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::error::AppError;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let now = Utc::now().timestamp();
    if state.health_cache.is_fresh(now) {
        if let Some(body) = state.health_cache.body.lock().await.clone() {
            return Ok(Json(body));
        }
    }

    let node_ok = state.node.get_blockchain_info().await.is_ok();
    let body = serde_json::json!({
        "status": if node_ok { "ok" } else { "degraded" },
        "node_rpc": node_ok,
        "electrs_enabled": state.electrum.is_some(),
    });

    state.health_cache.checked_at_unix.store(now, std::sync::atomic::Ordering::Relaxed);
    *state.health_cache.body.lock().await = Some(body.clone());

    Ok(Json(body))
}

pub async fn electrs_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let Some(electrum) = &state.electrum else {
        return Json(serde_json::json!({ "enabled": false }));
    };
    match electrum.server_version("utxotrace", "1.4").await {
        Ok(version) => Json(serde_json::json!({ "enabled": true, "version": version })),
        Err(e) => Json(serde_json::json!({ "enabled": true, "error": e.to_string() })),
    }
}
