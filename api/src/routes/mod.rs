// SPDX-License-Identifier: CC0-1.0

pub mod addresses;
pub mod analysis;
pub mod health;
pub mod jobs;
pub mod kyc;
pub mod transactions;
pub mod visualizations;
pub mod ws;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/electrs/status", get(health::electrs_status))
        .route("/ws", get(ws::upgrade))
        .route("/transactions/{txid}", get(transactions::get_transaction))
        .route("/analysis/trace/forward", get(analysis::trace_forward))
        .route("/analysis/trace/backward", get(analysis::trace_backward))
        .route("/analysis/coinjoin/{txid}", get(analysis::coinjoin_score))
        .route("/analysis/coinjoin/history/{txid}", get(analysis::coinjoin_history))
        .route("/analysis/privacy-score", get(analysis::privacy_score))
        .route("/kyc/trace", post(kyc::trace).get(kyc::trace_query))
        .route("/kyc/quick-check", get(kyc::quick_check))
        .route("/kyc/presets", get(kyc::presets))
        .route("/addresses/{address}/validate", get(addresses::validate))
        .route("/addresses/{address}/info", get(addresses::info))
        .route("/addresses/{address}/balance", get(addresses::balance))
        .route("/addresses/{address}/history", get(addresses::history))
        .route("/addresses/{address}/utxos", get(addresses::utxos))
        .route("/addresses/{address}/dust-check", get(addresses::dust_check))
        .route("/addresses/{address}/label", get(addresses::get_label))
        .route(
            "/addresses/labels",
            get(addresses::list_labels).post(addresses::put_label_body),
        )
        .route(
            "/addresses/labels/{address}",
            get(addresses::get_label).post(addresses::put_label).delete(addresses::delete_label),
        )
        .route(
            "/visualizations/{view}/{format}",
            get(visualizations::render),
        )
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route(
            "/jobs/{id}",
            get(jobs::get_job).delete(jobs::cancel_job),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
