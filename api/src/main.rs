// SPDX-License-Identifier: CC0-1.0

//! The HTTP API binary: wires the trace engine, KYC analyser, label store,
//! and renderer behind `axum`, with structured logging via `tracing`.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use clap::Parser;
use electrum::Client as ElectrumClient;
use kyc::KycAnalyser;
use labels::Store;
use rpc_client::Client as RpcClient;
use tokio::sync::broadcast;
use trace_engine::{Engine, RpcNodeSource, SpendLookup};

use crate::config::Config;
use crate::state::{AppState, HealthCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .json()
        .init();

    let build_rpc = || match (&config.bitcoin_rpc_user, &config.bitcoin_rpc_password) {
        (Some(user), Some(password)) => {
            RpcClient::new_with_auth(config.bitcoin_rpc_url.clone(), user.clone(), password.clone())
        }
        _ => RpcClient::new(config.bitcoin_rpc_url.clone()),
    };
    let rpc = Arc::new(build_rpc());
    let node = Arc::new(RpcNodeSource::new(build_rpc()));

    let electrum = config.electrs_host.as_ref().map(|host| Arc::new(ElectrumClient::new(host.clone(), config.electrs_port)));
    let electrum_lookup: Option<Arc<dyn SpendLookup>> = electrum.clone().map(spend_lookup_coercion);

    let engine = Arc::new(Engine::new(node.clone(), electrum_lookup.clone()));
    let kyc = Arc::new(KycAnalyser::new(node.clone(), electrum_lookup.clone()));

    let store = Store::connect(&config.database_url).await?;
    let (ws_tx, _) = broadcast::channel(256);

    let state = AppState {
        config: Arc::new(config.clone()),
        rpc,
        node,
        electrum,
        electrum_lookup,
        engine,
        kyc,
        store,
        ws_tx,
        health_cache: Arc::new(HealthCache::default()),
    };

    if config.enable_background_indexer {
        let indexer_state = state.clone();
        tokio::spawn(routes::jobs::run_background_indexer(indexer_state));
    }

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.api_port)).await?;
    tracing::info!(port = config.api_port, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

fn spend_lookup_coercion(client: Arc<ElectrumClient>) -> Arc<dyn SpendLookup> {
    client
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("install Ctrl+C handler");
}
