// SPDX-License-Identifier: CC0-1.0

//! Environment-sourced configuration, per the external-interfaces contract.

use clap::Parser;

#[derive(Clone, Debug, Parser)]
pub struct Config {
    #[arg(long, env = "BITCOIN_RPC_URL", default_value = "http://127.0.0.1:8332")]
    pub bitcoin_rpc_url: String,

    #[arg(long, env = "BITCOIN_RPC_USER")]
    pub bitcoin_rpc_user: Option<String>,

    #[arg(long, env = "BITCOIN_RPC_PASSWORD")]
    pub bitcoin_rpc_password: Option<String>,

    #[arg(long, env = "ELECTRS_HOST")]
    pub electrs_host: Option<String>,

    #[arg(long, env = "ELECTRS_PORT", default_value_t = 50001)]
    pub electrs_port: u16,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://utxotrace.db")]
    pub database_url: String,

    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    pub api_port: u16,

    #[arg(long, env = "DEFAULT_TRACE_DEPTH", default_value_t = 10)]
    pub default_trace_depth: u32,

    #[arg(long, env = "MAX_TRACE_DEPTH", default_value_t = 50)]
    pub max_trace_depth: u32,

    #[arg(long, env = "ENABLE_BACKGROUND_INDEXER", default_value_t = false)]
    pub enable_background_indexer: bool,

    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,
}

impl Config {
    pub fn electrum_configured(&self) -> bool {
        self.electrs_host.is_some()
    }
}
