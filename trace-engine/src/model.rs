// SPDX-License-Identifier: CC0-1.0

//! Trace result data model: one visit per UTXO (or per transaction in
//! backward mode), annotated with CoinJoin and spend-status signals.

use bitcoin::Txid;
use types::model::ScriptType;

/// Which way the BFS walks the transaction graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// Observable lifecycle state of a UTXO.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtxoStatus {
    Unspent,
    Spent,
    Coinbase,
    Unknown,
}

/// A record of one visit to a UTXO (forward mode) or a whole transaction
/// (backward mode, where `vout` is `None`).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TraceNode {
    pub txid: Txid,
    pub vout: Option<u32>,
    pub value_sats: u64,
    pub address: Option<String>,
    pub script_type: Option<ScriptType>,
    pub status: UtxoStatus,
    pub block_height: Option<u64>,
    pub block_time: Option<u64>,
    pub spent_by_txid: Option<Txid>,
    pub spent_by_vin: Option<u32>,
    pub depth: u32,
    pub coinjoin_score: f64,
}

/// A directed spend link `(from_txid, from_vout) -> (to_txid, to_vin)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TraceEdge {
    pub from_txid: Txid,
    pub from_vout: u32,
    pub to_txid: Txid,
    pub to_vin: u32,
    pub value_sats: u64,
}

/// The full result of one `trace_forward` / `trace_backward` call.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TraceResult {
    pub start_txid: Txid,
    pub start_vout: Option<u32>,
    pub direction: Direction,
    pub max_depth: u32,
    pub nodes: Vec<TraceNode>,
    pub edges: Vec<TraceEdge>,
    pub unspent_endpoints: Vec<(Txid, u32)>,
    pub coinbase_origins: Vec<Txid>,
    pub coinjoin_txids: Vec<Txid>,
    pub total_transactions: u32,
    pub total_value_traced_sats: u64,
    pub execution_time_ms: u64,
    pub warnings: Vec<String>,
    pub hit_limit: bool,
    pub electrs_enabled: bool,
}

impl TraceResult {
    pub(crate) fn new(
        start_txid: Txid,
        start_vout: Option<u32>,
        direction: Direction,
        max_depth: u32,
        electrs_enabled: bool,
    ) -> Self {
        Self {
            start_txid,
            start_vout,
            direction,
            max_depth,
            nodes: Vec::new(),
            edges: Vec::new(),
            unspent_endpoints: Vec::new(),
            coinbase_origins: Vec::new(),
            coinjoin_txids: Vec::new(),
            total_transactions: 0,
            total_value_traced_sats: 0,
            execution_time_ms: 0,
            warnings: Vec::new(),
            hit_limit: false,
            electrs_enabled,
        }
    }
}
