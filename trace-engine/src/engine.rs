// SPDX-License-Identifier: CC0-1.0

//! The bounded BFS traversal engine.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bitcoin::Txid;
use tokio::sync::Mutex;
use tokio::time::Instant;
use types::model::{DecodedTransaction, Vin};

use crate::model::{Direction, TraceEdge, TraceNode, TraceResult, UtxoStatus};
use crate::source::{NodeSource, SpendLookup};

/// Fetched-transaction cap per trace.
pub const MAX_TX_PER_TRACE: u32 = 200;
/// Queue length cap; entries beyond this are truncated and the trace is
/// flagged `hit_limit`.
pub const MAX_QUEUE: usize = 1000;
/// Wall-clock deadline for a single trace.
pub const MAX_TRACE_TIME: Duration = Duration::from_secs(60);
/// Consecutive Electrum failures before the engine disables it for the rest
/// of the trace.
const ELECTRUM_FAILURE_STREAK_LIMIT: u32 = 3;

/// Entry consulted once per visited transaction: `(tx_count, visited_size, current_depth)`.
pub type ProgressCallback<'a> = Box<dyn FnMut(u32, usize, u32) + Send + 'a>;

/// A decoded transaction, or a remembered "not found / not decodable"
/// outcome. Only [`CachedTx::Decoded`] payloads are ever handed back to
/// callers; a non-decodable response is never stored as if it were one.
#[derive(Clone, Debug)]
enum CachedTx {
    Decoded(DecodedTransaction),
    Missing,
}

/// Per-trace transaction cache. Not shared across traces; reset via
/// [`Engine::clear_cache`].
#[derive(Default)]
struct TxCache {
    entries: std::collections::HashMap<Txid, CachedTx>,
}

impl TxCache {
    fn get(&self, txid: &Txid) -> Option<Option<&DecodedTransaction>> {
        match self.entries.get(txid) {
            Some(CachedTx::Decoded(tx)) => Some(Some(tx)),
            Some(CachedTx::Missing) => Some(None),
            None => None,
        }
    }
}

/// The traversal engine: bounded forward/backward BFS over the transaction
/// graph, backed by a [`NodeSource`] and an optional [`SpendLookup`].
pub struct Engine {
    node: Arc<dyn NodeSource>,
    electrum: Option<Arc<dyn SpendLookup>>,
    cache: Mutex<TxCache>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Engine {{ electrum_configured: {} }}", self.electrum.is_some())
    }
}

fn clamp_depth(max_depth: u32) -> u32 {
    max_depth.clamp(1, 50)
}

impl Engine {
    pub fn new(node: Arc<dyn NodeSource>, electrum: Option<Arc<dyn SpendLookup>>) -> Self {
        Self { node, electrum, cache: Mutex::new(TxCache::default()) }
    }

    /// Drops all cached transactions. Cheap; the cache is a per-trace
    /// optimisation, not a correctness requirement.
    pub async fn clear_cache(&self) {
        self.cache.lock().await.entries.clear();
    }

    async fn fetch_tx(&self, txid: Txid) -> Option<DecodedTransaction> {
        {
            let cache = self.cache.lock().await;
            if let Some(hit) = cache.get(&txid) {
                return hit.cloned();
            }
        }
        let fetched = self.node.get_raw_transaction_verbose(txid).await.unwrap_or(None);
        let mut cache = self.cache.lock().await;
        match &fetched {
            Some(tx) => cache.entries.insert(txid, CachedTx::Decoded(tx.clone())),
            None => cache.entries.insert(txid, CachedTx::Missing),
        };
        fetched
    }

    /// Approximate block height derived from the node's current tip and a
    /// transaction's confirmation count. `None` when either is unavailable
    /// (the trimmed RPC surface has no direct `block_height` field).
    async fn block_height(&self, tip_height: Option<u64>, tx: &DecodedTransaction) -> Option<u64> {
        let tip = tip_height?;
        let confirmations = tx.confirmations?;
        if confirmations == 0 {
            return None;
        }
        Some(tip.saturating_sub(confirmations).saturating_add(1))
    }

    /// `trace_forward(txid, vout, max_depth)`.
    pub async fn trace_forward(
        &self,
        txid: Txid,
        vout: u32,
        max_depth: u32,
        mut progress: Option<ProgressCallback<'_>>,
    ) -> TraceResult {
        let max_depth = clamp_depth(max_depth);
        let mut result =
            TraceResult::new(txid, Some(vout), Direction::Forward, max_depth, self.electrum.is_some());
        let deadline = Instant::now() + MAX_TRACE_TIME;

        let tip_height = self.node.get_blockchain_info().await.ok().map(|info| info.blocks);

        let mut queue: VecDeque<(Txid, u32, u32)> = VecDeque::new();
        queue.push_back((txid, vout, 0));
        let mut visited: HashSet<(Txid, u32)> = HashSet::new();
        let mut seen_txids: HashSet<Txid> = HashSet::new();
        let mut electrum_failures = 0u32;
        let mut electrum_enabled = self.electrum.is_some();

        while let Some((cur_txid, cur_vout, depth)) = queue.pop_front() {
            if Instant::now() >= deadline {
                result.hit_limit = true;
                result.warnings.push("Trace time limit reached; returning partial results".to_string());
                break;
            }
            if visited.contains(&(cur_txid, cur_vout)) {
                continue;
            }
            visited.insert((cur_txid, cur_vout));

            if depth > max_depth {
                result.warnings.push(format!("Depth limit reached at {cur_txid}:{cur_vout}"));
                continue;
            }

            let Some(tx) = self.fetch_tx(cur_txid).await else {
                result.warnings.push(format!("Transaction not found: {cur_txid}"));
                continue;
            };

            if seen_txids.insert(cur_txid) {
                result.total_transactions += 1;
                if result.total_transactions > MAX_TX_PER_TRACE {
                    result.hit_limit = true;
                    result.warnings.push("Transaction fetch limit reached; returning partial results".to_string());
                    break;
                }
            }

            let score = coinjoin::score(&tx);
            if score > coinjoin::COINJOIN_THRESHOLD && !result.coinjoin_txids.contains(&cur_txid) {
                result.coinjoin_txids.push(cur_txid);
            }

            let out = tx.vout.iter().find(|o| o.n == cur_vout);
            let Some(out) = out else {
                result.warnings.push(format!("Output {cur_vout} not present on {cur_txid}"));
                continue;
            };

            let block_height = self.block_height(tip_height, &tx).await;
            let mut node = TraceNode {
                txid: cur_txid,
                vout: Some(cur_vout),
                value_sats: out.value_sats,
                address: out.script_pubkey.address.as_ref().map(|a| a.to_string()),
                script_type: Some(out.script_pubkey.type_),
                status: UtxoStatus::Unknown,
                block_height,
                block_time: tx.block_time,
                spent_by_txid: None,
                spent_by_vin: None,
                depth,
                coinjoin_score: score,
            };

            result.total_value_traced_sats = result.total_value_traced_sats.saturating_add(out.value_sats);

            let txout = self.node.get_tx_out(cur_txid, cur_vout).await.unwrap_or(None);
            if txout.is_some() {
                node.status = UtxoStatus::Unspent;
                result.unspent_endpoints.push((cur_txid, cur_vout));
                result.nodes.push(node);
                continue;
            }

            node.status = UtxoStatus::Spent;
            let can_follow = electrum_enabled && node.address.is_some() && depth < max_depth;
            if can_follow {
                let electrum = self.electrum.as_ref().expect("electrum_enabled implies Some");
                match electrum.find_spending_tx(cur_txid, cur_vout).await {
                    Ok(Some(spending_txid)) => {
                        electrum_failures = 0;
                        if let Some(spending_tx) = self.fetch_tx(spending_txid).await {
                            let vin_index = spending_tx.vin.iter().position(|v| {
                                matches!(v, Vin::PrevOut { txid, vout } if *txid == cur_txid && *vout == cur_vout)
                            });
                            node.spent_by_txid = Some(spending_txid);
                            node.spent_by_vin = vin_index.map(|i| i as u32);
                            result.edges.push(TraceEdge {
                                from_txid: cur_txid,
                                from_vout: cur_vout,
                                to_txid: spending_txid,
                                to_vin: vin_index.unwrap_or(0) as u32,
                                value_sats: out.value_sats,
                            });
                            for spent_out in &spending_tx.vout {
                                let key = (spending_txid, spent_out.n);
                                if !visited.contains(&key) && queue.len() < MAX_QUEUE {
                                    queue.push_back((spending_txid, spent_out.n, depth + 1));
                                } else if queue.len() >= MAX_QUEUE {
                                    result.hit_limit = true;
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        electrum_failures = 0;
                    }
                    Err(_) => {
                        electrum_failures += 1;
                        if electrum_failures >= ELECTRUM_FAILURE_STREAK_LIMIT {
                            electrum_enabled = false;
                            result.electrs_enabled = false;
                            result.warnings.push(
                                "Electrum disabled for the remainder of this trace after repeated failures"
                                    .to_string(),
                            );
                        }
                    }
                }
            }

            result.nodes.push(node);

            if let Some(cb) = progress.as_mut() {
                cb(result.total_transactions, visited.len(), depth);
            }
        }

        result.execution_time_ms = (Instant::now() - (deadline - MAX_TRACE_TIME)).as_millis() as u64;
        result
    }

    /// `trace_backward(txid, max_depth)`.
    pub async fn trace_backward(
        &self,
        txid: Txid,
        max_depth: u32,
        mut progress: Option<ProgressCallback<'_>>,
    ) -> TraceResult {
        let max_depth = clamp_depth(max_depth);
        let mut result = TraceResult::new(txid, None, Direction::Backward, max_depth, false);
        let deadline = Instant::now() + MAX_TRACE_TIME;

        let mut queue: VecDeque<(Txid, u32)> = VecDeque::new();
        queue.push_back((txid, 0));
        let mut visited: HashSet<Txid> = HashSet::new();

        while let Some((cur_txid, depth)) = queue.pop_front() {
            if Instant::now() >= deadline {
                result.hit_limit = true;
                result.warnings.push("Trace time limit reached; returning partial results".to_string());
                break;
            }
            if visited.contains(&cur_txid) {
                continue;
            }
            visited.insert(cur_txid);

            if depth > max_depth {
                result.warnings.push(format!("Depth limit reached at {cur_txid}"));
                continue;
            }

            let Some(tx) = self.fetch_tx(cur_txid).await else {
                result.warnings.push(format!("Transaction not found: {cur_txid}"));
                continue;
            };

            result.total_transactions += 1;
            if result.total_transactions > MAX_TX_PER_TRACE {
                result.hit_limit = true;
                result.warnings.push("Transaction fetch limit reached; returning partial results".to_string());
                break;
            }

            if tx.is_coinbase() {
                let aggregated: u64 = tx.vout.iter().map(|o| o.value_sats).sum();
                result.coinbase_origins.push(cur_txid);
                result.nodes.push(TraceNode {
                    txid: cur_txid,
                    vout: None,
                    value_sats: aggregated,
                    address: None,
                    script_type: None,
                    status: UtxoStatus::Coinbase,
                    block_height: None,
                    block_time: tx.block_time,
                    spent_by_txid: None,
                    spent_by_vin: None,
                    depth,
                    coinjoin_score: 0.0,
                });
                continue;
            }

            let score = coinjoin::score(&tx);
            if score > coinjoin::COINJOIN_THRESHOLD && !result.coinjoin_txids.contains(&cur_txid) {
                result.coinjoin_txids.push(cur_txid);
            }

            let total_in: u64 = tx.vout.iter().map(|o| o.value_sats).sum();
            result.nodes.push(TraceNode {
                txid: cur_txid,
                vout: None,
                value_sats: total_in,
                address: None,
                script_type: None,
                status: UtxoStatus::Unknown,
                block_height: None,
                block_time: tx.block_time,
                spent_by_txid: None,
                spent_by_vin: None,
                depth,
                coinjoin_score: score,
            });

            for (vin_index, vin) in tx.vin.iter().enumerate() {
                if let Vin::PrevOut { txid: prev_txid, vout: prev_vout } = vin {
                    result.edges.push(TraceEdge {
                        from_txid: *prev_txid,
                        from_vout: *prev_vout,
                        to_txid: cur_txid,
                        to_vin: vin_index as u32,
                        value_sats: 0,
                    });
                    if !visited.contains(prev_txid) && depth < max_depth && queue.len() < MAX_QUEUE {
                        queue.push_back((*prev_txid, depth + 1));
                    } else if queue.len() >= MAX_QUEUE {
                        result.hit_limit = true;
                    }
                }
            }

            if let Some(cb) = progress.as_mut() {
                cb(result.total_transactions, visited.len(), depth);
            }
        }

        result.execution_time_ms = (Instant::now() - (deadline - MAX_TRACE_TIME)).as_millis() as u64;
        result
    }
}
