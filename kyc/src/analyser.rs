// SPDX-License-Identifier: CC0-1.0

//! The KYC privacy analyser: a forward trace seeded at one followed output,
//! synthesising ranked probable destinations and an overall privacy score.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use bitcoin::Txid;
use trace_engine::{NodeSource, NodeSourceError, SpendLookup};
use types::model::{DecodedTransaction, ScriptType, Vin};

use crate::model::{
    ConfidenceLevel, DepthPreset, KycPathNode, KycResult, ProbableDestination, TrailStatus,
};

/// Fetched-transaction cap for a single KYC trace. Distinct from, and
/// looser than, the traversal engine's own cap: a KYC trace typically
/// follows one narrow path rather than fanning out across a whole subgraph.
const MAX_TRANSACTIONS: u32 = 300;
const MAX_QUEUE_SIZE: usize = trace_engine::MAX_QUEUE;
/// Two CoinJoins on a path: the trail is considered cold.
const MAX_COINJOINS_BEFORE_COLD: u32 = 2;

struct Frame {
    txid: Txid,
    vout: u32,
    depth: u32,
    cj_count: u32,
    path: Vec<KycPathNode>,
    tracked_value: u64,
}

/// Traces a known exchange withdrawal forward to estimate how traceable the
/// current holdings derived from it are.
pub struct KycAnalyser {
    node: Arc<dyn NodeSource>,
    electrum: Option<Arc<dyn SpendLookup>>,
    tx_cache: tokio::sync::Mutex<HashMap<Txid, Option<DecodedTransaction>>>,
}

impl std::fmt::Debug for KycAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KycAnalyser {{ electrum_configured: {} }}", self.electrum.is_some())
    }
}

impl KycAnalyser {
    pub fn new(node: Arc<dyn NodeSource>, electrum: Option<Arc<dyn SpendLookup>>) -> Self {
        Self { node, electrum, tx_cache: tokio::sync::Mutex::new(HashMap::new()) }
    }

    async fn fetch_tx(&self, txid: Txid) -> Option<DecodedTransaction> {
        {
            let cache = self.tx_cache.lock().await;
            if let Some(hit) = cache.get(&txid) {
                return hit.clone();
            }
        }
        let fetched = self.node.get_raw_transaction_verbose(txid).await.unwrap_or(None);
        self.tx_cache.lock().await.insert(txid, fetched.clone());
        fetched
    }

    /// Resolves the set of input addresses and script types for a
    /// transaction, by fetching each referenced previous output. Used only
    /// for change-output heuristics.
    async fn input_context(&self, tx: &DecodedTransaction) -> (HashSet<String>, HashSet<ScriptType>) {
        let mut addresses = HashSet::new();
        let mut types = HashSet::new();
        for vin in &tx.vin {
            if let Vin::PrevOut { txid, vout } = vin {
                if let Some(prev_tx) = self.fetch_tx(*txid).await {
                    if let Some(out) = prev_tx.vout.iter().find(|o| o.n == *vout) {
                        if let Some(addr) = &out.script_pubkey.address {
                            addresses.insert(addr.to_string());
                        }
                        types.insert(out.script_pubkey.type_);
                    }
                }
            }
        }
        (addresses, types)
    }

    /// `trace_kyc_withdrawal(exchange_txid, destination_address, depth_preset)`.
    pub async fn trace_kyc_withdrawal(
        &self,
        exchange_txid: Txid,
        destination_address: &str,
        depth_preset: DepthPreset,
    ) -> KycResult {
        let max_depth = depth_preset.depth().clamp(1, 15);
        let mut result = KycResult::empty(exchange_txid, destination_address.to_string(), max_depth);
        result.electrs_enabled = self.electrum.is_some();
        if self.electrum.is_none() {
            result.warnings.push("Electrum not available - forward tracing will be limited".to_string());
        }

        let Some(seed_tx) = self.fetch_tx(exchange_txid).await else {
            result.warnings.push(format!("Transaction not found: {exchange_txid}"));
            result.summary = "Could not find the exchange transaction".to_string();
            return result;
        };

        let seed_out = seed_tx
            .vout
            .iter()
            .find(|o| o.script_pubkey.address.as_ref().map(|a| a.to_string()).as_deref() == Some(destination_address));
        let Some(seed_out) = seed_out else {
            result.warnings.push(format!(
                "Destination address {destination_address} not found in transaction outputs"
            ));
            result.summary = "The destination address was not found in the transaction".to_string();
            return result;
        };
        let start_value = seed_out.value_sats;
        let start_vout = seed_out.n;
        result.original_value_sats = start_value;

        let mut queue: VecDeque<Frame> = VecDeque::new();
        queue.push_back(Frame {
            txid: exchange_txid,
            vout: start_vout,
            depth: 0,
            cj_count: 0,
            path: Vec::new(),
            tracked_value: start_value,
        });

        let mut visited: HashSet<(Txid, u32)> = HashSet::new();
        let mut destinations: Vec<ProbableDestination> = Vec::new();
        let mut tx_count = 0u32;
        let mut coinjoin_txids: HashSet<Txid> = HashSet::new();
        let mut electrum_failures = 0u32;

        while let Some(frame) = queue.pop_front() {
            if tx_count >= MAX_TRANSACTIONS {
                result.warnings.push("Transaction fetch limit reached; returning partial results".to_string());
                break;
            }
            if queue.len() > MAX_QUEUE_SIZE {
                result.warnings.push("Queue size exceeded, some paths truncated".to_string());
                queue.truncate(MAX_QUEUE_SIZE);
            }
            if visited.contains(&(frame.txid, frame.vout)) {
                continue;
            }
            visited.insert((frame.txid, frame.vout));

            if frame.depth > max_depth {
                if !frame.path.is_empty() {
                    let (conf, mut reasoning) = path_confidence(&frame.path, start_value);
                    reasoning.push("Hit depth limit".to_string());
                    let conf = conf * 0.5;
                    destinations.push(ProbableDestination {
                        address: frame.path.last().and_then(|n| n.address.clone()).unwrap_or_else(|| "unknown".to_string()),
                        value_sats: frame.tracked_value,
                        confidence_score: conf,
                        confidence_level: ConfidenceLevel::from_score(conf),
                        path_length: frame.path.len() as u32,
                        coinjoins_passed: frame.cj_count,
                        trail_status: TrailStatus::DepthLimit,
                        reasoning,
                        path: frame.path,
                    });
                }
                continue;
            }

            let Some(tx) = self.fetch_tx(frame.txid).await else { continue };
            tx_count += 1;

            let Some(out) = tx.vout.iter().find(|o| o.n == frame.vout) else { continue };
            let value_sats = out.value_sats;
            let address = out.script_pubkey.address.as_ref().map(|a| a.to_string());

            let score = coinjoin::score(&tx);
            let is_coinjoin = score >= coinjoin::COINJOIN_THRESHOLD;
            let mut cj_count = frame.cj_count;
            if is_coinjoin {
                cj_count += 1;
                coinjoin_txids.insert(frame.txid);
            }

            let (input_addresses, input_types) = self.input_context(&tx).await;
            let (is_change, change_probability) =
                detect_change(&tx, &input_addresses, &input_types, frame.vout);

            let node = KycPathNode {
                txid: frame.txid,
                vout: frame.vout,
                value_sats,
                address: address.clone(),
                block_height: None,
                block_time: tx.block_time,
                is_coinjoin,
                coinjoin_score: score,
                coinjoin_count_in_path: cj_count,
                depth: frame.depth,
                is_change,
                change_probability,
            };
            let mut path = frame.path;
            path.push(node);

            if cj_count >= MAX_COINJOINS_BEFORE_COLD {
                let (conf, mut reasoning) = path_confidence(&path, start_value);
                reasoning.push(format!("Trail went cold after {cj_count} CoinJoins"));
                result.total_untraceable_sats = result.total_untraceable_sats.saturating_add(value_sats);
                destinations.push(ProbableDestination {
                    address: address.unwrap_or_else(|| "unknown".to_string()),
                    value_sats,
                    confidence_score: conf,
                    confidence_level: ConfidenceLevel::from_score(conf),
                    path_length: path.len() as u32,
                    coinjoins_passed: cj_count,
                    trail_status: TrailStatus::Cold,
                    reasoning,
                    path,
                });
                continue;
            }

            let utxo = self.node.get_tx_out(frame.txid, frame.vout).await.unwrap_or(None);
            if utxo.is_some() {
                let (conf, mut reasoning) = path_confidence(&path, start_value);
                reasoning.push("UTXO is unspent (current holding)".to_string());
                result.total_traced_sats = result.total_traced_sats.saturating_add(value_sats);
                destinations.push(ProbableDestination {
                    address: address.unwrap_or_else(|| "unknown".to_string()),
                    value_sats,
                    confidence_score: conf,
                    confidence_level: ConfidenceLevel::from_score(conf),
                    path_length: path.len() as u32,
                    coinjoins_passed: cj_count,
                    trail_status: TrailStatus::DeadEnd,
                    reasoning,
                    path,
                });
                continue;
            }

            let can_follow = self.electrum.is_some() && address.is_some();
            if can_follow {
                let electrum = self.electrum.as_ref().expect("checked above");
                match electrum.find_spending_tx(frame.txid, frame.vout).await {
                    Ok(Some(spending_txid)) => {
                        electrum_failures = 0;
                        if let Some(spending_tx) = self.fetch_tx(spending_txid).await {
                            for out in &spending_tx.vout {
                                if !visited.contains(&(spending_txid, out.n)) {
                                    queue.push_back(Frame {
                                        txid: spending_txid,
                                        vout: out.n,
                                        depth: frame.depth + 1,
                                        cj_count,
                                        path: path.clone(),
                                        tracked_value: out.value_sats,
                                    });
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        electrum_failures = 0;
                        let (conf, mut reasoning) = path_confidence(&path, start_value);
                        reasoning.push("UTXO spent but spending transaction not found".to_string());
                        let conf = conf * 0.3;
                        destinations.push(ProbableDestination {
                            address: address.unwrap_or_else(|| "unknown".to_string()),
                            value_sats,
                            confidence_score: conf,
                            confidence_level: ConfidenceLevel::Low,
                            path_length: path.len() as u32,
                            coinjoins_passed: cj_count,
                            trail_status: TrailStatus::Lost,
                            reasoning,
                            path,
                        });
                    }
                    Err(NodeSourceError(_)) => {
                        electrum_failures += 1;
                        let (conf, mut reasoning) = path_confidence(&path, start_value);
                        reasoning.push("Electrum lookup failed".to_string());
                        let conf = conf * 0.3;
                        destinations.push(ProbableDestination {
                            address: address.unwrap_or_else(|| "unknown".to_string()),
                            value_sats,
                            confidence_score: conf,
                            confidence_level: ConfidenceLevel::Low,
                            path_length: path.len() as u32,
                            coinjoins_passed: cj_count,
                            trail_status: TrailStatus::Lost,
                            reasoning,
                            path,
                        });
                    }
                }
            } else {
                let (conf, mut reasoning) = path_confidence(&path, start_value);
                reasoning.push("Cannot follow spent output (Electrum required)".to_string());
                let conf = conf * 0.5;
                destinations.push(ProbableDestination {
                    address: address.unwrap_or_else(|| "unknown".to_string()),
                    value_sats,
                    confidence_score: conf,
                    confidence_level: ConfidenceLevel::from_score(conf),
                    path_length: path.len() as u32,
                    coinjoins_passed: cj_count,
                    trail_status: TrailStatus::Lost,
                    reasoning,
                    path,
                });
            }
        }

        // Anything still queued when the budget ran out is neither resolved
        // nor abandoned: surface it as `active` rather than dropping it.
        while let Some(frame) = queue.pop_front() {
            if visited.contains(&(frame.txid, frame.vout)) || frame.path.is_empty() {
                continue;
            }
            let (conf, mut reasoning) = path_confidence(&frame.path, start_value);
            reasoning.push("Trace budget exhausted before this path resolved".to_string());
            destinations.push(ProbableDestination {
                address: frame.path.last().and_then(|n| n.address.clone()).unwrap_or_else(|| "unknown".to_string()),
                value_sats: frame.tracked_value,
                confidence_score: conf,
                confidence_level: ConfidenceLevel::from_score(conf),
                path_length: frame.path.len() as u32,
                coinjoins_passed: frame.cj_count,
                trail_status: TrailStatus::Active,
                reasoning,
                path: frame.path,
            });
        }

        destinations.sort_by(|a, b| b.confidence_score.partial_cmp(&a.confidence_score).unwrap());
        result.destinations = destinations;
        result.coinjoins_encountered = coinjoin_txids.len() as u32;

        if electrum_failures > 0 {
            result
                .warnings
                .push(format!("Electrum connection issues: {electrum_failures} lookup(s) failed - results may be incomplete"));
        }

        result.overall_privacy_score = overall_privacy_score(&result);
        result.privacy_rating = privacy_rating(result.overall_privacy_score).to_string();
        result.summary = generate_summary(&result);
        result.recommendations = generate_recommendations(&result);

        result
    }
}

/// Weighted change-output heuristic (§4.F). `probability = min(sum, 0.95)`;
/// `is_change = probability > 0.3`.
fn detect_change(
    tx: &DecodedTransaction,
    input_addresses: &HashSet<String>,
    input_types: &HashSet<ScriptType>,
    output_idx: u32,
) -> (bool, f64) {
    let Some(output) = tx.vout.iter().find(|o| o.n == output_idx) else {
        return (false, 0.0);
    };

    let mut probability = 0.0;
    if let Some(addr) = &output.script_pubkey.address {
        if input_addresses.contains(&addr.to_string()) {
            probability += 0.40;
        }
    }
    if input_types.contains(&output.script_pubkey.type_) {
        probability += 0.10;
    }
    if output.value_sats % 100_000 != 0 {
        probability += 0.15;
    }
    let max_output = tx.vout.iter().map(|o| o.value_sats).max().unwrap_or(0);
    if output.value_sats < max_output {
        probability += 0.10;
    }
    if output_idx as usize == tx.vout.len().saturating_sub(1) {
        probability += 0.05;
    }

    let probability = probability.min(0.95);
    (probability > 0.3, probability)
}

/// Per-destination confidence multiplier chain (§4.F).
fn path_confidence(path: &[KycPathNode], original_value: u64) -> (f64, Vec<String>) {
    if path.is_empty() {
        return (0.0, vec!["Empty path".to_string()]);
    }

    let mut confidence = 1.0;
    let mut reasoning = Vec::new();

    let path_length = path.len();
    match path_length {
        1 => reasoning.push("Direct transfer (1 hop)".to_string()),
        2..=3 => {
            confidence *= 0.9;
            reasoning.push(format!("Short path ({path_length} hops)"));
        }
        4..=6 => {
            confidence *= 0.7;
            reasoning.push(format!("Medium path ({path_length} hops)"));
        }
        _ => {
            confidence *= 0.5;
            reasoning.push(format!("Long path ({path_length} hops)"));
        }
    }

    let coinjoins = path.iter().filter(|n| n.is_coinjoin).count();
    match coinjoins {
        0 => reasoning.push("No CoinJoins in path".to_string()),
        1 => {
            confidence *= 0.4;
            reasoning.push("Passed through 1 CoinJoin (reduced confidence)".to_string());
        }
        n => {
            confidence *= 0.1;
            reasoning.push(format!("Passed through {n} CoinJoins (trail very cold)"));
        }
    }

    let final_value = path.last().expect("non-empty").value_sats;
    let value_ratio = final_value as f64 / (original_value.max(1) as f64);
    if value_ratio > 0.9 {
        reasoning.push("Value very similar to original (>90%)".to_string());
    } else if value_ratio > 0.5 {
        confidence *= 0.8;
        reasoning.push(format!("Value is {:.0}% of original", value_ratio * 100.0));
    } else if value_ratio > 0.1 {
        confidence *= 0.6;
        reasoning.push(format!("Value is {:.0}% of original (likely split)", value_ratio * 100.0));
    } else {
        confidence *= 0.4;
        reasoning.push(format!("Value is only {:.1}% of original", value_ratio * 100.0));
    }

    let change_nodes: Vec<&KycPathNode> = path.iter().filter(|n| n.is_change).collect();
    if !change_nodes.is_empty() {
        let avg_change_prob =
            change_nodes.iter().map(|n| n.change_probability).sum::<f64>() / change_nodes.len() as f64;
        confidence *= 0.7 + 0.3 * avg_change_prob;
        reasoning.push(format!("Path follows likely change outputs ({} nodes)", change_nodes.len()));
    }

    (confidence.clamp(0.0, 1.0), reasoning)
}

/// Overall 0-100 privacy score; higher is more private. An empty
/// destination set scores 100 (nothing traceable).
fn overall_privacy_score(result: &KycResult) -> f64 {
    if result.destinations.is_empty() {
        return 100.0;
    }

    let mut score = 0.0;

    if result.original_value_sats > 0 {
        let untraceable_ratio = result.total_untraceable_sats as f64 / result.original_value_sats as f64;
        score += untraceable_ratio * 40.0;
    }

    if result.coinjoins_encountered >= 2 {
        score += 30.0;
    } else if result.coinjoins_encountered == 1 {
        score += 15.0;
    }

    let high_conf =
        result.destinations.iter().filter(|d| d.confidence_level == ConfidenceLevel::High).count();
    if high_conf == 0 {
        score += 20.0;
    } else if high_conf == 1 {
        score += 5.0;
    }

    let avg_path_length = result.destinations.iter().map(|d| d.path_length).sum::<u32>() as f64
        / result.destinations.len().max(1) as f64;
    score += (avg_path_length * 2.0).min(10.0);

    score.min(100.0)
}

fn privacy_rating(score: f64) -> &'static str {
    if score >= 80.0 {
        "excellent"
    } else if score >= 60.0 {
        "good"
    } else if score >= 40.0 {
        "moderate"
    } else if score >= 20.0 {
        "poor"
    } else {
        "very_poor"
    }
}

fn generate_summary(result: &KycResult) -> String {
    let high_conf = result.destinations.iter().filter(|d| d.confidence_level == ConfidenceLevel::High).count();
    let med_conf = result.destinations.iter().filter(|d| d.confidence_level == ConfidenceLevel::Medium).count();

    if result.overall_privacy_score >= 80.0 {
        format!(
            "Excellent privacy! Your funds are well protected. {} CoinJoin(s) detected in paths.",
            result.coinjoins_encountered
        )
    } else if result.overall_privacy_score >= 60.0 {
        format!(
            "Good privacy. Most trails are cold or have low confidence. Found {high_conf} high-confidence destination(s)."
        )
    } else if result.overall_privacy_score >= 40.0 {
        format!(
            "Moderate privacy. An adversary could potentially trace some funds. Found {high_conf} high-confidence and {med_conf} medium-confidence destination(s)."
        )
    } else if result.overall_privacy_score >= 20.0 {
        format!("Poor privacy. Your funds can be traced with reasonable confidence to {high_conf} address(es).")
    } else {
        format!("Very poor privacy. Your funds are easily traceable to {high_conf} address(es) with high confidence.")
    }
}

fn generate_recommendations(result: &KycResult) -> Vec<String> {
    let mut recs = Vec::new();

    if result.coinjoins_encountered == 0 {
        recs.push("Consider using CoinJoin (Whirlpool, Wasabi, or JoinMarket) to break the transaction trail".to_string());
    }

    let high_conf: Vec<&ProbableDestination> =
        result.destinations.iter().filter(|d| d.confidence_level == ConfidenceLevel::High).collect();
    if !high_conf.is_empty() {
        recs.push(format!(
            "You have {} easily traceable destination(s). Consider moving these funds through a CoinJoin",
            high_conf.len()
        ));
    }

    if result.overall_privacy_score < 60.0 {
        recs.push("Avoid consolidating UTXOs from different sources without mixing first".to_string());
        recs.push("Use a new address for each transaction to prevent address clustering".to_string());
    }

    if !result.electrs_enabled {
        recs.push("Enable Electrs for more accurate forward tracing analysis".to_string());
    }

    let mut all_addresses: Vec<&str> = Vec::new();
    for dest in &result.destinations {
        for node in &dest.path {
            if let Some(addr) = &node.address {
                all_addresses.push(addr);
            }
        }
    }
    let unique: HashSet<&str> = all_addresses.iter().copied().collect();
    if unique.len() != all_addresses.len() {
        recs.push("Address reuse detected in your transaction history - this hurts privacy".to_string());
    }

    if recs.is_empty() {
        recs.push("Your privacy practices look good! Continue using CoinJoin and avoiding address reuse".to_string());
    }

    recs
}
