// SPDX-License-Identifier: CC0-1.0

//! Structural CoinJoin scoring.
//!
//! A pure function over a decoded transaction's output-value multiset and
//! input count. No network I/O, no state; the traversal engine calls this
//! once per visited transaction and treats the result as a signal, not a
//! classification.

use std::collections::HashMap;

use types::model::DecodedTransaction;

/// Whirlpool pool denominations, in satoshis (0.001 / 0.01 / 0.05 / 0.5 BTC).
const WHIRLPOOL_DENOMINATIONS_SATS: [u64; 4] = [100_000, 1_000_000, 5_000_000, 50_000_000];

/// Tolerance around a Whirlpool denomination, in satoshis (10⁻⁴ BTC).
const WHIRLPOOL_TOLERANCE_SATS: u64 = 10_000;

/// The score above which a hop counts as "mixed" from the traversal engine's
/// perspective. The KYC analyser uses a separate, inclusive threshold
/// (`>= COINJOIN_THRESHOLD`); see `utxotrace-kyc`.
pub const COINJOIN_THRESHOLD: f64 = 0.7;

/// Scores a decoded transaction's structure on a 0.0–1.0 CoinJoin likelihood
/// scale.
///
/// `score(tx) > 0.7` is the traversal engine's CoinJoin-hop threshold.
pub fn score(tx: &DecodedTransaction) -> f64 {
    let n_out = tx.vout.len();
    let n_in = tx.vin.len();

    if n_out < 2 {
        return 0.0;
    }

    let mut multiplicity: HashMap<u64, usize> = HashMap::new();
    for out in &tx.vout {
        *multiplicity.entry(out.value_sats).or_insert(0) += 1;
    }
    let max_eq = multiplicity.values().copied().max().unwrap_or(0);
    let unique_count = multiplicity.len();

    if n_out == 5 && max_eq == 5 {
        let equal_value = *multiplicity.keys().next().expect("max_eq == 5 implies one key");
        let is_whirlpool = WHIRLPOOL_DENOMINATIONS_SATS
            .iter()
            .any(|d| equal_value.abs_diff(*d) <= WHIRLPOOL_TOLERANCE_SATS);
        return if is_whirlpool { 0.95 } else { 0.85 };
    }
    if max_eq >= 10 {
        return 0.85;
    }
    if max_eq >= 5 && n_in >= 3 {
        return 0.70;
    }
    if max_eq >= 3 && n_in >= 2 {
        return 0.40;
    }
    if n_out >= 5 && (unique_count as f64 / n_out as f64) < 0.3 {
        return 0.50;
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::model::{ScriptPubkey, ScriptType, Vin, Vout};
    use types::bitcoin::{ScriptBuf, Txid};

    fn txid() -> Txid {
        "ab".repeat(32).parse().unwrap()
    }

    fn script_pubkey() -> ScriptPubkey {
        ScriptPubkey { script: ScriptBuf::new(), type_: ScriptType::Other, address: None }
    }

    fn vout(value_sats: u64, n: u32) -> Vout {
        Vout { n, value_sats, script_pubkey: script_pubkey() }
    }

    fn tx(n_in: usize, outputs: Vec<Vout>) -> DecodedTransaction {
        let vin = (0..n_in).map(|_| Vin::PrevOut { txid: txid(), vout: 0 }).collect();
        DecodedTransaction {
            txid: txid(),
            vin,
            vout: outputs,
            block_hash: None,
            block_time: None,
            confirmations: None,
        }
    }

    #[test]
    fn whirlpool_pool_size_is_scored_highest() {
        let outputs = (0..5).map(|n| vout(100_000, n)).collect();
        let t = tx(3, outputs);
        assert_eq!(score(&t), 0.95);
    }

    #[test]
    fn five_equal_outputs_off_whirlpool_denomination_scores_085() {
        let outputs = (0..5).map(|n| vout(123_456, n)).collect();
        let t = tx(3, outputs);
        assert_eq!(score(&t), 0.85);
    }

    #[test]
    fn ten_equal_outputs_scores_085() {
        let outputs = (0..10).map(|n| vout(50_000, n)).collect();
        let t = tx(2, outputs);
        assert_eq!(score(&t), 0.85);
    }

    #[test]
    fn five_equal_outputs_among_more_with_enough_inputs_scores_070() {
        let mut outputs: Vec<Vout> = (0..5).map(|n| vout(200_000, n)).collect();
        outputs.push(vout(999, 5));
        outputs.push(vout(888, 6));
        let t = tx(3, outputs);
        assert_eq!(score(&t), 0.70);
    }

    #[test]
    fn three_equal_outputs_with_two_inputs_scores_040() {
        let mut outputs: Vec<Vout> = (0..3).map(|n| vout(300_000, n)).collect();
        outputs.push(vout(111, 3));
        let t = tx(2, outputs);
        assert_eq!(score(&t), 0.40);
    }

    #[test]
    fn low_uniqueness_with_six_outputs_and_one_input_scores_050() {
        // max_eq=6, n_in=1: falls through the max_eq/n_in rules (they all
        // require n_in >= 2) down to the unique-ratio rule: 1/6 < 0.3.
        let outputs = (0..6).map(|n| vout(10_000, n)).collect();
        let t = tx(1, outputs);
        assert_eq!(score(&t), 0.50);
    }

    #[test]
    fn ordinary_payment_scores_zero() {
        let outputs = vec![vout(50_000, 0), vout(1_234_567, 1)];
        let t = tx(1, outputs);
        assert_eq!(score(&t), 0.0);
    }

    #[test]
    fn single_output_scores_zero() {
        let t = tx(1, vec![vout(50_000, 0)]);
        assert_eq!(score(&t), 0.0);
    }
}
