// SPDX-License-Identifier: CC0-1.0

//! The KYC withdrawal privacy analyser: given a known exchange withdrawal
//! transaction and the address it paid out to, traces the funds forward and
//! produces a ranked set of probable current destinations plus an overall
//! privacy score in `[0, 100]`.

pub mod analyser;
pub mod model;

pub use analyser::KycAnalyser;
pub use model::{
    ConfidenceLevel, DepthPreset, KycPathNode, KycResult, ProbableDestination, TrailStatus,
};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bitcoin::Txid;
    use std::collections::HashMap;
    use std::sync::Arc;
    use trace_engine::{NodeSource, NodeSourceError, SpendLookup};
    use types::model::{BlockchainInfo, DecodedTransaction, ScriptPubkey, ScriptType, TxOut, Vin, Vout};

    fn txid_from_byte(b: u8) -> Txid {
        format!("{:02x}", b).repeat(32).parse().unwrap()
    }

    fn script_pubkey(address: Option<&str>) -> ScriptPubkey {
        ScriptPubkey {
            script: bitcoin::ScriptBuf::new(),
            type_: ScriptType::P2wpkh,
            address: address.map(|a| a.parse().unwrap()),
        }
    }

    struct FakeNode {
        txs: HashMap<Txid, DecodedTransaction>,
        unspent: HashMap<(Txid, u32), TxOut>,
    }

    #[async_trait]
    impl NodeSource for FakeNode {
        async fn get_raw_transaction_verbose(
            &self,
            txid: Txid,
        ) -> Result<Option<DecodedTransaction>, NodeSourceError> {
            Ok(self.txs.get(&txid).cloned())
        }

        async fn get_tx_out(&self, txid: Txid, vout: u32) -> Result<Option<TxOut>, NodeSourceError> {
            Ok(self.unspent.get(&(txid, vout)).cloned())
        }

        async fn get_blockchain_info(&self) -> Result<BlockchainInfo, NodeSourceError> {
            Ok(BlockchainInfo {
                chain: "regtest".to_string(),
                blocks: 100,
                headers: 100,
                best_block_hash: "00".repeat(32).parse().unwrap(),
                initial_block_download: false,
            })
        }
    }

    struct FakeElectrum {
        spends: HashMap<(Txid, u32), Txid>,
    }

    #[async_trait]
    impl SpendLookup for FakeElectrum {
        async fn find_spending_tx(&self, txid: Txid, vout: u32) -> Result<Option<Txid>, NodeSourceError> {
            Ok(self.spends.get(&(txid, vout)).copied())
        }
    }

    const DEST_ADDR: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    #[tokio::test]
    async fn destination_not_found_in_seed_outputs_returns_empty_result() {
        let seed = txid_from_byte(0xaa);
        let tx = DecodedTransaction {
            txid: seed,
            vin: vec![Vin::Coinbase],
            vout: vec![Vout { n: 0, value_sats: 100_000_000, script_pubkey: script_pubkey(None) }],
            block_hash: None,
            block_time: None,
            confirmations: Some(6),
        };
        let node = FakeNode { txs: HashMap::from([(seed, tx)]), unspent: HashMap::new() };
        let analyser = KycAnalyser::new(Arc::new(node), None);

        let result = analyser.trace_kyc_withdrawal(seed, DEST_ADDR, DepthPreset::Quick).await;

        assert!(result.destinations.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("not found")));
    }

    #[tokio::test]
    async fn unspent_destination_is_a_dead_end_with_full_confidence() {
        let seed = txid_from_byte(0xbb);
        let vout = Vout { n: 0, value_sats: 50_000_000, script_pubkey: script_pubkey(Some(DEST_ADDR)) };
        let tx = DecodedTransaction {
            txid: seed,
            vin: vec![Vin::Coinbase],
            vout: vec![vout],
            block_hash: None,
            block_time: Some(1_700_000_000),
            confirmations: Some(6),
        };
        let txout = TxOut {
            value_sats: 50_000_000,
            script_pubkey: script_pubkey(Some(DEST_ADDR)),
            confirmations: 6,
            coinbase: false,
        };
        let node = FakeNode {
            txs: HashMap::from([(seed, tx)]),
            unspent: HashMap::from([((seed, 0), txout)]),
        };
        let analyser = KycAnalyser::new(Arc::new(node), None);

        let result = analyser.trace_kyc_withdrawal(seed, DEST_ADDR, DepthPreset::Quick).await;

        assert_eq!(result.destinations.len(), 1);
        assert_eq!(result.destinations[0].trail_status, TrailStatus::DeadEnd);
        assert_eq!(result.destinations[0].confidence_level, ConfidenceLevel::High);
        assert_eq!(result.total_traced_sats, 50_000_000);
    }

    #[tokio::test]
    async fn spent_without_electrum_is_lost_with_reduced_confidence() {
        let seed = txid_from_byte(0xcc);
        let vout = Vout { n: 0, value_sats: 25_000_000, script_pubkey: script_pubkey(Some(DEST_ADDR)) };
        let tx = DecodedTransaction {
            txid: seed,
            vin: vec![Vin::Coinbase],
            vout: vec![vout],
            block_hash: None,
            block_time: None,
            confirmations: Some(6),
        };
        let node = FakeNode { txs: HashMap::from([(seed, tx)]), unspent: HashMap::new() };
        let analyser = KycAnalyser::new(Arc::new(node), None);

        let result = analyser.trace_kyc_withdrawal(seed, DEST_ADDR, DepthPreset::Quick).await;

        assert!(!result.electrs_enabled);
        assert_eq!(result.destinations.len(), 1);
        assert_eq!(result.destinations[0].trail_status, TrailStatus::Lost);
    }

    #[tokio::test]
    async fn electrum_follows_spend_to_a_second_unspent_hop() {
        let seed = txid_from_byte(0x01);
        let next = txid_from_byte(0x02);
        let next_addr = "bc1q0ndu5hnr8u5w0x78k9ah09h7rwuzdhxuujv9cr";

        let seed_tx = DecodedTransaction {
            txid: seed,
            vin: vec![Vin::Coinbase],
            vout: vec![Vout { n: 0, value_sats: 10_000_000, script_pubkey: script_pubkey(Some(DEST_ADDR)) }],
            block_hash: None,
            block_time: None,
            confirmations: Some(6),
        };
        let next_tx = DecodedTransaction {
            txid: next,
            vin: vec![Vin::PrevOut { txid: seed, vout: 0 }],
            vout: vec![Vout { n: 0, value_sats: 9_999_000, script_pubkey: script_pubkey(Some(next_addr)) }],
            block_hash: None,
            block_time: None,
            confirmations: Some(3),
        };
        let next_txout = TxOut {
            value_sats: 9_999_000,
            script_pubkey: script_pubkey(Some(next_addr)),
            confirmations: 3,
            coinbase: false,
        };
        let node = FakeNode {
            txs: HashMap::from([(seed, seed_tx), (next, next_tx)]),
            unspent: HashMap::from([((next, 0), next_txout)]),
        };
        let electrum = FakeElectrum { spends: HashMap::from([((seed, 0), next)]) };
        let analyser = KycAnalyser::new(Arc::new(node), Some(Arc::new(electrum)));

        let result = analyser.trace_kyc_withdrawal(seed, DEST_ADDR, DepthPreset::Quick).await;

        assert!(result.electrs_enabled);
        assert_eq!(result.destinations.len(), 1);
        assert_eq!(result.destinations[0].trail_status, TrailStatus::DeadEnd);
        assert_eq!(result.destinations[0].path_length, 2);
        assert_eq!(result.destinations[0].value_sats, 9_999_000);
    }

    #[tokio::test]
    async fn no_destinations_scores_perfect_privacy() {
        let seed = txid_from_byte(0xdd);
        let node = FakeNode { txs: HashMap::new(), unspent: HashMap::new() };
        let analyser = KycAnalyser::new(Arc::new(node), None);

        let result = analyser.trace_kyc_withdrawal(seed, DEST_ADDR, DepthPreset::Standard).await;

        assert_eq!(result.overall_privacy_score, 100.0);
        assert_eq!(result.privacy_rating, "excellent");
    }
}
