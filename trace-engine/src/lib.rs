// SPDX-License-Identifier: CC0-1.0

//! The bounded BFS traversal engine over the Bitcoin UTXO graph: forward
//! tracing ("where did these coins go?") and backward tracing ("where did
//! they come from?"), annotated with CoinJoin scores and Electrum-derived
//! spend links.

pub mod engine;
pub mod model;
pub mod source;

pub use engine::{Engine, ProgressCallback, MAX_QUEUE, MAX_TRACE_TIME, MAX_TX_PER_TRACE};
pub use model::{Direction, TraceEdge, TraceNode, TraceResult, UtxoStatus};
pub use source::{NodeSource, NodeSourceError, RpcNodeSource, SpendLookup};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bitcoin::Txid;
    use std::collections::HashMap;
    use std::sync::Arc;
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

    #[tokio::test]
    async fn unspent_seed_produces_one_node() {
        let seed = txid_from_byte(0xaa);
        let vout = Vout { n: 0, value_sats: 100_000_000, script_pubkey: script_pubkey(None) };
        let tx = DecodedTransaction {
            txid: seed,
            vin: vec![Vin::Coinbase],
            vout: vec![vout],
            block_hash: None,
            block_time: Some(1_700_000_000),
            confirmations: Some(6),
        };
        let txout = TxOut {
            value_sats: 100_000_000,
            script_pubkey: script_pubkey(None),
            confirmations: 6,
            coinbase: false,
        };
        let node = FakeNode {
            txs: HashMap::from([(seed, tx)]),
            unspent: HashMap::from([((seed, 0), txout)]),
        };
        let engine = Engine::new(Arc::new(node), None);

        let result = engine.trace_forward(seed, 0, 10, None).await;

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.unspent_endpoints, vec![(seed, 0)]);
        assert_eq!(result.total_value_traced_sats, 100_000_000);
        assert!(!result.hit_limit);
    }

    #[tokio::test]
    async fn max_depth_zero_emits_only_the_seed() {
        let seed = txid_from_byte(0xbb);
        let vout = Vout { n: 0, value_sats: 50_000, script_pubkey: script_pubkey(Some("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq")) };
        let tx = DecodedTransaction {
            txid: seed,
            vin: vec![Vin::Coinbase],
            vout: vec![vout],
            block_hash: None,
            block_time: None,
            confirmations: None,
        };
        let node = FakeNode { txs: HashMap::from([(seed, tx)]), unspent: HashMap::new() };
        let engine = Engine::new(Arc::new(node), None);

        let result = engine.trace_forward(seed, 0, 0, None).await;

        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.edges.len(), 0);
    }

    #[tokio::test]
    async fn unknown_seed_returns_empty_result_with_warning() {
        let seed = txid_from_byte(0xcc);
        let node = FakeNode { txs: HashMap::new(), unspent: HashMap::new() };
        let engine = Engine::new(Arc::new(node), None);

        let result = engine.trace_forward(seed, 0, 10, None).await;

        assert!(result.nodes.is_empty());
        assert!(result.warnings.iter().any(|w| w.contains("not found")));
    }

    #[tokio::test]
    async fn backward_trace_stops_at_coinbase() {
        let coinbase_txid = txid_from_byte(0x01);
        let spend_txid = txid_from_byte(0x02);

        let coinbase_tx = DecodedTransaction {
            txid: coinbase_txid,
            vin: vec![Vin::Coinbase],
            vout: vec![Vout { n: 0, value_sats: 5_000_000_000, script_pubkey: script_pubkey(None) }],
            block_hash: None,
            block_time: None,
            confirmations: Some(200),
        };
        let spend_tx = DecodedTransaction {
            txid: spend_txid,
            vin: vec![Vin::PrevOut { txid: coinbase_txid, vout: 0 }],
            vout: vec![Vout { n: 0, value_sats: 4_999_000_000, script_pubkey: script_pubkey(None) }],
            block_hash: None,
            block_time: None,
            confirmations: Some(10),
        };
        let node = FakeNode {
            txs: HashMap::from([(coinbase_txid, coinbase_tx), (spend_txid, spend_tx)]),
            unspent: HashMap::new(),
        };
        let engine = Engine::new(Arc::new(node), None);

        let result = engine.trace_backward(spend_txid, 10, None).await;

        assert_eq!(result.coinbase_origins, vec![coinbase_txid]);
        assert!(result.nodes.iter().any(|n| n.status == UtxoStatus::Coinbase));
    }
}
