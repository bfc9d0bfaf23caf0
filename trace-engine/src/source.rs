// SPDX-License-Identifier: CC0-1.0

//! Dependency seams the engine consults: the node RPC (decoded transactions,
//! UTXO status) and the Electrum "who spent this?" lookup. Both are traits
//! so tests can substitute fixture-replay fakes instead of real sockets, per
//! this system's explicit-dependency-injection design.

use async_trait::async_trait;
use bitcoin::Txid;
use types::model::{BlockchainInfo, DecodedTransaction, TxOut};

/// Errors surfaced by a [`NodeSource`]. Intentionally narrower than
/// `rpc-client`'s own error enum: the engine only needs to distinguish a
/// hard failure from "not found", the latter already folded into `Ok(None)`
/// by the callee.
#[derive(Debug, thiserror::Error)]
#[error("node source error: {0}")]
pub struct NodeSourceError(pub String);

/// What the engine needs from the Bitcoin full node.
#[async_trait]
pub trait NodeSource: Send + Sync {
    async fn get_raw_transaction_verbose(
        &self,
        txid: Txid,
    ) -> Result<Option<DecodedTransaction>, NodeSourceError>;

    async fn get_tx_out(&self, txid: Txid, vout: u32) -> Result<Option<TxOut>, NodeSourceError>;

    async fn get_blockchain_info(&self) -> Result<BlockchainInfo, NodeSourceError>;
}

/// What the engine needs from Electrum: resolving a UTXO to its spending
/// transaction.
#[async_trait]
pub trait SpendLookup: Send + Sync {
    async fn find_spending_tx(
        &self,
        txid: Txid,
        vout: u32,
    ) -> Result<Option<Txid>, NodeSourceError>;
}

/// Adapts the synchronous `rpc-client::Client` to [`NodeSource`], running
/// each blocking call on the blocking thread pool per this system's
/// concurrency design (§5: the node RPC client is synchronous HTTP, wrapped
/// in `spawn_blocking` when called from async engine code).
pub struct RpcNodeSource {
    client: std::sync::Arc<rpc_client::Client>,
}

impl RpcNodeSource {
    pub fn new(client: rpc_client::Client) -> Self {
        Self { client: std::sync::Arc::new(client) }
    }
}

#[async_trait]
impl NodeSource for RpcNodeSource {
    async fn get_raw_transaction_verbose(
        &self,
        txid: Txid,
    ) -> Result<Option<DecodedTransaction>, NodeSourceError> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.get_raw_transaction_verbose(txid))
            .await
            .map_err(|e| NodeSourceError(format!("blocking task panicked: {e}")))?
            .map_err(|e| NodeSourceError(e.to_string()))
    }

    async fn get_tx_out(&self, txid: Txid, vout: u32) -> Result<Option<TxOut>, NodeSourceError> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.get_tx_out(txid, vout))
            .await
            .map_err(|e| NodeSourceError(format!("blocking task panicked: {e}")))?
            .map_err(|e| NodeSourceError(e.to_string()))
    }

    async fn get_blockchain_info(&self) -> Result<BlockchainInfo, NodeSourceError> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.get_blockchain_info())
            .await
            .map_err(|e| NodeSourceError(format!("blocking task panicked: {e}")))?
            .map_err(|e| NodeSourceError(e.to_string()))
    }
}

#[async_trait]
impl SpendLookup for electrum::Client {
    async fn find_spending_tx(
        &self,
        txid: Txid,
        vout: u32,
    ) -> Result<Option<Txid>, NodeSourceError> {
        electrum::Client::find_spending_tx(self, txid, vout)
            .await
            .map_err(|e| NodeSourceError(e.to_string()))
    }
}
