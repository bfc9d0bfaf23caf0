// SPDX-License-Identifier: CC0-1.0

//! JSON wire types, one per RPC method, exactly as Bitcoin Core serialises them.
//!
//! These are deliberately dumb structs: every field is whatever JSON gives
//! us (`String`, `f64`, `i64`). Conversion into richer `rust-bitcoin` types
//! happens in `into_model()`, defined alongside the [`crate::model`] types,
//! so a malformed response fails at the conversion boundary with a named
//! error instead of silently misparsing.

use serde::{Deserialize, Serialize};

/// Wire shape of the `scriptPubKey` object embedded in several RPC results.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "serde-deny-unknown-fields", serde(deny_unknown_fields))]
pub struct ScriptPubkey {
    pub asm: String,
    #[serde(rename = "desc")]
    pub descriptor: Option<String>,
    pub hex: String,
    #[serde(rename = "reqSigs")]
    pub required_signatures: Option<i64>,
    #[serde(rename = "type")]
    pub type_: String,
    pub address: Option<String>,
    pub addresses: Option<Vec<String>>,
}

/// Result of JSON-RPC method `getblockchaininfo`, trimmed to the fields the
/// tracer actually reads.
///
/// > getblockchaininfo
/// >
/// > Returns an object containing various state info regarding blockchain processing.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "serde-deny-unknown-fields", serde(deny_unknown_fields))]
pub struct GetBlockchainInfo {
    pub chain: String,
    pub blocks: i64,
    pub headers: i64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: String,
    #[serde(rename = "initialblockdownload")]
    pub initial_block_download: bool,
}

/// One transaction input as returned inside `getrawtransaction`'s verbose result.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "serde-deny-unknown-fields", serde(deny_unknown_fields))]
pub struct Vin {
    pub txid: Option<String>,
    pub vout: Option<u32>,
    pub coinbase: Option<String>,
    pub sequence: u32,
}

impl Vin {
    /// `true` for the single input of a coinbase transaction.
    pub fn is_coinbase(&self) -> bool { self.coinbase.is_some() }
}

/// One transaction output as returned inside `getrawtransaction`'s verbose result.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "serde-deny-unknown-fields", serde(deny_unknown_fields))]
pub struct Vout {
    /// Value in BTC (Core's native unit for this field; converted to sats on `into_model`).
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: ScriptPubkey,
}

/// Result of JSON-RPC method `getrawtransaction` with `verbose=true`.
///
/// > getrawtransaction "txid" ( verbose "blockhash" )
/// >
/// > Return the raw transaction data, augmented with information about its
/// > confirmation status and position in the chain.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "serde-deny-unknown-fields", serde(deny_unknown_fields))]
pub struct GetRawTransactionVerbose {
    pub txid: String,
    pub hex: String,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    pub blockhash: Option<String>,
    pub confirmations: Option<u64>,
    pub time: Option<u64>,
    pub blocktime: Option<u64>,
}

/// Result of JSON-RPC method `gettxout`.
///
/// > gettxout "txid" n ( include_mempool )
/// >
/// > Returns details about an unspent transaction output.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "serde-deny-unknown-fields", serde(deny_unknown_fields))]
pub struct GetTxOut {
    #[serde(rename = "bestblock")]
    pub best_block: String,
    pub confirmations: u32,
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: ScriptPubkey,
    pub coinbase: bool,
}

/// Result of JSON-RPC method `validateaddress`.
///
/// > validateaddress "address"
/// >
/// > Return information about the given bitcoin address.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[cfg_attr(feature = "serde-deny-unknown-fields", serde(deny_unknown_fields))]
pub struct ValidateAddress {
    #[serde(rename = "isvalid")]
    pub is_valid: bool,
    pub address: Option<String>,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vout_uses_core_field_names() {
        let json = r#"{"value":0.0005,"n":1,"scriptPubKey":{"asm":"","desc":null,"hex":"0014aa","reqSigs":null,"type":"witness_v0_keyhash","address":"bc1qxyz","addresses":null}}"#;
        let vout: Vout = serde_json::from_str(json).expect("deserialize vout fixture");
        assert_eq!(vout.n, 1);
        assert_eq!(vout.script_pubkey.type_, "witness_v0_keyhash");
        assert_eq!(vout.script_pubkey.address.as_deref(), Some("bc1qxyz"));
    }

    #[test]
    fn vin_coinbase_has_no_prevout() {
        let json = r#"{"txid":null,"vout":null,"coinbase":"03abc123","sequence":4294967295}"#;
        let vin: Vin = serde_json::from_str(json).expect("deserialize vin fixture");
        assert!(vin.is_coinbase());
    }

    #[test]
    fn vin_prevout_is_not_coinbase() {
        let txid_hex = "ab".repeat(32);
        let json = format!(r#"{{"txid":"{txid_hex}","vout":0,"coinbase":null,"sequence":0}}"#);
        let vin: Vin = serde_json::from_str(&json).expect("deserialize vin fixture");
        assert!(!vin.is_coinbase());
    }

    #[test]
    fn validateaddress_maps_core_field_names() {
        let json = r#"{"isvalid":true,"address":"bc1qxyz","scriptPubKey":"0014aa"}"#;
        let v: ValidateAddress = serde_json::from_str(json).expect("deserialize fixture");
        assert!(v.is_valid);
        assert_eq!(v.address.as_deref(), Some("bc1qxyz"));
    }
}
