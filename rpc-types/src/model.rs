// SPDX-License-Identifier: CC0-1.0

//! Strongly typed, wire-version-agnostic models, derived from [`crate::raw`]
//! via `into_model()`.

use core::fmt;

use bitcoin::address::{self, Address, NetworkUnchecked};
use bitcoin::hex::{self, FromHex as _};
use bitcoin::{Amount, BlockHash, ScriptBuf, Txid};

use crate::raw;

/// Script type as classified by Bitcoin Core's `scriptPubKey.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    MultiSig,
    NullData,
    NonStandard,
    Other,
}

impl ScriptType {
    pub fn from_core_str(s: &str) -> Self {
        match s {
            "pubkeyhash" => Self::P2pkh,
            "scripthash" => Self::P2sh,
            "witness_v0_keyhash" => Self::P2wpkh,
            "witness_v0_scripthash" => Self::P2wsh,
            "witness_v1_taproot" => Self::P2tr,
            "multisig" => Self::MultiSig,
            "nulldata" => Self::NullData,
            "nonstandard" => Self::NonStandard,
            _ => Self::Other,
        }
    }
}

/// A `scriptPubKey`, resolved to concrete `rust-bitcoin` types where possible.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptPubkey {
    pub script: ScriptBuf,
    pub type_: ScriptType,
    /// `None` for non-standard / unparseable scripts.
    pub address: Option<Address<NetworkUnchecked>>,
}

#[derive(Debug)]
pub enum ScriptPubkeyError {
    Hex(hex::HexToBytesError),
    Address(address::ParseError),
}

impl fmt::Display for ScriptPubkeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Hex(e) => write!(f, "invalid scriptPubKey hex: {e}"),
            Self::Address(e) => write!(f, "invalid address in scriptPubKey: {e}"),
        }
    }
}
impl std::error::Error for ScriptPubkeyError {}

impl raw::ScriptPubkey {
    pub fn into_model(self) -> Result<ScriptPubkey, ScriptPubkeyError> {
        let script = ScriptBuf::from_hex(&self.hex).map_err(ScriptPubkeyError::Hex)?;
        let address = self
            .address
            .as_deref()
            .map(|a| a.parse::<Address<_>>())
            .transpose()
            .map_err(ScriptPubkeyError::Address)?;
        Ok(ScriptPubkey { script, type_: ScriptType::from_core_str(&self.type_), address })
    }
}

/// One transaction input, as consumed by the traversal engine.
#[derive(Clone, Debug, PartialEq)]
pub enum Vin {
    Coinbase,
    PrevOut { txid: Txid, vout: u32 },
}

#[derive(Debug)]
pub enum VinError {
    MissingPrevout,
    Txid(bitcoin::hashes::hex::HexToArrayError),
}

impl fmt::Display for VinError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MissingPrevout => write!(f, "non-coinbase input missing txid/vout"),
            Self::Txid(e) => write!(f, "invalid input txid: {e}"),
        }
    }
}
impl std::error::Error for VinError {}

impl raw::Vin {
    pub fn into_model(self) -> Result<Vin, VinError> {
        if self.is_coinbase() {
            return Ok(Vin::Coinbase);
        }
        let txid_str = self.txid.ok_or(VinError::MissingPrevout)?;
        let vout = self.vout.ok_or(VinError::MissingPrevout)?;
        let txid: Txid = txid_str.parse().map_err(VinError::Txid)?;
        Ok(Vin::PrevOut { txid, vout })
    }
}

/// One transaction output, as consumed by the traversal engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Vout {
    pub n: u32,
    pub value_sats: u64,
    pub script_pubkey: ScriptPubkey,
}

impl raw::Vout {
    pub fn into_model(self) -> Result<Vout, ScriptPubkeyError> {
        let value_sats = Amount::from_btc(self.value)
            .map(|a| a.to_sat())
            .unwrap_or_else(|_| (self.value * 100_000_000.0).round() as u64);
        Ok(Vout { n: self.n, value_sats, script_pubkey: self.script_pubkey.into_model()? })
    }
}

/// A fully decoded transaction plus confirmation metadata, the shape the
/// traversal engine and cache operate on.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedTransaction {
    pub txid: Txid,
    pub vin: Vec<Vin>,
    pub vout: Vec<Vout>,
    pub block_hash: Option<BlockHash>,
    pub block_time: Option<u64>,
    pub confirmations: Option<u64>,
}

impl DecodedTransaction {
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && matches!(self.vin[0], Vin::Coinbase)
    }
}

#[derive(Debug)]
pub enum DecodedTransactionError {
    Txid(bitcoin::hashes::hex::HexToArrayError),
    BlockHash(bitcoin::hashes::hex::HexToArrayError),
    Vin(VinError),
    Vout(ScriptPubkeyError),
}

impl fmt::Display for DecodedTransactionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Txid(e) => write!(f, "invalid txid: {e}"),
            Self::BlockHash(e) => write!(f, "invalid block hash: {e}"),
            Self::Vin(e) => write!(f, "invalid vin: {e}"),
            Self::Vout(e) => write!(f, "invalid vout: {e}"),
        }
    }
}
impl std::error::Error for DecodedTransactionError {}

impl raw::GetRawTransactionVerbose {
    pub fn into_model(self) -> Result<DecodedTransaction, DecodedTransactionError> {
        use DecodedTransactionError as E;

        let txid: Txid = self.txid.parse().map_err(E::Txid)?;
        let block_hash = self
            .blockhash
            .as_deref()
            .map(|h| h.parse::<BlockHash>())
            .transpose()
            .map_err(E::BlockHash)?;
        let vin = self
            .vin
            .into_iter()
            .map(|v| v.into_model())
            .collect::<Result<Vec<_>, _>>()
            .map_err(E::Vin)?;
        let vout = self
            .vout
            .into_iter()
            .map(|v| v.into_model())
            .collect::<Result<Vec<_>, _>>()
            .map_err(E::Vout)?;

        Ok(DecodedTransaction {
            txid,
            vin,
            vout,
            block_hash,
            block_time: self.blocktime,
            confirmations: self.confirmations,
        })
    }
}

/// Result of `gettxout`, resolved to concrete types. `None` at the RPC layer
/// (no wrapping `Option`) means the output is spent or unknown.
#[derive(Clone, Debug, PartialEq)]
pub struct TxOut {
    pub value_sats: u64,
    pub script_pubkey: ScriptPubkey,
    pub confirmations: u32,
    pub coinbase: bool,
}

impl raw::GetTxOut {
    pub fn into_model(self) -> Result<TxOut, ScriptPubkeyError> {
        let value_sats = Amount::from_btc(self.value)
            .map(|a| a.to_sat())
            .unwrap_or_else(|_| (self.value * 100_000_000.0).round() as u64);
        Ok(TxOut {
            value_sats,
            script_pubkey: self.script_pubkey.into_model()?,
            confirmations: self.confirmations,
            coinbase: self.coinbase,
        })
    }
}

/// Result of `getblockchaininfo`, trimmed to the fields the tracer reads.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: u64,
    pub headers: u64,
    pub best_block_hash: BlockHash,
    pub initial_block_download: bool,
}

impl raw::GetBlockchainInfo {
    pub fn into_model(self) -> Result<BlockchainInfo, bitcoin::hashes::hex::HexToArrayError> {
        Ok(BlockchainInfo {
            chain: self.chain,
            blocks: self.blocks.max(0) as u64,
            headers: self.headers.max(0) as u64,
            best_block_hash: self.best_block_hash.parse()?,
            initial_block_download: self.initial_block_download,
        })
    }
}

/// Result of `validateaddress`.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidateAddress {
    pub is_valid: bool,
    pub address: Option<Address<NetworkUnchecked>>,
}

impl raw::ValidateAddress {
    pub fn into_model(self) -> Result<ValidateAddress, address::ParseError> {
        let address = self.address.map(|a| a.parse::<Address<_>>()).transpose()?;
        Ok(ValidateAddress { is_valid: self.is_valid, address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_pubkey_fixture(type_: &str, address: Option<&str>) -> raw::ScriptPubkey {
        raw::ScriptPubkey {
            asm: String::new(),
            descriptor: None,
            hex: "0014aa".to_string(),
            required_signatures: None,
            type_: type_.to_string(),
            address: address.map(str::to_string),
            addresses: None,
        }
    }

    #[test]
    fn script_type_classifies_known_core_strings() {
        assert_eq!(ScriptType::from_core_str("witness_v1_taproot"), ScriptType::P2tr);
        assert_eq!(ScriptType::from_core_str("pubkeyhash"), ScriptType::P2pkh);
        assert_eq!(ScriptType::from_core_str("anything_else"), ScriptType::Other);
    }

    #[test]
    fn script_pubkey_into_model_rejects_bad_hex() {
        let raw = script_pubkey_fixture("nonstandard", None);
        let mut raw = raw;
        raw.hex = "not-hex".to_string();
        assert!(raw.into_model().is_err());
    }

    #[test]
    fn vin_into_model_coinbase() {
        let vin = raw::Vin { txid: None, vout: None, coinbase: Some("03abc".to_string()), sequence: 0 };
        assert_eq!(vin.into_model().expect("coinbase vin"), Vin::Coinbase);
    }

    #[test]
    fn vin_into_model_missing_prevout_is_error() {
        let vin = raw::Vin { txid: None, vout: None, coinbase: None, sequence: 0 };
        assert!(vin.into_model().is_err());
    }

    #[test]
    fn vout_into_model_converts_btc_to_sats() {
        let raw = raw::Vout { value: 0.0005, n: 2, script_pubkey: script_pubkey_fixture("nulldata", None) };
        let vout = raw.into_model().expect("valid vout");
        assert_eq!(vout.value_sats, 50_000);
        assert_eq!(vout.n, 2);
    }

    #[test]
    fn blockchain_info_into_model_rejects_bad_hash() {
        let raw = raw::GetBlockchainInfo {
            chain: "main".to_string(),
            blocks: 1,
            headers: 1,
            best_block_hash: "not-a-hash".to_string(),
            initial_block_download: false,
        };
        assert!(raw.into_model().is_err());
    }

    #[test]
    fn validate_address_into_model_passthrough_when_invalid() {
        let raw = raw::ValidateAddress { is_valid: false, address: None, script_pubkey: None };
        let model = raw.into_model().expect("no address to parse");
        assert!(!model.is_valid);
        assert!(model.address.is_none());
    }
}
