// SPDX-License-Identifier: CC0-1.0

//! A thin, synchronous JSON-RPC 1.0 client for the Bitcoin Core full node.
//!
//! Only the handful of calls the provenance tracer needs are exposed:
//! `getblockchaininfo`, `getrawtransaction`, `gettxout`, `validateaddress`.
//! HTTP transport is `bitreq` with Basic authentication, the same shape the
//! upstream `corepc-client` builds around the `jsonrpc` crate, collapsed
//! here to one non-versioned client since this system only ever talks to
//! whatever Core version operators point it at.

/// Re-export the `rust-bitcoin` crate.
pub extern crate bitcoin;

/// Re-export the types crate.
pub extern crate types;

use std::fmt;

use bitcoin::Txid;
use serde::de::DeserializeOwned;
use serde_json::Value;
use types::model;
use types::raw;

/// Crate-specific `Result` type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the node.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http transport error: {0}")]
    Http(#[from] bitreq::Error),
    #[error("invalid JSON-RPC response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("node returned a JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("model conversion failed: {0}")]
    Model(String),
}

/// Authentication for the RPC endpoint.
#[derive(Clone, Debug)]
pub enum Auth {
    None,
    UserPass(String, String),
}

impl Auth {
    fn header_value(&self) -> Option<String> {
        match self {
            Auth::None => None,
            Auth::UserPass(user, pass) => {
                use base64::Engine as _;
                let raw = format!("{user}:{pass}");
                Some(format!(
                    "Basic {}",
                    base64::engine::general_purpose::STANDARD.encode(raw)
                ))
            }
        }
    }
}

/// A JSON-RPC 1.0 client for the Bitcoin Core full node.
pub struct Client {
    url: String,
    auth: Auth,
    timeout_secs: u64,
    next_id: std::sync::atomic::AtomicU64,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "utxotrace_rpc_client::Client({})", self.url)
    }
}

#[derive(serde::Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObj>,
}

#[derive(serde::Deserialize)]
struct RpcErrorObj {
    code: i64,
    message: String,
}

impl Client {
    /// Creates a client with no authentication.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), auth: Auth::None, timeout_secs: 30, next_id: Default::default() }
    }

    /// Creates a client authenticated with a username and password.
    pub fn new_with_auth(url: impl Into<String>, user: String, password: String) -> Self {
        Self {
            url: url.into(),
            auth: Auth::UserPass(user, password),
            timeout_secs: 30,
            next_id: Default::default(),
        }
    }

    /// Overrides the per-request timeout (seconds). Default is 30s.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Calls an RPC `method` with the given positional `params`.
    pub fn call<T: DeserializeOwned>(&self, method: &str, params: &[Value]) -> Result<T> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        log::debug!(target: "utxotrace_rpc", "request: {method} {body}");

        let mut req = bitreq::post(&self.url)
            .with_header("Content-Type", "application/json")
            .with_body(serde_json::to_string(&body)?)
            .with_timeout(self.timeout_secs);
        if let Some(auth) = self.auth.header_value() {
            req = req.with_header("Authorization", auth);
        }

        let resp = req.send()?;
        let parsed: RpcResponse<T> = serde_json::from_str(resp.as_str()?)?;

        if let Some(err) = parsed.error {
            return Err(Error::Rpc { code: err.code, message: err.message });
        }
        parsed.result.ok_or_else(|| Error::Rpc { code: 0, message: "empty RPC result".into() })
    }

    /// `getblockchaininfo`.
    pub fn get_blockchain_info(&self) -> Result<model::BlockchainInfo> {
        let raw: raw::GetBlockchainInfo = self.call("getblockchaininfo", &[])?;
        raw.into_model().map_err(|e| Error::Model(e.to_string()))
    }

    /// `getrawtransaction txid true`.
    ///
    /// Defensively treats a bare hex-string response (verbose mode not
    /// honoured by whatever is on the other end of the socket) as "not
    /// found", per this system's documented RPC contract.
    pub fn get_raw_transaction_verbose(
        &self,
        txid: Txid,
    ) -> Result<Option<model::DecodedTransaction>> {
        let value: Value = self.call("getrawtransaction", &[json_txid(txid), true.into()])?;
        if value.is_string() || value.is_null() {
            return Ok(None);
        }
        let raw: raw::GetRawTransactionVerbose =
            serde_json::from_value(value).map_err(Error::Json)?;
        raw.into_model().map(Some).map_err(|e| Error::Model(e.to_string()))
    }

    /// `gettxout txid vout true`. Returns `None` when the output is spent or unknown.
    pub fn get_tx_out(&self, txid: Txid, vout: u32) -> Result<Option<model::TxOut>> {
        let value: Value =
            self.call("gettxout", &[json_txid(txid), vout.into(), true.into()])?;
        if value.is_null() {
            return Ok(None);
        }
        let raw: raw::GetTxOut = serde_json::from_value(value).map_err(Error::Json)?;
        raw.into_model().map(Some).map_err(|e| Error::Model(e.to_string()))
    }

    /// `validateaddress address`.
    pub fn validate_address(&self, address: &str) -> Result<model::ValidateAddress> {
        let raw: raw::ValidateAddress = self.call("validateaddress", &[address.into()])?;
        raw.into_model().map_err(|e| Error::Model(e.to_string()))
    }
}

fn json_txid(txid: Txid) -> Value {
    Value::String(txid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn serve_once(body: &'static str) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind fixture server");
        let addr = server.server_addr().to_ip().expect("ip addr");
        thread::spawn(move || {
            let request = server.recv().expect("recv request");
            let response = tiny_http::Response::from_string(body);
            let _ = request.respond(response);
        });
        format!("http://{addr}/")
    }

    const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000000000000000";

    #[test]
    fn get_blockchain_info_parses_fixture() {
        let hash = "00000000000000000000000000000000000000000000000000000000000000";
        let url = serve_once(&format!(
            r#"{{"result":{{"chain":"main","blocks":1,"headers":1,"bestblockhash":"{hash}","initialblockdownload":false}},"error":null,"id":0}}"#,
        ));
        let client = Client::new(url);
        let info = client.get_blockchain_info().expect("parse fixture response");
        assert_eq!(info.chain, "main");
        assert_eq!(info.blocks, 1);
        assert!(!info.initial_block_download);
    }

    #[test]
    fn rpc_error_surfaces_as_error() {
        let url = serve_once(r#"{"result":null,"error":{"code":-5,"message":"not found"},"id":0}"#);
        let client = Client::new(url);
        let err = client.get_blockchain_info().unwrap_err();
        assert!(matches!(err, Error::Rpc { code: -5, .. }));
    }

    #[test]
    fn non_object_getrawtransaction_response_is_not_found() {
        let url = serve_once(r#"{"result":"deadbeef","error":null,"id":0}"#);
        let client = Client::new(url);
        let txid: Txid = ZERO_HASH[..64].parse().expect("64 zero hex chars parse as a txid");
        let result = client.get_raw_transaction_verbose(txid);
        assert!(matches!(result, Ok(None)));
    }
}
