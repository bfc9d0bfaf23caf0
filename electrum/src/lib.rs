// SPDX-License-Identifier: CC0-1.0

//! Newline-delimited JSON-RPC 2.0 client for Electrum/Fulcrum/Electrs
//! servers.
//!
//! This is the lookup the base node RPC cannot offer without full
//! transaction indexing: "who spent this output?". One TCP connection is
//! held per client, lazily established, with calls serialised through a
//! mutex so `request_id` assignment and the read/write halves never
//! interleave between concurrent callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bitcoin::hashes::{sha256, Hash};
use bitcoin::{Address, NetworkChecked, Script, Txid};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use types::model::DecodedTransaction;
use types::raw::GetRawTransactionVerbose;

/// Read-buffer cap for one line: large scripthash histories can be sizeable.
const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Retry attempts per logical call.
const MAX_ATTEMPTS: u32 = 3;

/// Per-request read deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for the whole `find_spending_tx` lookup.
const FIND_SPENDING_TX_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    Protocol(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server returned an error (code {code}): {message}")]
    Server { code: i64, message: String },
    #[error("not connected")]
    Disconnected,
}

/// Derives the Electrum scripthash (reversed SHA-256 of the scriptPubKey,
/// hex-encoded) for a scriptPubKey.
pub fn scripthash_for_script(script: &Script) -> String {
    let digest = sha256::Hash::hash(script.as_bytes());
    let mut bytes = digest.to_byte_array();
    bytes.reverse();
    hex::encode(bytes)
}

/// Convenience wrapper deriving the scripthash of an address's scriptPubKey.
pub fn scripthash_for_address(address: &Address<NetworkChecked>) -> String {
    scripthash_for_script(&address.script_pubkey())
}

struct Connection {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

/// A client for a single Electrum-protocol endpoint.
pub struct Client {
    host: String,
    port: u16,
    conn: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "utxotrace_electrum::Client({}:{})", self.host, self.port)
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
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, conn: Mutex::new(None), next_id: AtomicU64::new(0) }
    }

    /// Forcibly tears down the current connection, if any. The next call
    /// reconnects from scratch.
    pub async fn disconnect(&self) {
        *self.conn.lock().await = None;
    }

    async fn ensure_connected<'a>(
        &self,
        guard: &mut tokio::sync::MutexGuard<'a, Option<Connection>>,
    ) -> Result<()> {
        if guard.is_some() {
            return Ok(());
        }
        let addr = format!("{}:{}", self.host, self.port);
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Timeout)??;
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        **guard = Some(Connection { reader: BufReader::new(read_half), writer: write_half });
        Ok(())
    }

    /// Calls an Electrum RPC `method` with positional `params`, retrying up
    /// to [`MAX_ATTEMPTS`] times with `1s * attempt_number` backoff between
    /// attempts. Each attempt is bounded by [`REQUEST_TIMEOUT`].
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let mut last_err = Error::Disconnected;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_call(method, &params).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(method, attempt, error = %err, "electrum call failed");
                    self.disconnect().await;
                    last_err = err;
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn try_call<T: DeserializeOwned>(&self, method: &str, params: &[Value]) -> Result<T> {
        let fut = self.try_call_inner(method, params);
        match timeout(REQUEST_TIMEOUT, fut).await {
            Ok(result) => result,
            Err(_) => {
                self.disconnect().await;
                Err(Error::Timeout)
            }
        }
    }

    async fn try_call_inner<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[Value],
    ) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');

        let mut guard = self.conn.lock().await;
        self.ensure_connected(&mut guard).await?;
        let conn = guard.as_mut().expect("just connected");

        conn.writer.write_all(&line).await?;
        conn.writer.flush().await?;

        let mut buf = String::new();
        let mut limited = (&mut conn.reader).take(MAX_LINE_BYTES as u64);
        let read = limited.read_line(&mut buf).await?;
        if read == 0 {
            return Err(Error::Protocol("connection closed by peer".to_string()));
        }

        let parsed: RpcResponse<T> = serde_json::from_str(buf.trim_end())?;
        if let Some(err) = parsed.error {
            return Err(Error::Server { code: err.code, message: err.message });
        }
        parsed.result.ok_or_else(|| Error::Protocol("empty result".to_string()))
    }

    /// `server.version`.
    pub async fn server_version(&self, client_name: &str, protocol_version: &str) -> Result<Value> {
        self.call("server.version", vec![client_name.into(), protocol_version.into()]).await
    }

    /// `server.banner`.
    pub async fn server_banner(&self) -> Result<String> {
        self.call("server.banner", vec![]).await
    }

    /// `server.ping`.
    pub async fn server_ping(&self) -> Result<()> {
        let _: Value = self.call("server.ping", vec![]).await?;
        Ok(())
    }

    /// `blockchain.scripthash.get_balance`.
    pub async fn scripthash_get_balance(&self, scripthash: &str) -> Result<Balance> {
        self.call("blockchain.scripthash.get_balance", vec![scripthash.into()]).await
    }

    /// `blockchain.scripthash.get_history`.
    pub async fn scripthash_get_history(&self, scripthash: &str) -> Result<Vec<HistoryEntry>> {
        self.call("blockchain.scripthash.get_history", vec![scripthash.into()]).await
    }

    /// `blockchain.scripthash.listunspent`.
    pub async fn scripthash_listunspent(&self, scripthash: &str) -> Result<Vec<UnspentEntry>> {
        self.call("blockchain.scripthash.listunspent", vec![scripthash.into()]).await
    }

    /// `blockchain.transaction.get(txid, verbose=true)`. A non-object
    /// response (verbose mode not honoured by the server) is translated
    /// into `Protocol`, matching the base node RPC's "not found" contract
    /// for the same failure mode.
    pub async fn transaction_get_verbose(&self, txid: Txid) -> Result<DecodedTransaction> {
        let value: Value =
            self.call("blockchain.transaction.get", vec![txid.to_string().into(), true.into()])
                .await?;
        if !value.is_object() {
            return Err(Error::Protocol(
                "blockchain.transaction.get did not honour verbose=true".to_string(),
            ));
        }
        let raw: GetRawTransactionVerbose = serde_json::from_value(value)?;
        raw.into_model().map_err(|e| Error::Protocol(e.to_string()))
    }

    /// `blockchain.headers.subscribe`. Only the tip height is read; later
    /// push notifications on the same connection are never consumed by this
    /// client and are simply never read off the socket.
    pub async fn tip_height(&self) -> Result<u64> {
        #[derive(serde::Deserialize)]
        struct HeadersTip {
            height: u64,
        }
        let tip: HeadersTip = self.call("blockchain.headers.subscribe", vec![]).await?;
        Ok(tip.height)
    }

    /// Finds the transaction that spent `(txid, vout)`, if any, per the
    /// documented algorithm: fetch the source tx, read its address on
    /// `vout`, pull that address's scripthash history, and scan each other
    /// history entry's inputs for a reference back to `(txid, vout)`.
    ///
    /// Bounded by [`FIND_SPENDING_TX_TIMEOUT`] end to end; on expiry the
    /// connection is torn down (the read framing may have desynchronised)
    /// and the lookup counts as a failure.
    pub async fn find_spending_tx(&self, txid: Txid, vout: u32) -> Result<Option<Txid>> {
        match timeout(FIND_SPENDING_TX_TIMEOUT, self.find_spending_tx_inner(txid, vout)).await {
            Ok(result) => result,
            Err(_) => {
                self.disconnect().await;
                Err(Error::Timeout)
            }
        }
    }

    async fn find_spending_tx_inner(&self, txid: Txid, vout: u32) -> Result<Option<Txid>> {
        let source = self.transaction_get_verbose(txid).await?;
        let output = source
            .vout
            .iter()
            .find(|o| o.n == vout)
            .ok_or_else(|| Error::Protocol(format!("vout {vout} not present on {txid}")))?;
        if output.script_pubkey.address.is_none() {
            // Non-standard script: no address, so no scripthash history to scan.
            return Ok(None);
        }
        let scripthash = scripthash_for_script(&output.script_pubkey.script);
        let history = self.scripthash_get_history(&scripthash).await?;

        for entry in history {
            if entry.tx_hash == txid {
                continue;
            }
            let candidate = self.transaction_get_verbose(entry.tx_hash).await?;
            for vin in &candidate.vin {
                if let types::model::Vin::PrevOut { txid: prev_txid, vout: prev_vout } = vin {
                    if *prev_txid == txid && *prev_vout == vout {
                        return Ok(Some(entry.tx_hash));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// `blockchain.scripthash.get_balance` result.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct Balance {
    pub confirmed: i64,
    pub unconfirmed: i64,
}

/// One `blockchain.scripthash.get_history` entry.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub struct HistoryEntry {
    pub height: i64,
    pub tx_hash: Txid,
}

/// One `blockchain.scripthash.listunspent` entry.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub struct UnspentEntry {
    pub height: i64,
    pub tx_hash: Txid,
    pub tx_pos: u32,
    pub value: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn echo_server(
        response: &'static str,
    ) -> (String, u16, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.write_all(b"\n").await;
        });
        (addr.ip().to_string(), addr.port(), handle)
    }

    #[tokio::test]
    async fn server_ping_round_trips_over_loopback() {
        let (host, port, handle) =
            echo_server(r#"{"jsonrpc":"2.0","id":0,"result":null,"error":null}"#).await;
        let client = Client::new(host, port);
        client.server_ping().await.expect("ping succeeds against fixture");
        handle.await.expect("server task");
    }

    #[tokio::test]
    async fn server_error_surfaces_as_error() {
        let (host, port, handle) = echo_server(
            r#"{"jsonrpc":"2.0","id":0,"result":null,"error":{"code":1,"message":"boom"}}"#,
        )
        .await;
        let client = Client::new(host, port);
        let err = client.server_ping().await.unwrap_err();
        assert!(matches!(err, Error::Server { code: 1, .. }));
        handle.await.expect("server task");
    }

    #[test]
    fn scripthash_is_reversed_sha256_of_script() {
        let address: Address<NetworkChecked> =
            "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".parse::<Address<_>>().unwrap().assume_checked();
        let script = address.script_pubkey();
        let mut expected = sha256::Hash::hash(script.as_bytes()).to_byte_array();
        expected.reverse();
        assert_eq!(scripthash_for_address(&address), hex::encode(expected));
    }
}
