// SPDX-License-Identifier: CC0-1.0

//! Explicit dependency injection: every adapter handler reaches its
//! collaborators through [`AppState`], never through ambient globals.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use kyc::KycAnalyser;
use labels::Store;
use tokio::sync::{broadcast, Mutex};
use trace_engine::{Engine, NodeSource, SpendLookup};

use crate::config::Config;

/// `/health` is cached for 10s; repeated polling should not hammer the
/// node RPC or Electrum.
#[derive(Debug)]
pub struct HealthCache {
    pub checked_at_unix: AtomicI64,
    pub body: Mutex<Option<serde_json::Value>>,
}

impl Default for HealthCache {
    fn default() -> Self {
        Self { checked_at_unix: AtomicI64::new(0), body: Mutex::new(None) }
    }
}

impl HealthCache {
    pub fn is_fresh(&self, now_unix: i64) -> bool {
        now_unix - self.checked_at_unix.load(Ordering::Relaxed) < 10
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rpc: Arc<rpc_client::Client>,
    pub node: Arc<dyn NodeSource>,
    pub electrum: Option<Arc<electrum::Client>>,
    pub electrum_lookup: Option<Arc<dyn SpendLookup>>,
    pub engine: Arc<Engine>,
    pub kyc: Arc<KycAnalyser>,
    pub store: Store,
    pub ws_tx: broadcast::Sender<String>,
    pub health_cache: Arc<HealthCache>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("config", &self.config).finish_non_exhaustive()
    }
}
