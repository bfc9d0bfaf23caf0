// SPDX-License-Identifier: CC0-1.0

//! Data model for a KYC-withdrawal privacy trace: a forward trace seeded at
//! one followed output, annotated with change-output and CoinJoin signals,
//! synthesised into ranked probable destinations and an overall score.

use bitcoin::Txid;

/// Depth presets exposed to callers; all are clamped into `[1, 15]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthPreset {
    Quick,
    Standard,
    Deep,
    Thorough,
}

impl DepthPreset {
    pub fn depth(self) -> u32 {
        match self {
            Self::Quick => 3,
            Self::Standard => 6,
            Self::Deep => 10,
            Self::Thorough => 15,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quick" => Some(Self::Quick),
            "standard" => Some(Self::Standard),
            "deep" => Some(Self::Deep),
            "thorough" => Some(Self::Thorough),
            _ => None,
        }
    }
}

/// Why a traced path stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailStatus {
    /// UTXO is unspent: the trail ends at a current holding.
    DeadEnd,
    /// Passed through a second CoinJoin: attribution is no longer meaningful.
    Cold,
    /// Exceeded `max_depth` before resolving.
    DepthLimit,
    /// Spent, but the spending transaction could not be identified
    /// (Electrum unavailable, or the lookup found no match).
    Lost,
    /// Still queued when the trace-wide transaction budget ran out; neither
    /// resolved nor abandoned.
    Active,
}

/// Confidence band derived from `confidence_score`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Negligible,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else if score >= 0.2 {
            Self::Low
        } else {
            Self::Negligible
        }
    }
}

/// One hop on the unique path from the seed to a probable destination.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KycPathNode {
    pub txid: Txid,
    pub vout: u32,
    pub value_sats: u64,
    pub address: Option<String>,
    pub block_height: Option<u64>,
    pub block_time: Option<u64>,
    pub is_coinjoin: bool,
    pub coinjoin_score: f64,
    /// Running count of CoinJoin hops on the path up to and including this node.
    pub coinjoin_count_in_path: u32,
    pub depth: u32,
    pub is_change: bool,
    pub change_probability: f64,
}

/// A ranked, terminal point on the seeded trail.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProbableDestination {
    pub address: String,
    pub value_sats: u64,
    pub confidence_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub path_length: u32,
    pub coinjoins_passed: u32,
    pub trail_status: TrailStatus,
    pub reasoning: Vec<String>,
    pub path: Vec<KycPathNode>,
}

/// The full result of a `trace_kyc_withdrawal` call.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KycResult {
    pub exchange_txid: Txid,
    pub destination_address: String,
    pub original_value_sats: u64,
    pub trace_depth: u32,
    pub destinations: Vec<ProbableDestination>,
    pub total_traced_sats: u64,
    pub total_untraceable_sats: u64,
    pub coinjoins_encountered: u32,
    pub overall_privacy_score: f64,
    pub privacy_rating: String,
    pub summary: String,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub execution_time_ms: u64,
    pub electrs_enabled: bool,
}

impl KycResult {
    pub(crate) fn empty(exchange_txid: Txid, destination_address: String, trace_depth: u32) -> Self {
        Self {
            exchange_txid,
            destination_address,
            original_value_sats: 0,
            trace_depth,
            destinations: Vec::new(),
            total_traced_sats: 0,
            total_untraceable_sats: 0,
            coinjoins_encountered: 0,
            overall_privacy_score: 0.0,
            privacy_rating: "unknown".to_string(),
            summary: String::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            execution_time_ms: 0,
            electrs_enabled: false,
        }
    }
}
