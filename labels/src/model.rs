// SPDX-License-Identifier: CC0-1.0

//! Rows of the two tables that are part of the core contract: user-supplied
//! address labels, and background analysis jobs.

use chrono::{DateTime, Utc};

/// A user-supplied `address -> label` mapping.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AddressLabel {
    pub address: String,
    pub label: String,
    pub category: LabelCategory,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How the labelled address is understood by the end user. Never inferred
/// by the traversal core; set and changed only through the label API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelCategory {
    Exchange,
    Personal,
    Merchant,
    Mixer,
    Other,
}

impl LabelCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exchange => "exchange",
            Self::Personal => "personal",
            Self::Merchant => "merchant",
            Self::Mixer => "mixer",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exchange" => Some(Self::Exchange),
            "personal" => Some(Self::Personal),
            "merchant" => Some(Self::Merchant),
            "mixer" => Some(Self::Mixer),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Lifecycle state of a background analysis job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A queued or completed background analysis job (e.g. a long-running
/// trace, run outside the request/response cycle).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisJob {
    pub id: uuid::Uuid,
    pub job_type: String,
    pub params: serde_json::Value,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
