//! The output side of the domain model: per-analyzer [`RiskFactor`]s rolled
//! up into an immutable [`FraudAnalysis`] audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Method {
    Velocity,
    Amount,
    Geographic,
    Recipient,
    Time,
    Device,
    MlModel,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Velocity => "VELOCITY",
            Method::Amount => "AMOUNT",
            Method::Geographic => "GEOGRAPHIC",
            Method::Recipient => "RECIPIENT",
            Method::Time => "TIME",
            Method::Device => "DEVICE",
            Method::MlModel => "ML_MODEL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Suspicious,
    Reject,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Suspicious => "SUSPICIOUS",
            Decision::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
    Timeout,
}

/// A single analyzer's contribution. `contributed_score` is always
/// `raw_score * weight` except for the blocklist hard-reject path, which
/// sets both to 1.0 directly (§4.5, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactor {
    pub method: Method,
    pub raw_score: f64,
    pub weight: f64,
    pub contributed_score: f64,
    pub human_reason: String,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl RiskFactor {
    pub fn new(method: Method, raw_score: f64, weight: f64, human_reason: impl Into<String>) -> Self {
        let raw_score = raw_score.max(0.0);
        let weight = weight.max(0.0);
        Self {
            method,
            raw_score,
            weight,
            contributed_score: raw_score * weight,
            human_reason: human_reason.into(),
            details: HashMap::new(),
        }
    }

    /// Blocklist / hard-reject factors override the normal weight*raw_score
    /// product per §4.5/§4.6.
    pub fn hard_reject(method: Method, human_reason: impl Into<String>) -> Self {
        Self {
            method,
            raw_score: 1.0,
            weight: 1.0,
            contributed_score: 1.0,
            human_reason: human_reason.into(),
            details: HashMap::new(),
        }
    }

    /// The neutral zero-score factor produced when an analyzer fails,
    /// times out, or is cancelled by the hard deadline (§4.1, §5).
    pub fn unavailable(method: Method) -> Self {
        Self::new(method, 0.0, 0.0, "Analysis unavailable")
    }

    pub fn with_detail(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.to_string(), v);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAnalysis {
    pub analysis_id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: String,
    pub final_score: f64,
    pub decision: Decision,
    pub confidence: Confidence,
    pub status: AnalysisStatus,
    pub factors: Vec<RiskFactor>,
    pub model_version: String,
    pub analysis_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub requires_manual_review: bool,
    pub component_scores: HashMap<String, f64>,
    pub correlation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contributed_score_is_raw_times_weight() {
        let f = RiskFactor::new(Method::Amount, 0.5, 0.25, "test");
        assert!((f.contributed_score - 0.125).abs() < 1e-9);
    }

    #[test]
    fn hard_reject_forces_one() {
        let f = RiskFactor::hard_reject(Method::Recipient, "blocklist hit");
        assert_eq!(f.raw_score, 1.0);
        assert_eq!(f.contributed_score, 1.0);
    }
}
