//! Typed error kinds for the fraud engine.
//!
//! Each variant carries a stable [`FraudError::code`] used for structured
//! logging and metrics labels. Only [`FraudError::Validation`] is meant to
//! propagate out of the orchestrator to the ingress consumer loop (§7);
//! every other variant is translated into a degraded [`crate::domain::RiskFactor`]
//! or a logged-and-continued side effect.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FraudError {
    #[error("malformed or incomplete transaction event: {0}")]
    Validation(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("analyzer {method} failed: {reason}")]
    AnalyzerFailure { method: String, reason: String },

    #[error("ML inference timed out or errored: {0}")]
    MlTimeout(String),

    #[error("publish failed: {0}")]
    PublishFailure(String),

    #[error("processing deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    #[error("model hash mismatch: expected {expected}, got {actual}")]
    BlocklistHashMismatch { expected: String, actual: String },
}

impl FraudError {
    /// Stable machine-readable code, independent of the display message.
    pub fn code(&self) -> &'static str {
        match self {
            FraudError::Validation(_) => "validation",
            FraudError::CacheUnavailable(_) => "cache_unavailable",
            FraudError::DatabaseUnavailable(_) => "database_unavailable",
            FraudError::AnalyzerFailure { .. } => "analyzer_failure",
            FraudError::MlTimeout(_) => "ml_timeout",
            FraudError::PublishFailure(_) => "publish_failure",
            FraudError::DeadlineExceeded { .. } => "deadline_exceeded",
            FraudError::BlocklistHashMismatch { .. } => "blocklist_hash_mismatch",
        }
    }

    /// Whether the ingress consumer should retry (redeliver) the event that
    /// produced this error. Only validation failures are poison-pilled.
    pub fn is_poison_pill(&self) -> bool {
        matches!(self, FraudError::Validation(_))
    }
}

pub type FraudResult<T> = Result<T, FraudError>;
