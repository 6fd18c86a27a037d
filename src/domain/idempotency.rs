//! Idempotency marker (§3, §4.1 step 1 and 8).

use crate::domain::analysis::Decision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyMarker {
    pub decision: Decision,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}
