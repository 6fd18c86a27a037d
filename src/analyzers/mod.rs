//! The six rule-based risk analyzers (§4.2-4.7). Each implements
//! [`Analyzer`] and never returns an error: any internal failure is
//! caught and turned into [`RiskFactor::unavailable`] so one analyzer's
//! trouble never aborts the pipeline (§4.1 step 3).

pub mod amount;
pub mod device;
pub mod geographic;
pub mod recipient;
pub mod time;
pub mod velocity;

use crate::cache::{CacheStore, DeviceCacheEntry, RecipientCacheEntry};
use crate::domain::{TransactionEvent, UserHistory, VelocityCounters, Window};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Everything an analyzer needs to compute its `RiskFactor`, assembled by
/// the orchestrator's context-load step (§4.1 step 2) before the analyzers
/// fan out. Shared read-only across all six analyzers; none of them write
/// back through it.
pub struct AnalysisContext {
    pub event: TransactionEvent,
    pub now: DateTime<Utc>,
    pub history: UserHistory,
    pub velocity: HashMap<Window, VelocityCounters>,
    pub unique_recipients_5m: u64,
    pub current_country: Option<String>,
    pub device_cache: Option<DeviceCacheEntry>,
    pub recipient_cache: Option<RecipientCacheEntry>,
    pub known_devices: HashSet<String>,
    pub known_countries: HashSet<String>,
    pub trusted_recipients: HashSet<String>,
    pub cache: Arc<dyn CacheStore>,
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// The method this analyzer reports under; used to build a neutral
    /// `unavailable` factor when the deadline cancels it mid-flight.
    fn method(&self) -> crate::domain::Method;

    async fn analyze(&self, ctx: &AnalysisContext) -> crate::domain::RiskFactor;
}
