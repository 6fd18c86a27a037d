//! Cache-through abstraction over the hot-path lookups the analyzers need
//! (§4.10). Every operation is fail-open: a cache outage degrades the
//! caller to "no data", it never propagates as a hard error, because the
//! cache is a speed optimization over the stores, not a source of truth.

pub mod keys;
pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis_store;

use crate::domain::{IdempotencyMarker, UserHistory, VelocityCounters, Window};
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// Cached projection of a device fingerprint's trust profile.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeviceCacheEntry {
    pub trust_score: f64,
    pub seen_count: u64,
}

/// Cached projection of a recipient's risk profile.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecipientCacheEntry {
    pub risk_score: f64,
    pub first_seen_days_ago: i64,
    pub is_verified: bool,
    /// Age of the recipient's own account, when known to the upstream
    /// recipient directory. `None` when the recipient has no registered
    /// account (e.g. an external/unbanked payee).
    pub account_age_days: Option<i64>,
    /// Recipient's registered country, independent of the payer's own
    /// geography (§4.5's high-risk-country rule looks at this, not
    /// `AnalysisContext::current_country`).
    pub country: Option<String>,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Increment the rolling count/amount for `user_id` in `window` and
    /// return the post-increment counters. Fails open to a zero counter.
    async fn increment_velocity(
        &self,
        user_id: &str,
        window: Window,
        amount: f64,
    ) -> VelocityCounters;

    async fn get_velocity(&self, user_id: &str, window: Window) -> VelocityCounters;

    /// Track a recipient within the 5-minute unique-recipient set used by
    /// the velocity analyzer's "rapid distinct recipients" rule (§4.2) and
    /// return the set's size after insertion.
    async fn track_unique_recipient(&self, user_id: &str, recipient_id: &str) -> u64;

    async fn get_user_history(&self, user_id: &str) -> Option<UserHistory>;
    async fn set_user_history(&self, user_id: &str, history: &UserHistory, ttl: Duration);

    async fn get_device_info(&self, device_hash: &str) -> Option<DeviceCacheEntry>;
    async fn set_device_info(&self, device_hash: &str, entry: DeviceCacheEntry, ttl: Duration);

    async fn get_recipient_info(&self, recipient_id: &str) -> Option<RecipientCacheEntry>;
    async fn set_recipient_info(
        &self,
        recipient_id: &str,
        entry: RecipientCacheEntry,
        ttl: Duration,
    );

    /// `None` means "cache miss, consult the store"; `Some(bool)` is an
    /// authoritative cached verdict for `(entry_type, value_hash)`.
    async fn is_in_blocklist(&self, entry_type: &str, value_hash: &str) -> Option<bool>;
    async fn set_blocklist_verdict(
        &self,
        entry_type: &str,
        value_hash: &str,
        is_blocked: bool,
        ttl: Duration,
    );

    async fn get_idempotency_marker(&self, transaction_id: Uuid) -> Option<IdempotencyMarker>;
    async fn set_idempotency_marker(
        &self,
        transaction_id: Uuid,
        marker: IdempotencyMarker,
        ttl: Duration,
    );
}
