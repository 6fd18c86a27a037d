//! Default `CacheStore` implementation: an in-process, `dashmap`-backed
//! cache with manual TTL bookkeeping. Chosen over a TTL-aware cache crate
//! because the eviction logic stays small and auditable in tests; see
//! DESIGN.md for the tradeoff.

use super::{CacheStore, DeviceCacheEntry, RecipientCacheEntry};
use crate::domain::{IdempotencyMarker, UserHistory, VelocityCounters, Window};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// The unique-recipient set used by the velocity analyzer's rapid-fanout
/// rule always uses the 5 minute window regardless of which `Window` the
/// caller is otherwise tracking (§4.2).
const UNIQUE_RECIPIENT_TTL: Duration = Duration::from_secs(300);

struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

pub struct InMemoryCacheStore {
    velocity: DashMap<(String, Window), Expiring<VelocityCounters>>,
    unique_recipients: DashMap<String, Expiring<HashSet<String>>>,
    user_history: DashMap<String, Expiring<UserHistory>>,
    device_info: DashMap<String, Expiring<DeviceCacheEntry>>,
    recipient_info: DashMap<String, Expiring<RecipientCacheEntry>>,
    blocklist_verdicts: DashMap<(String, String), Expiring<bool>>,
    idempotency: DashMap<Uuid, Expiring<IdempotencyMarker>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self {
            velocity: DashMap::new(),
            unique_recipients: DashMap::new(),
            user_history: DashMap::new(),
            device_info: DashMap::new(),
            recipient_info: DashMap::new(),
            blocklist_verdicts: DashMap::new(),
            idempotency: DashMap::new(),
        }
    }

    /// Drop expired entries across all keyspaces. Not called on the hot
    /// path; intended for a periodic background sweep (§4.10 "stale
    /// entries are reclaimed lazily or via a sweep, implementations may
    /// choose either").
    pub fn sweep_expired(&self) {
        self.velocity.retain(|_, v| v.is_live());
        self.unique_recipients.retain(|_, v| v.is_live());
        self.user_history.retain(|_, v| v.is_live());
        self.device_info.retain(|_, v| v.is_live());
        self.recipient_info.retain(|_, v| v.is_live());
        self.blocklist_verdicts.retain(|_, v| v.is_live());
        self.idempotency.retain(|_, v| v.is_live());
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn increment_velocity(
        &self,
        user_id: &str,
        window: Window,
        amount: f64,
    ) -> VelocityCounters {
        let key = (user_id.to_string(), window);
        let mut entry = self
            .velocity
            .entry(key)
            .and_modify(|e| {
                if !e.is_live() {
                    e.value = VelocityCounters::default();
                    e.expires_at = Instant::now() + window.ttl();
                }
            })
            .or_insert_with(|| Expiring::new(VelocityCounters::default(), window.ttl()));
        entry.value.count += 1;
        entry.value.total_amount += amount;
        entry.value
    }

    async fn get_velocity(&self, user_id: &str, window: Window) -> VelocityCounters {
        self.velocity
            .get(&(user_id.to_string(), window))
            .filter(|e| e.is_live())
            .map(|e| e.value)
            .unwrap_or_default()
    }

    async fn track_unique_recipient(&self, user_id: &str, recipient_id: &str) -> u64 {
        let mut entry = self
            .unique_recipients
            .entry(user_id.to_string())
            .and_modify(|e| {
                if !e.is_live() {
                    e.value.clear();
                    e.expires_at = Instant::now() + UNIQUE_RECIPIENT_TTL;
                }
            })
            .or_insert_with(|| Expiring::new(HashSet::new(), UNIQUE_RECIPIENT_TTL));
        entry.value.insert(recipient_id.to_string());
        entry.value.len() as u64
    }

    async fn get_user_history(&self, user_id: &str) -> Option<UserHistory> {
        self.user_history
            .get(user_id)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone())
    }

    async fn set_user_history(&self, user_id: &str, history: &UserHistory, ttl: Duration) {
        self.user_history
            .insert(user_id.to_string(), Expiring::new(history.clone(), ttl));
    }

    async fn get_device_info(&self, device_hash: &str) -> Option<DeviceCacheEntry> {
        self.device_info
            .get(device_hash)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone())
    }

    async fn set_device_info(&self, device_hash: &str, entry: DeviceCacheEntry, ttl: Duration) {
        self.device_info
            .insert(device_hash.to_string(), Expiring::new(entry, ttl));
    }

    async fn get_recipient_info(&self, recipient_id: &str) -> Option<RecipientCacheEntry> {
        self.recipient_info
            .get(recipient_id)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone())
    }

    async fn set_recipient_info(
        &self,
        recipient_id: &str,
        entry: RecipientCacheEntry,
        ttl: Duration,
    ) {
        self.recipient_info
            .insert(recipient_id.to_string(), Expiring::new(entry, ttl));
    }

    async fn is_in_blocklist(&self, entry_type: &str, value_hash: &str) -> Option<bool> {
        self.blocklist_verdicts
            .get(&(entry_type.to_string(), value_hash.to_string()))
            .filter(|e| e.is_live())
            .map(|e| e.value)
    }

    async fn set_blocklist_verdict(
        &self,
        entry_type: &str,
        value_hash: &str,
        is_blocked: bool,
        ttl: Duration,
    ) {
        self.blocklist_verdicts.insert(
            (entry_type.to_string(), value_hash.to_string()),
            Expiring::new(is_blocked, ttl),
        );
    }

    async fn get_idempotency_marker(&self, transaction_id: Uuid) -> Option<IdempotencyMarker> {
        self.idempotency
            .get(&transaction_id)
            .filter(|e| e.is_live())
            .map(|e| e.value.clone())
    }

    async fn set_idempotency_marker(
        &self,
        transaction_id: Uuid,
        marker: IdempotencyMarker,
        ttl: Duration,
    ) {
        self.idempotency
            .insert(transaction_id, Expiring::new(marker, ttl));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn velocity_increments_and_persists() {
        let cache = InMemoryCacheStore::new();
        cache.increment_velocity("u1", Window::FiveMin, 10.0).await;
        let c = cache.increment_velocity("u1", Window::FiveMin, 20.0).await;
        assert_eq!(c.count, 2);
        assert_eq!(c.total_amount, 30.0);
    }

    #[tokio::test]
    async fn velocity_is_isolated_per_window() {
        let cache = InMemoryCacheStore::new();
        cache.increment_velocity("u1", Window::FiveMin, 10.0).await;
        let hour = cache.get_velocity("u1", Window::OneHour).await;
        assert_eq!(hour.count, 0);
    }

    #[tokio::test]
    async fn unique_recipients_dedupe() {
        let cache = InMemoryCacheStore::new();
        cache.track_unique_recipient("u1", "r1").await;
        cache.track_unique_recipient("u1", "r1").await;
        let n = cache.track_unique_recipient("u1", "r2").await;
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn blocklist_verdict_round_trips() {
        let cache = InMemoryCacheStore::new();
        assert!(cache.is_in_blocklist("device", "abc").await.is_none());
        cache
            .set_blocklist_verdict("device", "abc", true, Duration::from_secs(60))
            .await;
        assert_eq!(cache.is_in_blocklist("device", "abc").await, Some(true));
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_miss() {
        let cache = InMemoryCacheStore::new();
        cache
            .set_blocklist_verdict("device", "abc", true, Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.is_in_blocklist("device", "abc").await.is_none());
    }
}
