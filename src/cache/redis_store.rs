//! Optional Redis-backed `CacheStore`, enabled by the `redis-cache`
//! feature for deployments that need the cache to survive a process
//! restart or be shared across instances. Grounded on the redis
//! `ConnectionManager` pattern used for the production cache backend in
//! the pack's DeFi risk-monitoring example.

use super::{CacheStore, DeviceCacheEntry, RecipientCacheEntry};
use crate::domain::{IdempotencyMarker, UserHistory, VelocityCounters, Window};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use uuid::Uuid;

pub struct RedisCacheStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisCacheStore {
    pub async fn connect(redis_url: &str, prefix: impl Into<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn key(&self, namespace: &str, id: &str) -> String {
        format!("{}:{}:{}", self.prefix, namespace, id)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn increment_velocity(
        &self,
        user_id: &str,
        window: Window,
        amount: f64,
    ) -> VelocityCounters {
        let mut conn = self.conn.clone();
        let count_key = self.key("velocity_count", &format!("{user_id}:{}", window.as_str()));
        let amount_key = self.key(
            "velocity_amount",
            &format!("{user_id}:{}", window.as_str()),
        );
        let ttl_secs = window.ttl().as_secs() as i64;

        let result: redis::RedisResult<(u64, f64)> = async {
            let count: u64 = conn.incr(&count_key, 1u64).await?;
            let _: () = conn.expire(&count_key, ttl_secs).await?;
            let total: f64 = conn.incr(&amount_key, amount).await?;
            let _: () = conn.expire(&amount_key, ttl_secs).await?;
            Ok((count, total))
        }
        .await;

        match result {
            Ok((count, total_amount)) => VelocityCounters { count, total_amount },
            Err(e) => {
                tracing::warn!(error = %e, "redis velocity increment failed, degrading to zero");
                VelocityCounters::default()
            }
        }
    }

    async fn get_velocity(&self, user_id: &str, window: Window) -> VelocityCounters {
        let mut conn = self.conn.clone();
        let count_key = self.key("velocity_count", &format!("{user_id}:{}", window.as_str()));
        let amount_key = self.key(
            "velocity_amount",
            &format!("{user_id}:{}", window.as_str()),
        );
        let count: u64 = conn.get(&count_key).await.unwrap_or(0);
        let total_amount: f64 = conn.get(&amount_key).await.unwrap_or(0.0);
        VelocityCounters { count, total_amount }
    }

    async fn track_unique_recipient(&self, user_id: &str, recipient_id: &str) -> u64 {
        let mut conn = self.conn.clone();
        let key = self.key("unique_recipients", user_id);
        let result: redis::RedisResult<u64> = async {
            let _: () = conn.sadd(&key, recipient_id).await?;
            let _: () = conn.expire(&key, 300).await?;
            conn.scard(&key).await
        }
        .await;
        result.unwrap_or(0)
    }

    async fn get_user_history(&self, user_id: &str) -> Option<UserHistory> {
        let mut conn = self.conn.clone();
        let key = self.key("user_history", user_id);
        let raw: Option<String> = conn.get(&key).await.ok()?;
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    async fn set_user_history(&self, user_id: &str, history: &UserHistory, ttl: Duration) {
        let mut conn = self.conn.clone();
        let key = self.key("user_history", user_id);
        if let Ok(serialized) = serde_json::to_string(history) {
            let _: redis::RedisResult<()> =
                conn.set_ex(&key, serialized, ttl.as_secs().max(1)).await;
        }
    }

    async fn get_device_info(&self, device_hash: &str) -> Option<DeviceCacheEntry> {
        let mut conn = self.conn.clone();
        let key = self.key("device", device_hash);
        let raw: Option<String> = conn.get(&key).await.ok()?;
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    async fn set_device_info(&self, device_hash: &str, entry: DeviceCacheEntry, ttl: Duration) {
        let mut conn = self.conn.clone();
        let key = self.key("device", device_hash);
        if let Ok(serialized) = serde_json::to_string(&entry) {
            let _: redis::RedisResult<()> =
                conn.set_ex(&key, serialized, ttl.as_secs().max(1)).await;
        }
    }

    async fn get_recipient_info(&self, recipient_id: &str) -> Option<RecipientCacheEntry> {
        let mut conn = self.conn.clone();
        let key = self.key("recipient", recipient_id);
        let raw: Option<String> = conn.get(&key).await.ok()?;
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    async fn set_recipient_info(
        &self,
        recipient_id: &str,
        entry: RecipientCacheEntry,
        ttl: Duration,
    ) {
        let mut conn = self.conn.clone();
        let key = self.key("recipient", recipient_id);
        if let Ok(serialized) = serde_json::to_string(&entry) {
            let _: redis::RedisResult<()> =
                conn.set_ex(&key, serialized, ttl.as_secs().max(1)).await;
        }
    }

    async fn is_in_blocklist(&self, entry_type: &str, value_hash: &str) -> Option<bool> {
        let mut conn = self.conn.clone();
        let key = self.key("blocklist", &format!("{entry_type}:{value_hash}"));
        let raw: Option<u8> = conn.get(&key).await.ok()?;
        raw.map(|v| v == 1)
    }

    async fn set_blocklist_verdict(
        &self,
        entry_type: &str,
        value_hash: &str,
        is_blocked: bool,
        ttl: Duration,
    ) {
        let mut conn = self.conn.clone();
        let key = self.key("blocklist", &format!("{entry_type}:{value_hash}"));
        let value: u8 = if is_blocked { 1 } else { 0 };
        let _: redis::RedisResult<()> = conn.set_ex(&key, value, ttl.as_secs().max(1)).await;
    }

    async fn get_idempotency_marker(&self, transaction_id: Uuid) -> Option<IdempotencyMarker> {
        let mut conn = self.conn.clone();
        let key = self.key("idempotency", &transaction_id.to_string());
        let raw: Option<String> = conn.get(&key).await.ok()?;
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    async fn set_idempotency_marker(
        &self,
        transaction_id: Uuid,
        marker: IdempotencyMarker,
        ttl: Duration,
    ) {
        let mut conn = self.conn.clone();
        let key = self.key("idempotency", &transaction_id.to_string());
        if let Ok(serialized) = serde_json::to_string(&marker) {
            let _: redis::RedisResult<()> =
                conn.set_ex(&key, serialized, ttl.as_secs().max(1)).await;
        }
    }
}
