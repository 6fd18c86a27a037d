//! Durable blocklist store, cache-through via a [`CacheStore`] (§4.9).
//! Lookups hash the candidate value before touching either the cache or
//! the database so the raw value only ever exists in the caller's stack
//! frame and the store's own `value` column.

use crate::cache::keys::{sha256_hex, sha256_hex_truncated};
use crate::cache::CacheStore;
use crate::domain::{BlocklistEntry, BlocklistType};
use crate::error::{FraudError, FraudResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS blocklist_entries (
    id TEXT PRIMARY KEY,
    entry_type TEXT NOT NULL,
    value TEXT NOT NULL,
    value_hash TEXT NOT NULL,
    reason TEXT NOT NULL,
    severity TEXT NOT NULL,
    source TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    expires_at TEXT,
    match_count INTEGER NOT NULL DEFAULT 0,
    last_match_at TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_blocklist_lookup
    ON blocklist_entries(entry_type, value_hash) WHERE is_active = 1;
"#;

pub struct BlocklistStore {
    conn: Arc<Mutex<Connection>>,
    cache: Arc<dyn CacheStore>,
    verdict_ttl: Duration,
}

impl BlocklistStore {
    pub fn open(db_path: &str, cache: Arc<dyn CacheStore>, verdict_ttl: Duration) -> FraudResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)
            .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blocklist_entries", [], |r| r.get(0))
            .unwrap_or(0);
        info!(entries = count, "blocklist store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            cache,
            verdict_ttl,
        })
    }

    /// Cache-through lookup: a cached verdict (positive or negative) is
    /// trusted for `verdict_ttl`; on a miss the database is consulted and
    /// the result is cached for next time. Only a positive match returns
    /// `Some`; negatives populate the cache but return `None` here.
    pub async fn lookup(
        &self,
        entry_type: BlocklistType,
        value: &str,
    ) -> FraudResult<Option<BlocklistEntry>> {
        // The persisted index keys on the full SHA-256 digest (§3/§4.9); the
        // cache verdict keys on the 16-char truncation (§4.10) — the two
        // layers have different collision tolerances and are hashed
        // independently rather than sharing one value.
        let db_hash = sha256_hex(value);
        let cache_hash = sha256_hex_truncated(value);
        let type_str = entry_type.as_str();

        if let Some(cached) = self.cache.is_in_blocklist(type_str, &cache_hash).await {
            if !cached {
                return Ok(None);
            }
        }

        let conn = self.conn.clone();
        let type_owned = type_str.to_string();
        let hash_owned = db_hash.clone();
        let entry = tokio::task::spawn_blocking(move || -> rusqlite::Result<Option<BlocklistEntry>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT id, entry_type, value, value_hash, reason, severity, source, \
                        is_active, expires_at, match_count, last_match_at \
                 FROM blocklist_entries WHERE entry_type = ?1 AND value_hash = ?2 AND is_active = 1",
            )?;
            stmt.query_row(params![type_owned, hash_owned], row_to_entry).ok().transpose()
        })
        .await
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;

        let now = Utc::now();
        let is_blocked = entry.as_ref().is_some_and(|e| e.is_effective(now));
        self.cache
            .set_blocklist_verdict(type_str, &cache_hash, is_blocked, self.verdict_ttl)
            .await;

        if is_blocked {
            if let Some(e) = &entry {
                self.record_match(e.id).await?;
            }
        }
        Ok(entry.filter(|e| e.is_effective(now)))
    }

    pub async fn record_match(&self, id: Uuid) -> FraudResult<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.execute(
                "UPDATE blocklist_entries SET match_count = match_count + 1, last_match_at = ?1 \
                 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id.to_string()],
            )
        })
        .await
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        Ok(())
    }

    pub async fn add(&self, entry: BlocklistEntry) -> FraudResult<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.execute(
                "INSERT INTO blocklist_entries \
                 (id, entry_type, value, value_hash, reason, severity, source, is_active, expires_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id.to_string(),
                    entry.entry_type.as_str(),
                    entry.value,
                    entry.value_hash,
                    entry.reason,
                    entry.severity,
                    entry.source,
                    entry.is_active as i64,
                    entry.expires_at.map(|d| d.to_rfc3339()),
                ],
            )
        })
        .await
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        Ok(())
    }

    pub async fn deactivate(&self, id: Uuid) -> FraudResult<()> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.execute(
                "UPDATE blocklist_entries SET is_active = 0 WHERE id = ?1",
                params![id.to_string()],
            )
        })
        .await
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        warn!(%id, "blocklist entry deactivated");
        Ok(())
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<BlocklistEntry> {
    let entry_type: String = row.get(1)?;
    let expires_at: Option<String> = row.get(8)?;
    let last_match_at: Option<String> = row.get(10)?;
    Ok(BlocklistEntry {
        id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
        entry_type: parse_type(&entry_type),
        value: row.get(2)?,
        value_hash: row.get(3)?,
        reason: row.get(4)?,
        severity: row.get(5)?,
        source: row.get(6)?,
        is_active: row.get::<_, i64>(7)? != 0,
        expires_at: expires_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))),
        match_count: row.get::<_, i64>(9)? as u64,
        last_match_at: last_match_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))),
    })
}

fn parse_type(s: &str) -> BlocklistType {
    match s {
        "ACCOUNT" => BlocklistType::Account,
        "DEVICE" => BlocklistType::Device,
        "IP" => BlocklistType::Ip,
        "RECIPIENT" => BlocklistType::Recipient,
        "EMAIL" => BlocklistType::Email,
        "PHONE" => BlocklistType::Phone,
        _ => BlocklistType::Recipient,
    }
}
