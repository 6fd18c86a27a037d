//! In-process health snapshot (§9 "Supplemental features"). The HTTP
//! surface that would scrape this is out of scope (§1); this module only
//! maintains the state an external `/healthz` route would read, mirroring
//! the teacher's `AppState`-backed `/health` handler.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthSnapshot {
    pub last_success_at: Option<DateTime<Utc>>,
    pub processed_total: u64,
    pub timeout_total: u64,
    pub db_circuit_open: bool,
    pub cache_circuit_open: bool,
}

/// Shared, cheaply-cloned handle the orchestrator updates after every
/// `process()` call and an external health route would read.
#[derive(Clone)]
pub struct HealthTracker {
    inner: Arc<Inner>,
}

struct Inner {
    last_success_at: RwLock<Option<DateTime<Utc>>>,
    processed_total: AtomicU64,
    timeout_total: AtomicU64,
    db_circuit_open: std::sync::atomic::AtomicBool,
    cache_circuit_open: std::sync::atomic::AtomicBool,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                last_success_at: RwLock::new(None),
                processed_total: AtomicU64::new(0),
                timeout_total: AtomicU64::new(0),
                db_circuit_open: std::sync::atomic::AtomicBool::new(false),
                cache_circuit_open: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    pub fn record_processed(&self, timed_out: bool) {
        self.inner.processed_total.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            self.inner.timeout_total.fetch_add(1, Ordering::Relaxed);
        } else {
            *self.inner.last_success_at.write() = Some(Utc::now());
        }
    }

    pub fn set_db_circuit_open(&self, open: bool) {
        self.inner.db_circuit_open.store(open, Ordering::Relaxed);
    }

    pub fn set_cache_circuit_open(&self, open: bool) {
        self.inner.cache_circuit_open.store(open, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            last_success_at: *self.inner.last_success_at.read(),
            processed_total: self.inner.processed_total.load(Ordering::Relaxed),
            timeout_total: self.inner.timeout_total.load(Ordering::Relaxed),
            db_circuit_open: self.inner.db_circuit_open.load(Ordering::Relaxed),
            cache_circuit_open: self.inner.cache_circuit_open.load(Ordering::Relaxed),
        }
    }

    /// Whether the process should report itself healthy: at least one
    /// successful analysis (or none attempted yet) and no open circuit.
    pub fn is_healthy(&self) -> bool {
        let snap = self.snapshot();
        !snap.db_circuit_open && !snap.cache_circuit_open
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
