//! Shared harness for the end-to-end pipeline tests: wires real analyzers,
//! the rule-based ML fallback, an in-memory cache/egress pair, and
//! temp-file-backed stores, mirroring the construction order in `main.rs`.

use fraud_engine::analyzers::amount::AmountAnalyzer;
use fraud_engine::analyzers::device::DeviceAnalyzer;
use fraud_engine::analyzers::geographic::GeographicAnalyzer;
use fraud_engine::analyzers::recipient::RecipientAnalyzer;
use fraud_engine::analyzers::time::TimeAnalyzer;
use fraud_engine::analyzers::velocity::VelocityAnalyzer;
use fraud_engine::analyzers::Analyzer;
use fraud_engine::cache::memory::InMemoryCacheStore;
use fraud_engine::cache::CacheStore;
use fraud_engine::config::Settings;
use fraud_engine::domain::{
    DeviceInfo, GeoInfo, HistoricalTransaction, TransactionEvent, TransferPayload, UserHistory,
};
use fraud_engine::egress::{EventEgress, InMemoryEgress};
use fraud_engine::ml::rule_based::RuleBasedModel;
use fraud_engine::orchestrator::Orchestrator;
use fraud_engine::stores::{AnalysisStore, BlocklistStore};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// A fixed Tuesday-afternoon timestamp so the time analyzer's off-hours /
/// late-night rules never fire unless a test asks for them explicitly.
pub fn weekday_afternoon() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap()
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub egress: Arc<InMemoryEgress>,
    pub analysis_store: Arc<AnalysisStore>,
    pub cache: Arc<InMemoryCacheStore>,
    pub blocklist: Arc<BlocklistStore>,
    pub settings: Arc<Settings>,
    _tempdir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let tempdir = tempfile::tempdir().expect("create temp dir for test db");
        let db_path = tempdir.path().join("fraud.db").to_string_lossy().to_string();

        let settings = Arc::new(Settings {
            db_path: db_path.clone(),
            ..Settings::default()
        });

        let cache = Arc::new(InMemoryCacheStore::new());
        let cache_dyn: Arc<dyn CacheStore> = cache.clone();

        let analysis_store = Arc::new(AnalysisStore::open(&db_path).expect("open analysis store"));
        let blocklist = Arc::new(
            BlocklistStore::open(&db_path, Arc::clone(&cache_dyn), settings.ttl.idempotency_marker)
                .expect("open blocklist store"),
        );

        let analyzers: Vec<Arc<dyn Analyzer>> = vec![
            Arc::new(VelocityAnalyzer::new(settings.velocity.clone(), 0.20)),
            Arc::new(AmountAnalyzer::new(settings.amount.clone(), 0.25)),
            Arc::new(GeographicAnalyzer::new(settings.geographic.clone(), 0.20)),
            Arc::new(RecipientAnalyzer::new(
                settings.recipient.clone(),
                0.15,
                Arc::clone(&blocklist),
                settings.geographic.high_risk_countries.clone(),
            )),
            Arc::new(DeviceAnalyzer::new(settings.device.clone(), 0.15, Arc::clone(&blocklist))),
            Arc::new(TimeAnalyzer::new(settings.time.clone(), 0.10)),
        ];

        let egress = Arc::new(InMemoryEgress::new());
        let egress_dyn: Arc<dyn EventEgress> = egress.clone();

        let orchestrator = Orchestrator::new(
            cache_dyn,
            Arc::clone(&analysis_store),
            analyzers,
            Arc::new(RuleBasedModel),
            egress_dyn,
            Arc::clone(&settings),
        );

        Self {
            orchestrator,
            egress,
            analysis_store,
            cache,
            blocklist,
            settings,
            _tempdir: tempdir,
        }
    }
}

pub struct EventBuilder {
    user_id: String,
    recipient_id: String,
    destination_account_id: String,
    amount: i64,
    country: Option<String>,
    device: Option<DeviceInfo>,
    timestamp: chrono::DateTime<Utc>,
}

impl EventBuilder {
    pub fn new(user_id: &str, recipient_id: &str, amount: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            recipient_id: recipient_id.to_string(),
            destination_account_id: format!("acct-{recipient_id}"),
            amount,
            country: None,
            device: None,
            timestamp: weekday_afternoon(),
        }
    }

    pub fn country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn device(mut self, fingerprint: &str, user_agent: &str) -> Self {
        self.device = Some(DeviceInfo {
            fingerprint: Some(fingerprint.to_string()),
            user_agent: Some(user_agent.to_string()),
            device_id: None,
            device_type: None,
        });
        self
    }

    pub fn timestamp(mut self, ts: chrono::DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }

    pub fn build(self) -> TransactionEvent {
        TransactionEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type: "TransactionCreated".into(),
            timestamp: self.timestamp,
            version: "1.0".into(),
            correlation_id: None,
            payload: TransferPayload {
                transaction_id: Uuid::new_v4(),
                user_id: self.user_id,
                source_account_id: "acct-source".into(),
                destination_account_id: self.destination_account_id,
                recipient_id: self.recipient_id,
                amount: Decimal::from(self.amount),
                currency: "USD".into(),
                geographic: self.country.map(|country| GeoInfo {
                    ip: None,
                    latitude: None,
                    longitude: None,
                    country: Some(country),
                    city: None,
                }),
                device: self.device,
                metadata: serde_json::json!({}),
            },
        }
    }
}

/// Builds a settled `UserHistory` of `count` transactions alternating
/// between `avg - spread` and `avg + spread` (keeps the mean at `avg` while
/// giving `standard_deviation` a nonzero value, which several analyzers
/// require before engaging their statistical rules).
pub fn seeded_history(
    user_id: &str,
    recipient_id: &str,
    country: &str,
    avg: i64,
    spread: i64,
    count: usize,
    account_age_days: i64,
) -> UserHistory {
    let mut history = UserHistory::new_user(user_id, Utc::now() - chrono::Duration::days(account_age_days));
    for i in 0..count {
        let amount = if i % 2 == 0 { avg - spread } else { avg + spread };
        history.push(HistoricalTransaction {
            amount: Decimal::from(amount),
            recipient_id: recipient_id.to_string(),
            country: Some(country.to_string()),
            device_fingerprint: None,
            timestamp: Utc::now() - chrono::Duration::hours((count - i) as i64),
            prior_fraud_score: None,
            latitude: None,
            longitude: None,
        });
    }
    history
}
