//! The per-transaction pipeline (§4.1): idempotency check, context load,
//! parallel analyzer fan-out, sequenced ML scoring, aggregation,
//! persistence, and publish. This is the one place that knows about every
//! other component; nothing else depends on it (§9 "circular dependencies").

use crate::aggregation::{self, AggregationResult};
use crate::analyzers::{AnalysisContext, Analyzer};
use crate::cache::{CacheStore, DeviceCacheEntry};
use crate::cache::keys::sha256_hex_truncated;
use crate::config::Settings;
use crate::domain::{
    AnalysisStatus, FraudAnalysis, HistoricalTransaction, IdempotencyMarker, TransactionEvent, UserHistory, Window,
};
use crate::egress::{self, EventEgress};
use crate::error::FraudResult;
use crate::health::HealthTracker;
use crate::ml::{self, FeatureVector, MlScore, MlScorer};
use crate::stores::AnalysisStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

pub struct Orchestrator {
    pub cache: Arc<dyn CacheStore>,
    pub analysis_store: Arc<AnalysisStore>,
    pub analyzers: Vec<Arc<dyn Analyzer>>,
    pub ml_scorer: Arc<dyn MlScorer>,
    pub egress: Arc<dyn EventEgress>,
    pub settings: Arc<Settings>,
    pub health: HealthTracker,
}

impl Orchestrator {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        analysis_store: Arc<AnalysisStore>,
        analyzers: Vec<Arc<dyn Analyzer>>,
        ml_scorer: Arc<dyn MlScorer>,
        egress: Arc<dyn EventEgress>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            cache,
            analysis_store,
            analyzers,
            ml_scorer,
            egress,
            settings,
            health: HealthTracker::new(),
        }
    }

    /// `process(event)` — idempotent end-to-end pipeline (§4.1).
    pub async fn process(&self, event: TransactionEvent) -> FraudResult<()> {
        let start = Instant::now();
        let transaction_id = event.payload.transaction_id;

        if self.cache.get_idempotency_marker(transaction_id).await.is_some() {
            info!(%transaction_id, "idempotency marker present, skipping reprocessing");
            return Ok(());
        }

        let ctx = self.load_context(&event).await;
        let deadline = Instant::now() + self.settings.processing_timeout;

        let mut factors = self.run_analyzers(&ctx, deadline).await;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let ml_budget = remaining.min(self.settings.ml.inference_timeout);
        let features = FeatureVector::build(&ctx);
        let ml_result = self.run_ml(&features, ml_budget).await;
        factors.push(ml::to_risk_factor(&ml_result, self.settings.ml.weight));

        let AggregationResult {
            final_score,
            decision,
            confidence,
            requires_manual_review,
        } = aggregation::aggregate(&factors, &self.settings.thresholds);

        let elapsed = start.elapsed();
        let timed_out = elapsed > self.settings.processing_timeout;
        let status = if timed_out {
            AnalysisStatus::Timeout
        } else {
            AnalysisStatus::Completed
        };
        self.health.record_processed(timed_out);
        metrics::histogram!("fraud_engine_analysis_duration_ms").record(elapsed.as_millis() as f64);
        metrics::counter!("fraud_engine_decisions_total", "decision" => decision.as_str()).increment(1);

        let mut component_scores = HashMap::new();
        for f in &factors {
            component_scores.insert(f.method.as_str().to_string(), f.contributed_score);
        }

        let analysis = FraudAnalysis {
            analysis_id: Uuid::new_v4(),
            transaction_id,
            user_id: event.payload.user_id.clone(),
            final_score,
            decision,
            confidence,
            status,
            factors,
            model_version: ml_result.model_version,
            analysis_time_ms: elapsed.as_millis() as u64,
            timestamp: event.timestamp,
            requires_manual_review,
            component_scores,
            correlation_id: event.correlation_id.clone(),
        };

        if let Err(e) = self.analysis_store.persist(&analysis).await {
            warn!(%transaction_id, error = %e, "failed to persist analysis, publishing anyway");
        }

        self.update_history(&ctx, &event, &analysis).await;

        let messages = egress::build_messages(&event, &analysis, &self.settings.topics, &self.settings.service_name);
        egress::publish_all(self.egress.as_ref(), messages).await;

        self.cache
            .set_idempotency_marker(
                transaction_id,
                IdempotencyMarker {
                    decision: analysis.decision,
                    score: analysis.final_score,
                    timestamp: analysis.timestamp,
                },
                self.settings.ttl.idempotency_marker,
            )
            .await;

        Ok(())
    }

    async fn load_context(&self, event: &TransactionEvent) -> AnalysisContext {
        let user_id = &event.payload.user_id;
        let now = chrono::Utc::now();

        let history = self
            .cache
            .get_user_history(user_id)
            .await
            .unwrap_or_else(|| UserHistory::new_user(user_id.clone(), now));

        let amount: f64 = event.payload.amount.to_string().parse().unwrap_or(0.0);
        let mut velocity = HashMap::new();
        for window in Window::ALL {
            let counters = self.cache.increment_velocity(user_id, window, amount).await;
            velocity.insert(window, counters);
        }

        let unique_recipients_5m = self
            .cache
            .track_unique_recipient(user_id, &event.payload.recipient_id)
            .await;

        let device_cache = event
            .payload
            .device
            .as_ref()
            .and_then(|d| d.fingerprint.as_deref())
            .map(sha256_hex_truncated);
        let device_cache: Option<DeviceCacheEntry> = match device_cache {
            Some(hash) => self.cache.get_device_info(&hash).await,
            None => None,
        };

        let recipient_cache = self.cache.get_recipient_info(&event.payload.recipient_id).await;

        let current_country = event.payload.geographic.as_ref().and_then(|g| g.country.clone());
        let known_devices = history.unique_devices.clone();
        let known_countries = history.unique_countries.clone();

        AnalysisContext {
            event: event.clone(),
            now,
            history,
            velocity,
            unique_recipients_5m,
            current_country,
            device_cache,
            recipient_cache,
            known_devices,
            known_countries,
            trusted_recipients: Default::default(),
            cache: Arc::clone(&self.cache),
        }
    }

    /// Runs the six rule-based analyzers concurrently, each individually
    /// raced against the shared deadline (§5 "per-analysis deadline cancels
    /// outstanding analyzer work"). A slow analyzer degrades to
    /// `unavailable` without blocking the others.
    async fn run_analyzers(
        &self,
        ctx: &AnalysisContext,
        deadline: Instant,
    ) -> Vec<crate::domain::RiskFactor> {
        let budget = deadline.saturating_duration_since(Instant::now());
        let mut handles = Vec::with_capacity(self.analyzers.len());
        for analyzer in &self.analyzers {
            let analyzer = Arc::clone(analyzer);
            let method = analyzer.method();
            handles.push(async move {
                match tokio::time::timeout(budget, run_one(analyzer, ctx)).await {
                    Ok(factor) => factor,
                    Err(_) => {
                        metrics::counter!("fraud_engine_analyzer_timeouts_total", "method" => method.as_str())
                            .increment(1);
                        crate::domain::RiskFactor::unavailable(method)
                    }
                }
            });
        }
        futures::future::join_all(handles).await
    }

    async fn run_ml(&self, features: &FeatureVector, budget: Duration) -> MlScore {
        match tokio::time::timeout(budget, self.ml_scorer.score(features)).await {
            Ok(result) => result,
            Err(_) => MlScore {
                score: 0.5,
                confidence: 0.1,
                model_version: format!("{}-error", base_model_version(&self.settings)),
            },
        }
    }

    /// Appends this transaction to the user's history and writes it back
    /// through the cache, honoring the configured TTL (§3 "invalidated on
    /// new completed analysis").
    async fn update_history(&self, ctx: &AnalysisContext, event: &TransactionEvent, analysis: &FraudAnalysis) {
        let mut history = ctx.history.clone();
        history.push(HistoricalTransaction {
            amount: event.payload.amount,
            recipient_id: event.payload.recipient_id.clone(),
            country: ctx.current_country.clone(),
            device_fingerprint: event.payload.device.as_ref().and_then(|d| d.fingerprint.clone()),
            timestamp: event.timestamp,
            prior_fraud_score: Some(analysis.final_score),
            latitude: event.payload.geographic.as_ref().and_then(|g| g.latitude),
            longitude: event.payload.geographic.as_ref().and_then(|g| g.longitude),
        });
        self.cache
            .set_user_history(&event.payload.user_id, &history, self.settings.ttl.user_history)
            .await;
    }
}

async fn run_one(analyzer: Arc<dyn Analyzer>, ctx: &AnalysisContext) -> crate::domain::RiskFactor {
    analyzer.analyze(ctx).await
}

fn base_model_version(settings: &Settings) -> String {
    if settings.ml.model_hash_validation {
        "primary".to_string()
    } else {
        "fallback".to_string()
    }
}

