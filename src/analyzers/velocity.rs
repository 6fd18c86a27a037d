//! Sliding-window velocity checks (§4.2). Counters are read from the
//! context, already incremented by the orchestrator's context-load step
//! (§4.1 step 2) — the analyzer itself never talks to the cache.

use super::{AnalysisContext, Analyzer};
use crate::config::VelocityConfig;
use crate::domain::{Method, RiskFactor, Window};
use async_trait::async_trait;
use std::collections::HashMap;

pub struct VelocityAnalyzer {
    config: VelocityConfig,
    weight: f64,
}

impl VelocityAnalyzer {
    pub fn new(config: VelocityConfig, weight: f64) -> Self {
        Self { config, weight }
    }
}

#[async_trait]
impl Analyzer for VelocityAnalyzer {
    fn method(&self) -> Method {
        Method::Velocity
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> RiskFactor {
        let mut details = HashMap::new();
        let mut raw = 0.0f64;

        let thresholds = [
            (Window::FiveMin, self.config.window_5m_threshold, self.config.weight_5m),
            (Window::OneHour, self.config.window_1h_threshold, self.config.weight_1h),
            (Window::TwentyFourHour, self.config.window_24h_threshold, self.config.weight_24h),
        ];

        for (window, threshold, weight) in thresholds {
            let counters = ctx.velocity.get(&window).copied().unwrap_or_default();
            let ratio = (counters.count as f64 / threshold as f64).min(2.0);
            raw += weight * ratio;
            details.insert(
                format!("count_{}", window.as_str()),
                serde_json::json!(counters.count),
            );
        }

        let count5m = ctx.velocity.get(&Window::FiveMin).copied().unwrap_or_default();
        let count24h = ctx
            .velocity
            .get(&Window::TwentyFourHour)
            .copied()
            .unwrap_or_default();

        if count24h.count > 0 {
            let avg24h = count24h.total_amount / count24h.count as f64;
            if count5m.total_amount > 10.0 * avg24h {
                raw += self.config.amount_spike_contribution;
                details.insert("amount_spike".to_string(), serde_json::json!(true));
            }
        }

        if count5m.count >= 3 && ctx.unique_recipients_5m >= 3 {
            raw += self.config.rapid_recipients_contribution;
            details.insert("rapid_diverse_recipients".to_string(), serde_json::json!(true));
        }

        raw = raw.min(self.config.rawscore_cap);
        RiskFactor::new(Method::Velocity, raw, self.weight, velocity_reason(raw))
            .with_detail("component", details)
    }
}

fn velocity_reason(raw: f64) -> String {
    if raw <= 0.0 {
        "No unusual transaction velocity observed".to_string()
    } else {
        format!("Elevated transaction velocity (raw score {:.2})", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheStore;
    use crate::domain::{TransactionEvent, TransferPayload, UserHistory};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::sync::Arc;
    use uuid::Uuid;

    fn ctx(velocity: HashMap<Window, crate::domain::VelocityCounters>, unique: u64) -> AnalysisContext {
        AnalysisContext {
            event: TransactionEvent {
                event_id: "e1".into(),
                event_type: "TransactionCreated".into(),
                timestamp: Utc::now(),
                version: "1.0".into(),
                correlation_id: None,
                payload: TransferPayload {
                    transaction_id: Uuid::new_v4(),
                    user_id: "u1".into(),
                    source_account_id: "acc1".into(),
                    destination_account_id: "acc2".into(),
                    recipient_id: "r1".into(),
                    amount: Decimal::from(100),
                    currency: "USD".into(),
                    geographic: None,
                    device: None,
                    metadata: serde_json::json!({}),
                },
            },
            now: Utc::now(),
            history: UserHistory::new_user("u1", Utc::now()),
            velocity,
            unique_recipients_5m: unique,
            current_country: None,
            device_cache: None,
            recipient_cache: None,
            known_devices: HashSet::new(),
            known_countries: HashSet::new(),
            trusted_recipients: HashSet::new(),
            cache: Arc::new(InMemoryCacheStore::new()),
        }
    }

    #[tokio::test]
    async fn no_velocity_data_is_zero() {
        let analyzer = VelocityAnalyzer::new(VelocityConfig::default(), 0.10);
        let factor = analyzer.analyze(&ctx(HashMap::new(), 0)).await;
        assert_eq!(factor.raw_score, 0.0);
    }

    #[tokio::test]
    async fn threshold_breach_raises_score() {
        let analyzer = VelocityAnalyzer::new(VelocityConfig::default(), 0.10);
        let mut velocity = HashMap::new();
        velocity.insert(
            Window::FiveMin,
            crate::domain::VelocityCounters { count: 6, total_amount: 600.0 },
        );
        let factor = analyzer.analyze(&ctx(velocity, 0)).await;
        assert!(factor.raw_score > 0.0);
    }

    #[tokio::test]
    async fn rapid_diverse_recipients_adds_contribution() {
        let analyzer = VelocityAnalyzer::new(VelocityConfig::default(), 0.10);
        let mut velocity = HashMap::new();
        velocity.insert(
            Window::FiveMin,
            crate::domain::VelocityCounters { count: 3, total_amount: 300.0 },
        );
        let factor = analyzer.analyze(&ctx(velocity, 3)).await;
        assert!(factor.raw_score >= 0.10);
    }

    #[tokio::test]
    async fn raw_score_never_exceeds_cap() {
        let analyzer = VelocityAnalyzer::new(VelocityConfig::default(), 0.10);
        let mut velocity = HashMap::new();
        velocity.insert(
            Window::FiveMin,
            crate::domain::VelocityCounters { count: 1000, total_amount: 100_000.0 },
        );
        velocity.insert(
            Window::OneHour,
            crate::domain::VelocityCounters { count: 1000, total_amount: 100_000.0 },
        );
        velocity.insert(
            Window::TwentyFourHour,
            crate::domain::VelocityCounters { count: 1000, total_amount: 1.0 },
        );
        let factor = analyzer.analyze(&ctx(velocity, 10)).await;
        assert!(factor.raw_score <= 0.45 + f64::EPSILON);
    }
}
