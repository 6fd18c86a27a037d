//! ML scoring: the 26-feature vector (§6), the `MlScorer` trait, model
//! loading policy (§4.8), and the built-in rule-based fallback.

pub mod model;
pub mod rule_based;

use crate::analyzers::AnalysisContext;
use crate::domain::{Method, RiskFactor, Window};
use async_trait::async_trait;

/// Fixed-order 26-feature vector (§6). Field order matches the spec
/// exactly; a model trained against that order must not be fed a
/// reordered struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub tx_count_five_min: f64,
    pub tx_count_one_hour: f64,
    pub tx_count_twenty_four_hours: f64,
    pub amount_five_min: f64,
    pub amount_one_hour: f64,
    pub amount_twenty_four_hours: f64,
    pub amount: f64,
    pub amount_ratio_to_avg: f64,
    pub amount_ratio_to_max: f64,
    pub amount_z_score: f64,
    pub is_new_country: f64,
    pub distance_from_last_tx_km: f64,
    pub impossible_travel: f64,
    pub hour_of_day: f64,
    pub day_of_week: f64,
    pub is_unusual_hour: f64,
    pub time_since_last_tx_ms: f64,
    pub is_new_recipient: f64,
    pub recipient_risk_score: f64,
    pub recipient_tx_count: f64,
    pub is_new_device: f64,
    pub device_trust_score: f64,
    pub account_age_days: f64,
    pub total_tx_count: f64,
    pub avg_tx_amount: f64,
    pub previous_fraud_flags: f64,
}

const FRAUD_FLAG_THRESHOLD: f64 = 0.5;

impl FeatureVector {
    /// Builds the vector directly from the shared analysis context. Kept
    /// independent of the rule analyzers' internal bookkeeping (§5: "ML
    /// feature preparation is independent"), at the cost of recomputing a
    /// few simple derived values (new-country, impossible-travel) the same
    /// way the geographic analyzer does.
    pub fn build(ctx: &AnalysisContext) -> Self {
        let amount: f64 = ctx.event.payload.amount.to_string().parse().unwrap_or(0.0);
        let five_min = ctx.velocity.get(&Window::FiveMin).copied().unwrap_or_default();
        let one_hour = ctx.velocity.get(&Window::OneHour).copied().unwrap_or_default();
        let twenty_four_hour = ctx
            .velocity
            .get(&Window::TwentyFourHour)
            .copied()
            .unwrap_or_default();

        let avg: f64 = ctx.history.average_amount.to_string().parse().unwrap_or(0.0);
        let max: f64 = ctx.history.max_amount.to_string().parse().unwrap_or(0.0);
        let amount_ratio_to_avg = if avg > 0.0 { amount / avg } else { 0.0 };
        let amount_ratio_to_max = if max > 0.0 { amount / max } else { 0.0 };
        let amount_z_score = if ctx.history.standard_deviation > 0.0 {
            (amount - avg) / ctx.history.standard_deviation
        } else {
            0.0
        };

        let current_country = ctx
            .current_country
            .clone()
            .or_else(|| ctx.event.payload.geographic.as_ref().and_then(|g| g.country.clone()));
        let is_new_country = current_country
            .as_ref()
            .map(|c| !ctx.known_countries.is_empty() && !ctx.known_countries.contains(c))
            .unwrap_or(false);

        let last_tx = ctx.history.transactions.last();
        let (impossible_travel, time_since_last_tx_ms) = match last_tx {
            Some(last) => {
                let hours_since = (ctx.now - last.timestamp).num_seconds() as f64 / 3600.0;
                let impossible = last
                    .country
                    .as_ref()
                    .zip(current_country.as_ref())
                    .map(|(a, b)| a != b && hours_since < 2.0)
                    .unwrap_or(false);
                (impossible, (ctx.now - last.timestamp).num_milliseconds() as f64)
            }
            None => (false, 0.0),
        };

        let recipient_id = &ctx.event.payload.recipient_id;
        let is_new_recipient = !ctx.history.unique_recipients.contains(recipient_id);
        let recipient_tx_count = ctx
            .history
            .transactions
            .iter()
            .filter(|t| &t.recipient_id == recipient_id)
            .count() as f64;

        let fingerprint = ctx.event.payload.device.as_ref().and_then(|d| d.fingerprint.as_deref());
        let is_new_device = fingerprint
            .map(|fp| !ctx.known_devices.is_empty() && !ctx.known_devices.contains(fp))
            .unwrap_or(true);

        let hour = chrono::Timelike::hour(&ctx.event.timestamp);
        let day = chrono::Datelike::weekday(&ctx.event.timestamp).num_days_from_sunday();

        let previous_fraud_flags = ctx
            .history
            .transactions
            .iter()
            .filter(|t| t.prior_fraud_score.unwrap_or(0.0) >= FRAUD_FLAG_THRESHOLD)
            .count() as f64;

        Self {
            tx_count_five_min: five_min.count as f64,
            tx_count_one_hour: one_hour.count as f64,
            tx_count_twenty_four_hours: twenty_four_hour.count as f64,
            amount_five_min: five_min.total_amount,
            amount_one_hour: one_hour.total_amount,
            amount_twenty_four_hours: twenty_four_hour.total_amount,
            amount,
            amount_ratio_to_avg,
            amount_ratio_to_max,
            amount_z_score,
            is_new_country: is_new_country as u8 as f64,
            distance_from_last_tx_km: 0.0,
            impossible_travel: impossible_travel as u8 as f64,
            hour_of_day: hour as f64,
            day_of_week: day as f64,
            is_unusual_hour: ((1..=5).contains(&hour)) as u8 as f64,
            time_since_last_tx_ms,
            is_new_recipient: is_new_recipient as u8 as f64,
            recipient_risk_score: ctx.recipient_cache.as_ref().map(|c| c.risk_score).unwrap_or(0.0),
            recipient_tx_count,
            is_new_device: is_new_device as u8 as f64,
            device_trust_score: ctx.device_cache.as_ref().map(|c| c.trust_score).unwrap_or(0.5),
            account_age_days: ctx.history.account_age_days(ctx.now) as f64,
            total_tx_count: ctx.history.total_transactions as f64,
            avg_tx_amount: avg,
            previous_fraud_flags,
        }
    }

    pub fn as_array(&self) -> [f64; 26] {
        [
            self.tx_count_five_min,
            self.tx_count_one_hour,
            self.tx_count_twenty_four_hours,
            self.amount_five_min,
            self.amount_one_hour,
            self.amount_twenty_four_hours,
            self.amount,
            self.amount_ratio_to_avg,
            self.amount_ratio_to_max,
            self.amount_z_score,
            self.is_new_country,
            self.distance_from_last_tx_km,
            self.impossible_travel,
            self.hour_of_day,
            self.day_of_week,
            self.is_unusual_hour,
            self.time_since_last_tx_ms,
            self.is_new_recipient,
            self.recipient_risk_score,
            self.recipient_tx_count,
            self.is_new_device,
            self.device_trust_score,
            self.account_age_days,
            self.total_tx_count,
            self.avg_tx_amount,
            self.previous_fraud_flags,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct MlScore {
    pub score: f64,
    pub confidence: f64,
    pub model_version: String,
}

#[async_trait]
pub trait MlScorer: Send + Sync {
    async fn score(&self, features: &FeatureVector) -> MlScore;
}

/// Wraps any `MlScorer` into the `RiskFactor` the aggregator expects,
/// applying the fixed ML weight (§4.8: weight=0.30).
pub fn to_risk_factor(result: &MlScore, weight: f64) -> RiskFactor {
    RiskFactor::new(
        Method::MlModel,
        result.score,
        weight,
        format!("ML model {} scored {:.2}", result.model_version, result.score),
    )
    .with_detail("model_version", result.model_version.clone())
    .with_detail("confidence", result.confidence)
}
