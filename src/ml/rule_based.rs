//! Built-in rule-based fallback model (§4.8), used when both the primary
//! and fallback model files fail to load.

use super::{FeatureVector, MlScore, MlScorer};
use async_trait::async_trait;

pub const RULE_BASED_VERSION: &str = "rule-based-v1";
const RULE_BASED_CONFIDENCE: f64 = 0.7;
const CAP: f64 = 0.95;

pub struct RuleBasedModel;

#[async_trait]
impl MlScorer for RuleBasedModel {
    async fn score(&self, features: &FeatureVector) -> MlScore {
        let mut score = 0.0f64;

        if features.tx_count_five_min > 3.0 {
            score += 0.15;
        }
        if features.tx_count_one_hour > 10.0 {
            score += 0.10;
        }
        if features.amount_ratio_to_avg > 5.0 {
            score += 0.20;
        }
        if features.impossible_travel > 0.0 {
            score += 0.30;
        }
        if features.is_new_recipient > 0.0 {
            score += 0.10;
        }
        if features.is_new_device > 0.0 {
            score += 0.10;
        }
        score += 0.15 * features.previous_fraud_flags.min(3.0);

        MlScore {
            score: score.min(CAP),
            confidence: RULE_BASED_CONFIDENCE,
            model_version: RULE_BASED_VERSION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_features() -> FeatureVector {
        FeatureVector {
            tx_count_five_min: 0.0,
            tx_count_one_hour: 0.0,
            tx_count_twenty_four_hours: 0.0,
            amount_five_min: 0.0,
            amount_one_hour: 0.0,
            amount_twenty_four_hours: 0.0,
            amount: 100.0,
            amount_ratio_to_avg: 1.0,
            amount_ratio_to_max: 1.0,
            amount_z_score: 0.0,
            is_new_country: 0.0,
            distance_from_last_tx_km: 0.0,
            impossible_travel: 0.0,
            hour_of_day: 12.0,
            day_of_week: 2.0,
            is_unusual_hour: 0.0,
            time_since_last_tx_ms: 0.0,
            is_new_recipient: 0.0,
            recipient_risk_score: 0.0,
            recipient_tx_count: 1.0,
            is_new_device: 0.0,
            device_trust_score: 0.9,
            account_age_days: 365.0,
            total_tx_count: 50.0,
            avg_tx_amount: 100.0,
            previous_fraud_flags: 0.0,
        }
    }

    #[tokio::test]
    async fn quiet_transaction_scores_zero() {
        let model = RuleBasedModel;
        let result = model.score(&base_features()).await;
        assert_eq!(result.score, 0.0);
        assert_eq!(result.model_version, RULE_BASED_VERSION);
    }

    #[tokio::test]
    async fn impossible_travel_dominates() {
        let model = RuleBasedModel;
        let mut f = base_features();
        f.impossible_travel = 1.0;
        let result = model.score(&f).await;
        assert!((result.score - 0.30).abs() < 1e-9);
    }

    #[tokio::test]
    async fn score_is_capped() {
        let model = RuleBasedModel;
        let mut f = base_features();
        f.tx_count_five_min = 10.0;
        f.tx_count_one_hour = 20.0;
        f.amount_ratio_to_avg = 10.0;
        f.impossible_travel = 1.0;
        f.is_new_recipient = 1.0;
        f.is_new_device = 1.0;
        f.previous_fraud_flags = 5.0;
        let result = model.score(&f).await;
        assert!(result.score <= CAP + f64::EPSILON);
    }
}
