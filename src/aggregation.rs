//! Weighted aggregation and threshold-based decision (§4.11).

use crate::config::ThresholdConfig;
use crate::domain::{Confidence, Decision, Method, RiskFactor};

pub struct AggregationResult {
    pub final_score: f64,
    pub decision: Decision,
    pub confidence: Confidence,
    pub requires_manual_review: bool,
}

/// `finalScore = min(1, Σ contributedScore)`; a contributed score of 1.0
/// from RECIPIENT or DEVICE (a blocklist hit) forces REJECT regardless of
/// the sum (§4.11).
pub fn aggregate(factors: &[RiskFactor], thresholds: &ThresholdConfig) -> AggregationResult {
    let sum: f64 = factors.iter().map(|f| f.contributed_score).sum();
    let final_score = sum.min(1.0);

    let blocklist_hard_reject = factors.iter().any(|f| {
        matches!(f.method, Method::Recipient | Method::Device) && f.contributed_score >= 1.0
    });

    let decision = if blocklist_hard_reject {
        Decision::Reject
    } else if final_score >= thresholds.reject_min {
        Decision::Reject
    } else if final_score >= thresholds.suspicious_min {
        Decision::Suspicious
    } else {
        Decision::Approve
    };

    let requires_manual_review = !matches!(decision, Decision::Approve);

    let ml_factor = factors.iter().find(|f| f.method == Method::MlModel);
    let ml_confidence = ml_factor
        .and_then(|f| f.details.get("confidence"))
        .and_then(|v| v.as_f64());
    let non_zero_rule_factors = factors
        .iter()
        .filter(|f| f.method != Method::MlModel && f.raw_score > 0.0)
        .count();

    let confidence = match ml_confidence {
        Some(c) if c >= 0.8 && non_zero_rule_factors >= 3 => Confidence::High,
        Some(c) if c >= 0.5 => Confidence::Medium,
        _ => Confidence::Low,
    };

    AggregationResult {
        final_score,
        decision,
        confidence,
        requires_manual_review,
    }
}
