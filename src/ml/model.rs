//! Model loading policy (§4.8): try the primary model (hash-checked when
//! configured), fall back to the fallback path, and finally serve the
//! built-in rule-based model. A hash mismatch on the primary is fatal at
//! startup — the service refuses to serve rather than run an unverified
//! model (§7).

use super::rule_based::RuleBasedModel;
use super::{FeatureVector, MlScore, MlScorer};
use crate::cache::keys::sha256_hex;
use crate::config::MlConfig;
use crate::error::{FraudError, FraudResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

fn sha256_bytes_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A minimal linear-plus-sigmoid model: 26 little-endian f64 weights
/// followed by one bias term, matching `FeatureVector`'s fixed order.
pub struct GradientModel {
    weights: [f64; 26],
    bias: f64,
    version: String,
}

impl GradientModel {
    fn from_bytes(bytes: &[u8], version: String) -> Option<Self> {
        const EXPECTED_LEN: usize = 27 * 8;
        if bytes.len() < EXPECTED_LEN {
            return None;
        }
        let mut weights = [0.0f64; 26];
        for (i, w) in weights.iter_mut().enumerate() {
            *w = f64::from_le_bytes(bytes[i * 8..i * 8 + 8].try_into().ok()?);
        }
        let bias = f64::from_le_bytes(bytes[26 * 8..27 * 8].try_into().ok()?);
        Some(Self { weights, bias, version })
    }
}

#[async_trait]
impl MlScorer for GradientModel {
    async fn score(&self, features: &FeatureVector) -> MlScore {
        let arr = features.as_array();
        let z: f64 = arr.iter().zip(self.weights.iter()).map(|(a, b)| a * b).sum::<f64>() + self.bias;
        let score = 1.0 / (1.0 + (-z).exp());
        MlScore {
            score,
            confidence: 0.85,
            model_version: self.version.clone(),
        }
    }
}

fn try_load(path: &str, validate_hash: bool, expected_hash: Option<&str>) -> FraudResult<Option<GradientModel>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path, error = %e, "failed to read model file, skipping");
            return Ok(None);
        }
    };

    if validate_hash {
        let actual = sha256_bytes_hex(&bytes);
        if let Some(expected) = expected_hash {
            if actual != expected {
                return Err(FraudError::BlocklistHashMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
    }

    let version = format!("gradient-{}", &sha256_hex(path)[..8]);
    Ok(GradientModel::from_bytes(&bytes, version))
}

pub fn load_model(config: &MlConfig) -> FraudResult<Arc<dyn MlScorer>> {
    match try_load(&config.model_path, config.model_hash_validation, config.expected_model_hash.as_deref())? {
        Some(model) => {
            info!(version = %model.version, "loaded primary ML model");
            return Ok(Arc::new(model));
        }
        None => {
            warn!(path = %config.model_path, "primary ML model unavailable, trying fallback");
        }
    }

    match try_load(&config.fallback_model_path, false, None)? {
        Some(model) => {
            warn!(version = %model.version, "loaded fallback ML model");
            Ok(Arc::new(model))
        }
        None => {
            warn!("no ML model file available, serving built-in rule-based model");
            Ok(Arc::new(RuleBasedModel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_files_fall_back_to_rule_based() {
        let config = MlConfig {
            inference_timeout: std::time::Duration::from_millis(5000),
            model_path: "/nonexistent/primary.bin".to_string(),
            fallback_model_path: "/nonexistent/fallback.bin".to_string(),
            model_hash_validation: false,
            expected_model_hash: None,
            weight: 0.30,
        };
        let model = load_model(&config).unwrap();
        let _ = model;
    }

    #[tokio::test]
    async fn gradient_model_scores_within_unit_interval() {
        let weights = [0.01f64; 26];
        let mut bytes = Vec::new();
        for w in weights {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
        bytes.extend_from_slice(&0.0f64.to_le_bytes());
        let model = GradientModel::from_bytes(&bytes, "test-v1".into()).unwrap();
        let features = FeatureVector {
            tx_count_five_min: 1.0,
            tx_count_one_hour: 1.0,
            tx_count_twenty_four_hours: 1.0,
            amount_five_min: 100.0,
            amount_one_hour: 100.0,
            amount_twenty_four_hours: 100.0,
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
        };
        let result = model.score(&features).await;
        assert!((0.0..=1.0).contains(&result.score));
    }
}
