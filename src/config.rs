//! Environment-driven configuration.
//!
//! Follows the teacher's `Config::from_env` pattern (`std::env::var(..)
//! .unwrap_or_else(|| default).parse().unwrap_or(default)`) generalized to
//! cover every knob enumerated in spec.md §6. Invalid values fall back to
//! the documented default rather than panicking; the one exception is the
//! model hash check, which is fatal at startup when enabled (§7).

use std::collections::HashMap;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct VelocityConfig {
    pub window_5m_threshold: u32,
    pub window_1h_threshold: u32,
    pub window_24h_threshold: u32,
    pub weight_5m: f64,
    pub weight_1h: f64,
    pub weight_24h: f64,
    pub amount_spike_contribution: f64,
    pub rapid_recipients_contribution: f64,
    pub rawscore_cap: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            window_5m_threshold: 3,
            window_1h_threshold: 10,
            window_24h_threshold: 50,
            weight_5m: 0.15,
            weight_1h: 0.10,
            weight_24h: 0.08,
            amount_spike_contribution: 0.12,
            rapid_recipients_contribution: 0.10,
            rawscore_cap: 0.45,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmountConfig {
    pub unusual_multiplier: f64,
    pub large_transfer_min: rust_decimal::Decimal,
    pub rawscore_cap: f64,
}

impl Default for AmountConfig {
    fn default() -> Self {
        Self {
            unusual_multiplier: 5.0,
            large_transfer_min: rust_decimal::Decimal::from(10_000),
            rawscore_cap: 0.40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeographicConfig {
    pub impossible_travel_hours: f64,
    pub max_reasonable_speed_kmh: f64,
    pub high_risk_countries: HashMap<String, f64>,
    pub rawscore_cap: f64,
}

impl Default for GeographicConfig {
    fn default() -> Self {
        let mut high_risk_countries = HashMap::new();
        high_risk_countries.insert("NG".to_string(), 0.12);
        high_risk_countries.insert("RU".to_string(), 0.10);
        high_risk_countries.insert("UA".to_string(), 0.08);
        high_risk_countries.insert("RO".to_string(), 0.07);
        high_risk_countries.insert("CN".to_string(), 0.08);
        high_risk_countries.insert("VN".to_string(), 0.08);
        high_risk_countries.insert("PH".to_string(), 0.06);
        high_risk_countries.insert("IN".to_string(), 0.05);
        Self {
            impossible_travel_hours: 2.0,
            max_reasonable_speed_kmh: 900.0,
            high_risk_countries,
            rawscore_cap: 0.50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecipientConfig {
    pub new_recipient_days: i64,
    pub rawscore_cap: f64,
}

impl Default for RecipientConfig {
    fn default() -> Self {
        Self {
            new_recipient_days: 30,
            rawscore_cap: 0.45,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub rawscore_cap: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { rawscore_cap: 0.40 }
    }
}

#[derive(Debug, Clone)]
pub struct TimeConfig {
    pub rawscore_cap: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self { rawscore_cap: 0.25 }
    }
}

#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    pub approve_max: f64,
    pub suspicious_min: f64,
    pub suspicious_max: f64,
    pub reject_min: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            approve_max: 0.50,
            suspicious_min: 0.50,
            suspicious_max: 0.80,
            reject_min: 0.80,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TtlConfig {
    pub user_history: Duration,
    pub idempotency_marker: Duration,
    pub velocity_window_5m: Duration,
    pub velocity_window_1h: Duration,
    pub velocity_window_24h: Duration,
    pub unique_recipient_set: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            user_history: Duration::from_secs(30 * 60),
            idempotency_marker: Duration::from_secs(5 * 60),
            velocity_window_5m: Duration::from_secs(5 * 60),
            velocity_window_1h: Duration::from_secs(60 * 60),
            velocity_window_24h: Duration::from_secs(24 * 60 * 60),
            unique_recipient_set: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MlConfig {
    pub inference_timeout: Duration,
    pub model_path: String,
    pub fallback_model_path: String,
    pub model_hash_validation: bool,
    pub expected_model_hash: Option<String>,
    pub weight: f64,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            inference_timeout: Duration::from_millis(5000),
            model_path: env_string("ML_MODEL_PATH", "models/fraud_model.bin"),
            fallback_model_path: env_string("ML_FALLBACK_MODEL_PATH", "models/fraud_model_fallback.bin"),
            model_hash_validation: env_or("ML_MODEL_HASH_VALIDATION", false),
            expected_model_hash: std::env::var("ML_MODEL_EXPECTED_HASH").ok(),
            weight: 0.30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicConfig {
    pub inbound_transfers: String,
    pub fraud_analysis: String,
    pub fraud_suspected: String,
    pub fraud_manual_review: String,
    pub fraud_review_complete: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            inbound_transfers: env_string("TOPIC_TRANSFERS", "banking.transfers.created"),
            fraud_analysis: env_string("TOPIC_FRAUD_ANALYSIS", "banking.fraud.analysis"),
            fraud_suspected: env_string("TOPIC_FRAUD_SUSPECTED", "banking.fraud.suspected"),
            fraud_manual_review: env_string("TOPIC_FRAUD_MANUAL_REVIEW", "banking.fraud.manual_review"),
            fraud_review_complete: env_string("TOPIC_FRAUD_REVIEW_COMPLETE", "banking.fraud.review_complete"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub processing_timeout: Duration,
    pub publish_budget: Duration,
    pub db_path: String,
    pub service_name: String,
    pub pool_size: u32,
    pub velocity: VelocityConfig,
    pub amount: AmountConfig,
    pub geographic: GeographicConfig,
    pub recipient: RecipientConfig,
    pub device: DeviceConfig,
    pub time: TimeConfig,
    pub thresholds: ThresholdConfig,
    pub ttl: TtlConfig,
    pub ml: MlConfig,
    pub topics: TopicConfig,
    pub field_encryption_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            processing_timeout: Duration::from_millis(5000),
            publish_budget: Duration::from_millis(500),
            db_path: env_string("DB_PATH", "./fraud_engine.db"),
            service_name: env_string("SERVICE_NAME", "fraud-engine"),
            pool_size: env_or("DB_POOL_SIZE", 8),
            velocity: VelocityConfig::default(),
            amount: AmountConfig::default(),
            geographic: GeographicConfig::default(),
            recipient: RecipientConfig::default(),
            device: DeviceConfig::default(),
            time: TimeConfig::default(),
            thresholds: ThresholdConfig::default(),
            ttl: TtlConfig::default(),
            ml: MlConfig::default(),
            topics: TopicConfig::default(),
            field_encryption_key: std::env::var("FIELD_ENCRYPTION_KEY").ok(),
        }
    }
}

impl Settings {
    /// Load configuration from the process environment, falling back to
    /// `.env` in the current directory (teacher's `load_env` pattern, minus
    /// the repo-root fallback search which doesn't apply to a standalone
    /// service binary).
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut settings = Settings::default();
        settings.processing_timeout =
            Duration::from_millis(env_or("PROCESSING_TIMEOUT_MS", 5000));
        settings.publish_budget = Duration::from_millis(env_or("PUBLISH_BUDGET_MS", 500));

        if settings.ml.model_hash_validation && settings.ml.expected_model_hash.is_none() {
            anyhow::bail!(
                "ML_MODEL_HASH_VALIDATION is enabled but ML_MODEL_EXPECTED_HASH is unset"
            );
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = Settings::default();
        assert_eq!(s.thresholds.suspicious_min, 0.50);
        assert_eq!(s.thresholds.reject_min, 0.80);
        assert_eq!(s.velocity.rawscore_cap, 0.45);
        assert_eq!(s.amount.rawscore_cap, 0.40);
        assert_eq!(s.geographic.rawscore_cap, 0.50);
        assert_eq!(s.recipient.rawscore_cap, 0.45);
        assert_eq!(s.device.rawscore_cap, 0.40);
        assert_eq!(s.time.rawscore_cap, 0.25);
    }
}
