//! Device/fingerprint heuristics with a blocklist short-circuit (§4.6).

use super::{AnalysisContext, Analyzer};
use crate::cache::keys::sha256_hex_truncated;
use crate::config::DeviceConfig;
use crate::domain::{BlocklistType, Method, RiskFactor};
use crate::stores::BlocklistStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

const BOT_MARKERS: [&str; 8] = [
    "headlesschrome",
    "phantomjs",
    "selenium",
    "puppeteer",
    "playwright",
    "crawl",
    "bot",
    "spider",
];

const ANONYMIZER_MARKERS: [&str; 4] = ["proxy", "vpn", "tor", "anonymous"];

pub struct DeviceAnalyzer {
    config: DeviceConfig,
    weight: f64,
    blocklist: Arc<BlocklistStore>,
}

impl DeviceAnalyzer {
    pub fn new(config: DeviceConfig, weight: f64, blocklist: Arc<BlocklistStore>) -> Self {
        Self { config, weight, blocklist }
    }
}

#[async_trait]
impl Analyzer for DeviceAnalyzer {
    fn method(&self) -> Method {
        Method::Device
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> RiskFactor {
        let device = ctx.event.payload.device.as_ref();
        let fingerprint = device.and_then(|d| d.fingerprint.as_deref());
        let user_agent = device.and_then(|d| d.user_agent.as_deref());

        if fingerprint.is_none() && user_agent.is_none() {
            return RiskFactor::new(Method::Device, 0.12, self.weight, "No device signal present");
        }

        if let Some(fp) = fingerprint {
            if self
                .blocklist
                .lookup(BlocklistType::Device, fp)
                .await
                .ok()
                .flatten()
                .is_some()
            {
                return RiskFactor::hard_reject(Method::Device, "Device fingerprint is blocklisted");
            }
        }

        let mut raw = 0.0f64;
        let mut fired = Vec::new();

        if let Some(fp) = fingerprint {
            if ctx.known_devices.is_empty() {
                raw += 0.06;
                fired.push("first_ever_device");
            } else if !ctx.known_devices.contains(fp) {
                raw += 0.12;
                fired.push("unknown_device");
            }

            if let Some(cache) = &ctx.device_cache {
                if cache.trust_score < 0.5 {
                    raw += (1.0 - cache.trust_score) * 0.15;
                    fired.push("low_trust_score");
                }
            }

            if ctx.known_devices.len() <= 2
                && ctx.history.total_transactions >= 50
                && !ctx.known_devices.contains(fp)
            {
                raw += 0.10;
                fired.push("stable_pattern_disruption");
            }

            raw += fingerprint_quality_penalty(fp, &mut fired);
        }

        if let Some(ua) = user_agent {
            let lower = ua.to_lowercase();

            if BOT_MARKERS.iter().any(|m| lower.contains(m)) {
                raw += 0.25;
                fired.push("automation_signature");
            }

            if is_old_browser(&lower) {
                raw += 0.08;
                fired.push("outdated_browser");
            }

            if lower.contains("linux") && !lower.contains("chrome") && !lower.contains("firefox") {
                raw += 0.05;
                fired.push("unusual_linux_client");
            }

            if ua.len() < 20 {
                raw += 0.15;
                fired.push("short_user_agent");
            }

            if ANONYMIZER_MARKERS.iter().any(|m| lower.contains(m)) {
                raw += 0.10;
                fired.push("anonymizer_signature");
            }
        }

        raw = raw.min(self.config.rawscore_cap);
        let mut details = HashMap::new();
        details.insert("rules_fired".to_string(), serde_json::json!(fired));
        details.insert(
            "fingerprint_hash".to_string(),
            serde_json::json!(fingerprint.map(sha256_hex_truncated)),
        );

        RiskFactor::new(Method::Device, raw, self.weight, device_reason(raw))
            .with_detail("component", details)
    }
}

fn fingerprint_quality_penalty(fp: &str, fired: &mut Vec<&'static str>) -> f64 {
    if fp.len() < 16 {
        fired.push("low_fingerprint_length");
        return 0.15;
    }
    let unique_chars: std::collections::HashSet<char> = fp.chars().collect();
    if unique_chars.len() < 4 {
        fired.push("low_fingerprint_entropy");
        return 0.20;
    }
    let all_identical = fp.chars().all(|c| c == fp.chars().next().unwrap_or(' '));
    let all_zero = fp.chars().all(|c| c == '0');
    if all_identical || all_zero {
        fired.push("degenerate_fingerprint");
        return 0.25;
    }
    0.0
}

fn is_old_browser(lower: &str) -> bool {
    if let Some(version) = extract_version(lower, "chrome/") {
        if version < 70 {
            return true;
        }
    }
    if let Some(version) = extract_version(lower, "firefox/") {
        if version < 60 {
            return true;
        }
    }
    false
}

fn extract_version(lower: &str, marker: &str) -> Option<u32> {
    let idx = lower.find(marker)? + marker.len();
    let rest = &lower[idx..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn device_reason(raw: f64) -> String {
    if raw <= 0.0 {
        "Device is known and well-behaved".to_string()
    } else {
        format!("Device risk detected (raw score {:.2})", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryCacheStore;
    use crate::domain::{DeviceInfo, TransactionEvent, TransferPayload, UserHistory};
    use crate::stores::BlocklistStore;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::{HashMap as Map, HashSet};
    use std::time::Duration;
    use uuid::Uuid;

    fn ctx_with_device(device: Option<DeviceInfo>) -> AnalysisContext {
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
                    device,
                    metadata: serde_json::json!({}),
                },
            },
            now: Utc::now(),
            history: UserHistory::new_user("u1", Utc::now()),
            velocity: Map::new(),
            unique_recipients_5m: 0,
            current_country: None,
            device_cache: None,
            recipient_cache: None,
            known_devices: HashSet::new(),
            known_countries: HashSet::new(),
            trusted_recipients: HashSet::new(),
            cache: Arc::new(InMemoryCacheStore::new()),
        }
    }

    fn blocklist() -> Arc<BlocklistStore> {
        Arc::new(BlocklistStore::open(":memory:", Arc::new(InMemoryCacheStore::new()), Duration::from_secs(60)).unwrap())
    }

    #[tokio::test]
    async fn no_device_signal_is_neutral() {
        let analyzer = DeviceAnalyzer::new(DeviceConfig::default(), 0.10, blocklist());
        let factor = analyzer.analyze(&ctx_with_device(None)).await;
        assert_eq!(factor.raw_score, 0.12);
    }

    #[tokio::test]
    async fn automation_user_agent_is_flagged() {
        let analyzer = DeviceAnalyzer::new(DeviceConfig::default(), 0.10, blocklist());
        let device = DeviceInfo {
            fingerprint: Some("abcdef0123456789".into()),
            user_agent: Some("Mozilla/5.0 HeadlessChrome/91.0".into()),
            device_id: None,
            device_type: None,
        };
        let factor = analyzer.analyze(&ctx_with_device(Some(device))).await;
        assert!(factor.raw_score >= 0.25);
    }

    #[tokio::test]
    async fn degenerate_fingerprint_is_flagged() {
        let analyzer = DeviceAnalyzer::new(DeviceConfig::default(), 0.10, blocklist());
        let device = DeviceInfo {
            fingerprint: Some("0000000000000000".into()),
            user_agent: Some("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit".into()),
            device_id: None,
            device_type: None,
        };
        let factor = analyzer.analyze(&ctx_with_device(Some(device))).await;
        assert!(factor.raw_score >= 0.25);
    }
}
