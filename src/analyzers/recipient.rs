//! New/untrusted recipient heuristics with a blocklist short-circuit
//! (§4.5). This is one of the two analyzers (with device) that can force
//! a hard-reject `RiskFactor`.

use super::{AnalysisContext, Analyzer};
use crate::config::RecipientConfig;
use crate::domain::{BlocklistType, Method, RiskFactor};
use crate::stores::BlocklistStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RecipientAnalyzer {
    config: RecipientConfig,
    weight: f64,
    blocklist: Arc<BlocklistStore>,
    /// Shared with `GeographicConfig::high_risk_countries` — the rule here
    /// looks at the recipient's own registered country, independent of the
    /// payer's geography (§4.5), but draws from the same risk table.
    high_risk_countries: HashMap<String, f64>,
}

impl RecipientAnalyzer {
    pub fn new(
        config: RecipientConfig,
        weight: f64,
        blocklist: Arc<BlocklistStore>,
        high_risk_countries: HashMap<String, f64>,
    ) -> Self {
        Self {
            config,
            weight,
            blocklist,
            high_risk_countries,
        }
    }
}

#[async_trait]
impl Analyzer for RecipientAnalyzer {
    fn method(&self) -> Method {
        Method::Recipient
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> RiskFactor {
        let recipient_id = &ctx.event.payload.recipient_id;
        let destination_account = &ctx.event.payload.destination_account_id;

        let recipient_hit = self
            .blocklist
            .lookup(BlocklistType::Recipient, recipient_id)
            .await
            .ok()
            .flatten();
        let account_hit = self
            .blocklist
            .lookup(BlocklistType::Account, destination_account)
            .await
            .ok()
            .flatten();

        if recipient_hit.is_some() || account_hit.is_some() {
            return RiskFactor::hard_reject(Method::Recipient, "Recipient or destination account is blocklisted");
        }

        let mut raw = 0.0f64;
        let mut fired = Vec::new();

        let is_first_ever = !ctx.history.unique_recipients.contains(recipient_id);
        if is_first_ever {
            raw += 0.15;
            fired.push("first_ever_transaction_to_recipient");
        }

        let prior_count_to_recipient = ctx
            .history
            .transactions
            .iter()
            .filter(|t| &t.recipient_id == recipient_id)
            .count();

        if let Some(cache) = &ctx.recipient_cache {
            if cache.first_seen_days_ago <= self.config.new_recipient_days && prior_count_to_recipient < 3 {
                raw += 0.10;
                fired.push("new_recipient_few_transactions");
            }

            if cache.risk_score > 0.3 {
                raw += 0.2 * cache.risk_score;
                fired.push("elevated_recipient_risk_score");
            }

            if !cache.is_verified {
                raw += 0.05;
                fired.push("recipient_not_verified");
            }

            if let Some(age) = cache.account_age_days {
                if age < self.config.new_recipient_days {
                    raw += 0.10;
                    fired.push("recipient_account_age_under_threshold");
                }
            }

            if let Some(country) = &cache.country {
                if self.high_risk_countries.contains_key(country) {
                    raw += 0.08;
                    fired.push("recipient_high_risk_country");
                }
            }
        } else if is_first_ever {
            raw += 0.10;
            fired.push("new_recipient_few_transactions");
        }

        let new_recipients_24h = ctx
            .history
            .transactions
            .iter()
            .filter(|t| (ctx.now - t.timestamp).num_hours() < 24)
            .map(|t| t.recipient_id.clone())
            .collect::<std::collections::HashSet<_>>()
            .len();
        if new_recipients_24h >= 3 {
            raw += 0.12;
            fired.push("burst_of_new_recipients");
        }

        raw = raw.min(self.config.rawscore_cap);
        let mut details = HashMap::new();
        details.insert("rules_fired".to_string(), serde_json::json!(fired));

        RiskFactor::new(Method::Recipient, raw, self.weight, recipient_reason(raw))
            .with_detail("component", details)
    }
}

fn recipient_reason(raw: f64) -> String {
    if raw <= 0.0 {
        "Recipient is known and trusted".to_string()
    } else {
        format!("Recipient risk detected (raw score {:.2})", raw)
    }
}
