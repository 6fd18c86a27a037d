//! Statistical and heuristic amount anomaly checks (§4.3). Rules that need
//! historical statistics are skipped when the user doesn't have enough
//! history yet (`UserHistory::has_sufficient_history`).

use super::{AnalysisContext, Analyzer};
use crate::config::AmountConfig;
use crate::domain::{Method, RiskFactor};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

const ROUND_EXACT: [i64; 7] = [1000, 2000, 5000, 10000, 20000, 50000, 100000];

pub struct AmountAnalyzer {
    config: AmountConfig,
    weight: f64,
}

impl AmountAnalyzer {
    pub fn new(config: AmountConfig, weight: f64) -> Self {
        Self { config, weight }
    }
}

#[async_trait]
impl Analyzer for AmountAnalyzer {
    fn method(&self) -> Method {
        Method::Amount
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> RiskFactor {
        let amount_dec = ctx.event.payload.amount;
        let amount: f64 = amount_dec.to_string().parse().unwrap_or(0.0);
        let large_min: f64 = self.config.large_transfer_min.to_string().parse().unwrap_or(10_000.0);
        let mut raw = 0.0f64;
        let mut fired = Vec::new();

        if ctx.history.has_sufficient_history() {
            let avg: f64 = ctx
                .history
                .average_amount
                .to_string()
                .parse()
                .unwrap_or(0.0);
            let max: f64 = ctx.history.max_amount.to_string().parse().unwrap_or(0.0);
            let std_dev = ctx.history.standard_deviation;

            if avg > 0.0 {
                if amount >= 2.0 * self.config.unusual_multiplier * avg {
                    raw += 0.20;
                    fired.push("ratio_to_avg_2x");
                } else if amount >= self.config.unusual_multiplier * avg {
                    raw += 0.12;
                    fired.push("ratio_to_avg");
                }
            }

            if max > 0.0 {
                if amount > 2.0 * max {
                    raw += 0.15;
                    fired.push("exceeds_max_2x");
                } else if amount > 1.5 * max {
                    raw += 0.08;
                    fired.push("exceeds_max");
                }
            }

            if std_dev > 0.0 {
                let z = (amount - avg) / std_dev;
                if z >= 4.0 {
                    raw += 0.18;
                    fired.push("zscore_4");
                } else if z >= 3.0 {
                    raw += 0.12;
                    fired.push("zscore_3");
                } else if z >= 2.0 {
                    raw += 0.06;
                    fired.push("zscore_2");
                }
            }
        }

        if amount >= 10.0 * large_min {
            raw += 0.12;
            fired.push("absolute_large_10x");
        } else if amount >= 5.0 * large_min {
            raw += 0.08;
            fired.push("absolute_large_5x");
        } else if amount >= large_min {
            raw += 0.04;
            fired.push("absolute_large_1x");
        }

        if is_round_exact(amount_dec) {
            raw += 0.05;
            fired.push("round_exact");
        } else if amount >= 500.0 && (amount.round() as i64) % 100 == 0 {
            raw += 0.03;
            fired.push("round_hundreds");
        }

        if (9000.0..10000.0).contains(&amount) {
            raw += 0.15;
            fired.push("ctr_structuring");
        } else if (4800.0..5000.0).contains(&amount) {
            raw += 0.08;
            fired.push("sub_threshold_5k");
        } else if (2900.0..3000.0).contains(&amount) {
            raw += 0.05;
            fired.push("sub_threshold_3k");
        }

        let account_age = ctx.history.account_age_days(ctx.now);
        if account_age < 30 && amount > 1000.0 {
            raw += 0.08;
            fired.push("new_account_large_amount");
        }

        raw = raw.min(self.config.rawscore_cap);
        let mut details = HashMap::new();
        details.insert("rules_fired".to_string(), serde_json::json!(fired));

        RiskFactor::new(Method::Amount, raw, self.weight, amount_reason(raw))
            .with_detail("component", details)
    }
}

fn is_round_exact(amount: Decimal) -> bool {
    ROUND_EXACT
        .iter()
        .any(|v| amount == Decimal::from(*v))
}

fn amount_reason(raw: f64) -> String {
    if raw <= 0.0 {
        "Amount is consistent with user history".to_string()
    } else {
        format!("Amount anomaly detected (raw score {:.2})", raw)
    }
}
