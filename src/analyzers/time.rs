//! Hour/day pattern deviation checks (§4.7). `preferredHours`/`preferredDays`
//! are derived from the user's history on the fly rather than cached,
//! since they're cheap to recompute from the already-loaded `UserHistory`.

use super::{AnalysisContext, Analyzer};
use crate::config::TimeConfig;
use crate::domain::{Method, RiskFactor};
use async_trait::async_trait;
use chrono::{Datelike, Timelike};
use std::collections::{HashMap, HashSet};

const MIN_HISTORY_FOR_PATTERN: u64 = 10;
const HOUR_SHARE_THRESHOLD: f64 = 0.10;
const DAY_SHARE_THRESHOLD: f64 = 0.05;

/// (month, day) pairs, fixed-date holidays (§4.7).
const HOLIDAYS: [(u32, u32); 4] = [(1, 1), (7, 4), (12, 25), (12, 31)];

pub struct TimeAnalyzer {
    config: TimeConfig,
    weight: f64,
}

impl TimeAnalyzer {
    pub fn new(config: TimeConfig, weight: f64) -> Self {
        Self { config, weight }
    }
}

#[async_trait]
impl Analyzer for TimeAnalyzer {
    fn method(&self) -> Method {
        Method::Time
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> RiskFactor {
        let h = ctx.event.timestamp.hour();
        let d = ctx.event.timestamp.weekday().num_days_from_sunday();
        let mut raw = 0.0f64;
        let mut fired = Vec::new();

        let (preferred_hours, preferred_days) = derive_preferences(ctx);

        if preferred_hours.is_empty() {
            if (1..=5).contains(&h) {
                raw += 0.06;
                fired.push("off_hours_no_pattern");
            }
        } else {
            let dist = circular_distance(h, &preferred_hours);
            if dist >= 6 {
                raw += 0.10;
                fired.push("hour_far_from_pattern");
            } else if dist >= 3 {
                raw += 0.05;
                fired.push("hour_somewhat_off_pattern");
            }
        }

        if !preferred_days.is_empty() && !preferred_days.contains(&d) {
            let is_weekend = d == 0 || d == 6;
            let user_is_weekday_only = preferred_days.iter().all(|day| *day != 0 && *day != 6);
            if is_weekend && user_is_weekday_only {
                raw += 0.06;
                fired.push("weekend_for_weekday_user");
            } else {
                raw += 0.04;
                fired.push("unusual_day");
            }
        }

        if (2..=5).contains(&h) {
            raw += 0.08;
            fired.push("late_night");
        } else if h == 0 || h == 1 {
            raw += 0.04;
            fired.push("very_late_night");
        }

        let is_weekend_now = d == 0 || d == 6;
        let has_weekend_history = ctx
            .history
            .transactions
            .iter()
            .any(|t| matches!(t.timestamp.weekday().num_days_from_sunday(), 0 | 6));
        if ctx.history.total_transactions >= 50 && !has_weekend_history && is_weekend_now {
            raw += 0.08;
            fired.push("weekend_burst");
        }

        if HOLIDAYS.contains(&(ctx.event.timestamp.month(), ctx.event.timestamp.day())) {
            raw += 0.04;
            fired.push("holiday");
        }

        if (1..=5).contains(&h) {
            let recent_count = ctx
                .history
                .transactions
                .iter()
                .filter(|t| (ctx.now - t.timestamp).num_minutes() < 60)
                .count();
            if recent_count >= 3 {
                raw += 0.10;
                fired.push("activity_burst_unusual_hour");
            }
        }

        raw = raw.min(self.config.rawscore_cap);
        let mut details = HashMap::new();
        details.insert("rules_fired".to_string(), serde_json::json!(fired));
        details.insert("hour".to_string(), serde_json::json!(h));
        details.insert("day_of_week".to_string(), serde_json::json!(d));

        RiskFactor::new(Method::Time, raw, self.weight, time_reason(raw))
            .with_detail("component", details)
    }
}

fn derive_preferences(ctx: &AnalysisContext) -> (HashSet<u32>, HashSet<u32>) {
    if ctx.history.total_transactions < MIN_HISTORY_FOR_PATTERN || ctx.history.transactions.is_empty() {
        return (HashSet::new(), HashSet::new());
    }

    let total = ctx.history.transactions.len() as f64;
    let mut hour_counts = HashMap::new();
    let mut day_counts = HashMap::new();
    for t in &ctx.history.transactions {
        *hour_counts.entry(t.timestamp.hour()).or_insert(0u32) += 1;
        *day_counts
            .entry(t.timestamp.weekday().num_days_from_sunday())
            .or_insert(0u32) += 1;
    }

    let preferred_hours = hour_counts
        .into_iter()
        .filter(|(_, count)| *count as f64 / total >= HOUR_SHARE_THRESHOLD)
        .map(|(h, _)| h)
        .collect();
    let preferred_days = day_counts
        .into_iter()
        .filter(|(_, count)| *count as f64 / total >= DAY_SHARE_THRESHOLD)
        .map(|(d, _)| d)
        .collect();

    (preferred_hours, preferred_days)
}

fn circular_distance(h: u32, preferred: &HashSet<u32>) -> u32 {
    preferred
        .iter()
        .map(|p| {
            let diff = (h as i32 - *p as i32).unsigned_abs();
            diff.min(24 - diff)
        })
        .min()
        .unwrap_or(24)
}

fn time_reason(raw: f64) -> String {
    if raw <= 0.0 {
        "Transaction timing is consistent with user patterns".to_string()
    } else {
        format!("Timing anomaly detected (raw score {:.2})", raw)
    }
}
