//! Derived per-user snapshot used by the amount/geographic/recipient/device/
//! time analyzers (§3 UserHistory).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const HISTORY_WINDOW: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalTransaction {
    pub amount: Decimal,
    pub recipient_id: String,
    pub country: Option<String>,
    pub device_fingerprint: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub prior_fraud_score: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserHistory {
    pub user_id: String,
    pub transactions: Vec<HistoricalTransaction>,
    pub total_transactions: u64,
    pub average_amount: Decimal,
    pub max_amount: Decimal,
    pub min_amount: Decimal,
    pub standard_deviation: f64,
    pub unique_recipients: HashSet<String>,
    pub unique_countries: HashSet<String>,
    pub unique_devices: HashSet<String>,
    pub account_created_at: DateTime<Utc>,
    pub last_transaction_at: Option<DateTime<Utc>>,
}

impl UserHistory {
    /// Zero-history default for a user the cache/DB has never seen (§4.1
    /// "Context load"). Analyzers are required to tolerate this.
    pub fn new_user(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            transactions: Vec::new(),
            total_transactions: 0,
            average_amount: Decimal::ZERO,
            max_amount: Decimal::ZERO,
            min_amount: Decimal::ZERO,
            standard_deviation: 0.0,
            unique_recipients: HashSet::new(),
            unique_countries: HashSet::new(),
            unique_devices: HashSet::new(),
            account_created_at: now,
            last_transaction_at: None,
        }
    }

    pub fn account_age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.account_created_at).num_days()
    }

    pub fn has_sufficient_history(&self) -> bool {
        self.total_transactions >= 5 && self.standard_deviation > 0.0
    }

    /// Recompute derived statistics after appending a completed analysis,
    /// keeping at most [`HISTORY_WINDOW`] entries (§3 invalidation rule).
    pub fn push(&mut self, tx: HistoricalTransaction) {
        if let Some(country) = &tx.country {
            self.unique_countries.insert(country.clone());
        }
        if let Some(fp) = &tx.device_fingerprint {
            self.unique_devices.insert(fp.clone());
        }
        self.unique_recipients.insert(tx.recipient_id.clone());
        self.last_transaction_at = Some(tx.timestamp);
        self.total_transactions += 1;

        self.transactions.push(tx);
        if self.transactions.len() > HISTORY_WINDOW {
            self.transactions.remove(0);
        }
        self.recompute_stats();
    }

    fn recompute_stats(&mut self) {
        if self.transactions.is_empty() {
            return;
        }
        let amounts: Vec<f64> = self
            .transactions
            .iter()
            .filter_map(|t| t.amount.to_string().parse::<f64>().ok())
            .collect();
        if amounts.is_empty() {
            return;
        }
        let sum: f64 = amounts.iter().sum();
        let mean = sum / amounts.len() as f64;
        let variance =
            amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / amounts.len() as f64;

        self.average_amount = Decimal::try_from(mean).unwrap_or(Decimal::ZERO);
        self.max_amount = self
            .transactions
            .iter()
            .map(|t| t.amount)
            .max()
            .unwrap_or(Decimal::ZERO);
        self.min_amount = self
            .transactions
            .iter()
            .map(|t| t.amount)
            .min()
            .unwrap_or(Decimal::ZERO);
        self.standard_deviation = variance.sqrt();
    }
}
