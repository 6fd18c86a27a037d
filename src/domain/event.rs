//! Inbound transaction event — the payload consumed from `banking.transfers.created`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    pub ip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub fingerprint: Option<String>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
    pub device_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPayload {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub source_account_id: String,
    pub destination_account_id: String,
    pub recipient_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub geographic: Option<GeoInfo>,
    pub device: Option<DeviceInfo>,
    /// Loosely-typed bag of additional fields. Parsed lazily where a
    /// specific key is consulted (§9 Design Notes).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub correlation_id: Option<String>,
    pub payload: TransferPayload,
}

impl TransactionEvent {
    /// Structural validation per §7 ("malformed event, amount<=0, missing
    /// identifiers"). Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_type != "TransactionCreated" {
            return Err(format!("unexpected eventType {}", self.event_type));
        }
        if self.payload.amount <= Decimal::ZERO {
            return Err("amount must be positive".to_string());
        }
        if self.payload.user_id.trim().is_empty() {
            return Err("missing userId".to_string());
        }
        if self.payload.source_account_id.trim().is_empty() {
            return Err("missing sourceAccountId".to_string());
        }
        if self.payload.destination_account_id.trim().is_empty() {
            return Err("missing destinationAccountId".to_string());
        }
        if self.payload.recipient_id.trim().is_empty() {
            return Err("missing recipientId".to_string());
        }
        if self.payload.currency.len() != 3 {
            return Err("currency must be an ISO-4217 code".to_string());
        }
        Ok(())
    }
}
