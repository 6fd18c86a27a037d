//! Authoritative blocklist entry model (§3, §4.9).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlocklistType {
    Account,
    Device,
    Ip,
    Recipient,
    Email,
    Phone,
}

impl BlocklistType {
    pub fn as_str(self) -> &'static str {
        match self {
            BlocklistType::Account => "ACCOUNT",
            BlocklistType::Device => "DEVICE",
            BlocklistType::Ip => "IP",
            BlocklistType::Recipient => "RECIPIENT",
            BlocklistType::Email => "EMAIL",
            BlocklistType::Phone => "PHONE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocklistEntry {
    pub id: Uuid,
    pub entry_type: BlocklistType,
    /// Plaintext value; may be encrypted at rest by the persistence layer.
    /// Never required for a lookup — matching is always by `value_hash`.
    pub value: String,
    pub value_hash: String,
    pub reason: String,
    pub severity: String,
    pub source: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub match_count: u64,
    pub last_match_at: Option<DateTime<Utc>>,
}

impl BlocklistEntry {
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }
}
