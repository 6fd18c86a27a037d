pub mod analysis;
pub mod blocklist;
pub mod event;
pub mod history;
pub mod idempotency;
pub mod velocity;

pub use analysis::{AnalysisStatus, Confidence, Decision, FraudAnalysis, Method, RiskFactor};
pub use blocklist::{BlocklistEntry, BlocklistType};
pub use event::{DeviceInfo, GeoInfo, TransactionEvent, TransferPayload};
pub use history::{HistoricalTransaction, UserHistory};
pub use idempotency::IdempotencyMarker;
pub use velocity::{VelocityCounters, Window};
