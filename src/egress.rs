//! Keyed, compressed, idempotent production of outbound events (§4.12).
//! The message-bus client itself is out of scope (§1); this defines the
//! publish contract and ships an in-memory implementation for tests.

use crate::cache::keys::sha256_hex_truncated;
use crate::config::TopicConfig;
use crate::domain::{Decision, FraudAnalysis, Method, TransactionEvent};
use crate::error::FraudResult;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::Write;
use tokio::sync::Mutex;
use tracing::warn;

pub struct PublishMessage {
    pub topic: String,
    pub key: String,
    pub headers: HashMap<String, String>,
    pub compressed_body: Vec<u8>,
}

#[async_trait]
pub trait EventEgress: Send + Sync {
    async fn publish(&self, message: PublishMessage) -> FraudResult<()>;
}

fn envelope(
    event_type: &str,
    event: &TransactionEvent,
    service: &str,
    payload: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "eventType": event_type,
        "eventId": uuid::Uuid::new_v4(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0",
        "service": service,
        "correlationId": event.correlation_id,
        "payload": payload,
    })
}

fn headers(event_type: &str, version: &str, service: &str, correlation_id: Option<&str>) -> HashMap<String, String> {
    let mut h = HashMap::new();
    h.insert("event-type".to_string(), event_type.to_string());
    h.insert("event-version".to_string(), version.to_string());
    h.insert("source-service".to_string(), service.to_string());
    if let Some(cid) = correlation_id {
        h.insert("correlation-id".to_string(), cid.to_string());
    }
    h
}

fn gzip(value: &serde_json::Value) -> Vec<u8> {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(&bytes);
    encoder.finish().unwrap_or_default()
}

/// Which analyzer's blocklist hit forced the reject, if any (§4.5/§4.6 —
/// both RECIPIENT and DEVICE can hard-reject independently).
fn blocklist_reject_method(analysis: &FraudAnalysis) -> Option<Method> {
    analysis
        .factors
        .iter()
        .find(|f| matches!(f.method, Method::Recipient | Method::Device) && f.contributed_score >= 1.0)
        .map(|f| f.method)
}

/// Builds the zero-to-three outbound messages for a completed analysis
/// (§4.12 publication table). Returns an empty vec only when called on a
/// malformed decision, which cannot happen given `Decision`'s closed set.
pub fn build_messages(
    event: &TransactionEvent,
    analysis: &FraudAnalysis,
    topics: &TopicConfig,
    service: &str,
) -> Vec<PublishMessage> {
    let key = analysis.transaction_id.to_string();
    let mut messages = Vec::new();

    match analysis.decision {
        Decision::Approve => {
            let payload = envelope("FraudAnalysisComplete", event, service, serde_json::json!(analysis));
            messages.push(PublishMessage {
                topic: topics.fraud_analysis.clone(),
                key: key.clone(),
                headers: headers("FraudAnalysisComplete", "1.0", service, event.correlation_id.as_deref()),
                compressed_body: gzip(&payload),
            });
        }
        Decision::Suspicious => {
            let suspected = envelope("FraudSuspected", event, service, serde_json::json!(analysis));
            messages.push(PublishMessage {
                topic: topics.fraud_suspected.clone(),
                key: key.clone(),
                headers: headers("FraudSuspected", "1.0", service, event.correlation_id.as_deref()),
                compressed_body: gzip(&suspected),
            });

            let priority = if analysis.final_score > 0.8 { "HIGH" } else { "MEDIUM" };
            let review = envelope(
                "ManualReviewRequired",
                event,
                service,
                serde_json::json!({ "analysis": analysis, "priority": priority }),
            );
            messages.push(PublishMessage {
                topic: topics.fraud_manual_review.clone(),
                key,
                headers: headers("ManualReviewRequired", "1.0", service, event.correlation_id.as_deref()),
                compressed_body: gzip(&review),
            });
        }
        Decision::Reject => {
            if let Some(method) = blocklist_reject_method(analysis) {
                let (hash_field, hashed) = match method {
                    Method::Device => (
                        "deviceHash",
                        sha256_hex_truncated(
                            event
                                .payload
                                .device
                                .as_ref()
                                .and_then(|d| d.fingerprint.as_deref())
                                .unwrap_or_default(),
                        ),
                    ),
                    _ => ("recipientHash", sha256_hex_truncated(&event.payload.recipient_id)),
                };
                let mut body = serde_json::Map::new();
                body.insert("analysis".to_string(), serde_json::json!(analysis));
                body.insert(hash_field.to_string(), serde_json::json!(hashed));
                let payload = envelope("BlocklistMatch", event, service, serde_json::Value::Object(body));
                messages.push(PublishMessage {
                    topic: topics.fraud_suspected.clone(),
                    key,
                    headers: headers("BlocklistMatch", "1.0", service, event.correlation_id.as_deref()),
                    compressed_body: gzip(&payload),
                });
            } else {
                let payload = envelope("FraudSuspected", event, service, serde_json::json!(analysis));
                messages.push(PublishMessage {
                    topic: topics.fraud_suspected.clone(),
                    key,
                    headers: headers("FraudSuspected", "1.0", service, event.correlation_id.as_deref()),
                    compressed_body: gzip(&payload),
                });
            }
        }
    }

    messages
}

/// In-memory egress for tests and local development: publishes never
/// fail and every message is retained for assertions.
#[derive(Default)]
pub struct InMemoryEgress {
    published: Mutex<Vec<PublishMessage>>,
}

impl InMemoryEgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published_topics(&self) -> Vec<String> {
        self.published.lock().await.iter().map(|m| m.topic.clone()).collect()
    }
}

#[async_trait]
impl EventEgress for InMemoryEgress {
    async fn publish(&self, message: PublishMessage) -> FraudResult<()> {
        self.published.lock().await.push(message);
        Ok(())
    }
}

/// Publishes every message, logging (but not failing on) individual
/// publish errors per §4.12: "If the producer is unavailable, publication
/// failures are logged and the pipeline succeeds."
pub async fn publish_all(egress: &dyn EventEgress, messages: Vec<PublishMessage>) {
    for message in messages {
        let topic = message.topic.clone();
        if let Err(e) = egress.publish(message).await {
            warn!(topic, error = %e, "publish failed, continuing (at-least-once relies on redelivery)");
        }
    }
}
