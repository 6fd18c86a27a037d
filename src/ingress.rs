//! Ordered event consumption with at-least-once retry (§5, §6). The
//! message-bus client itself is out of scope (§1); this models the
//! consumer-side contract the orchestrator needs and ships an in-memory
//! implementation for tests and local development.

use crate::domain::TransactionEvent;
use crate::error::{FraudError, FraudResult};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// One message off the wire, not yet parsed or validated.
pub struct RawMessage {
    pub partition_key: String,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait EventIngress: Send + Sync {
    /// Pull the next message, or `None` when the ingress has been closed.
    async fn next(&self) -> Option<RawMessage>;
}

/// Parses and structurally validates a raw inbound message. A parse or
/// validation failure is a poison-pill per §4.1/§7: the caller should log
/// and drop it, never re-queue.
pub fn parse_event(raw: &RawMessage) -> FraudResult<TransactionEvent> {
    let event: TransactionEvent = serde_json::from_slice(&raw.payload)
        .map_err(|e| FraudError::Validation(format!("malformed event JSON: {e}")))?;
    event
        .validate()
        .map_err(FraudError::Validation)?;
    Ok(event)
}

/// Dev/test ingress backed by an in-process channel. Events are pushed
/// with [`InMemoryIngress::send`] and partitioned by the caller; real
/// per-partition ordering is a property of the production broker, not
/// this stand-in.
pub struct InMemoryIngress {
    receiver: tokio::sync::Mutex<mpsc::Receiver<RawMessage>>,
    sender: mpsc::Sender<RawMessage>,
}

impl InMemoryIngress {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            receiver: tokio::sync::Mutex::new(receiver),
            sender,
        }
    }

    pub async fn send(&self, partition_key: impl Into<String>, payload: Vec<u8>) -> FraudResult<()> {
        self.sender
            .send(RawMessage {
                partition_key: partition_key.into(),
                payload,
            })
            .await
            .map_err(|e| FraudError::Validation(format!("ingress channel closed: {e}")))
    }
}

#[async_trait]
impl EventIngress for InMemoryIngress {
    async fn next(&self) -> Option<RawMessage> {
        self.receiver.lock().await.recv().await
    }
}

/// Runs `handler` over every message from `ingress`, dropping poison
/// pills with a warning instead of forwarding them (§4.1 failure
/// semantics). `handler` itself is expected to never fail: transient
/// errors are the orchestrator's job to degrade, not the ingress loop's.
pub async fn drain<F, Fut>(ingress: &dyn EventIngress, mut handler: F)
where
    F: FnMut(TransactionEvent, Option<String>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    while let Some(raw) = ingress.next().await {
        match parse_event(&raw) {
            Ok(event) => handler(event, Some(raw.partition_key)).await,
            Err(e) => warn!(error = %e, "dropping poison-pill event"),
        }
    }
}
