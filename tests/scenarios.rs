//! End-to-end pipeline scenarios driving the real `Orchestrator` against
//! in-memory/temp-file-backed components (no mocked analyzers).

mod common;

use common::{seeded_history, EventBuilder, Harness};
use fraud_engine::cache::keys::{sha256_hex, sha256_hex_truncated};
use fraud_engine::cache::CacheStore;
use fraud_engine::domain::{AnalysisStatus, BlocklistEntry, BlocklistType, Decision};
use std::time::Duration;

#[tokio::test]
async fn normal_small_transfer_is_approved() {
    let harness = Harness::new();
    let event = EventBuilder::new("user-1", "recipient-1", 50).build();
    let transaction_id = event.payload.transaction_id;

    harness.orchestrator.process(event).await.unwrap();

    let analysis = harness
        .analysis_store
        .get_by_transaction(transaction_id)
        .await
        .unwrap()
        .expect("analysis persisted");

    assert_eq!(analysis.decision, Decision::Approve);
    assert!(!analysis.requires_manual_review);
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert!(analysis.final_score < harness.settings.thresholds.suspicious_min);

    let topics = harness.egress.published_topics().await;
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0], harness.settings.topics.fraud_analysis);
}

#[tokio::test]
async fn amount_anomaly_saturates_the_amount_analyzer() {
    let harness = Harness::new();

    // 50 prior transfers alternating 190/210 (mean 200, nonzero std dev) so
    // the statistical rules engage, then a single $9,500 transfer: well
    // past 5x the historical average, 2x the historical max, and inside
    // the $9k-$10k structuring band. Each rule alone already clears the
    // analyzer's 0.40 raw-score cap, so the capped contribution is exact
    // regardless of which individual sub-rules fire.
    let history = seeded_history("user-2", "recipient-1", "US", 200, 10, 50, 365);
    harness
        .cache
        .set_user_history("user-2", &history, harness.settings.ttl.user_history)
        .await;

    let event = EventBuilder::new("user-2", "recipient-1", 9500).build();
    let transaction_id = event.payload.transaction_id;
    harness.orchestrator.process(event).await.unwrap();

    let analysis = harness
        .analysis_store
        .get_by_transaction(transaction_id)
        .await
        .unwrap()
        .expect("analysis persisted");

    let expected_amount_contribution = harness.settings.amount.rawscore_cap * 0.25;
    let amount_score = analysis.component_scores["AMOUNT"];
    assert!(
        (amount_score - expected_amount_contribution).abs() < 1e-9,
        "expected capped amount contribution {expected_amount_contribution}, got {amount_score}"
    );

    // A clean, in-pattern transfer right after should score far lower on
    // the same axis, demonstrating the anomaly actually moved the needle.
    let quiet_event = EventBuilder::new("user-2", "recipient-1", 205).build();
    harness.cache.set_user_history("user-2", &history, harness.settings.ttl.user_history).await;
    let quiet_id = quiet_event.payload.transaction_id;
    harness.orchestrator.process(quiet_event).await.unwrap();
    let quiet_analysis = harness.analysis_store.get_by_transaction(quiet_id).await.unwrap().unwrap();
    assert!(quiet_analysis.component_scores["AMOUNT"] < amount_score);
}

#[tokio::test]
async fn impossible_travel_saturates_the_geographic_analyzer() {
    let harness = Harness::new();

    // Last known transaction was from the US less than two hours ago; this
    // one claims to originate from Japan, well inside the impossible-travel
    // window and in a country the user has never transacted from before.
    let mut history = seeded_history("user-3", "recipient-1", "US", 100, 5, 10, 200);
    history.push(fraud_engine::domain::HistoricalTransaction {
        amount: rust_decimal::Decimal::from(100),
        recipient_id: "recipient-1".to_string(),
        country: Some("US".to_string()),
        device_fingerprint: None,
        timestamp: chrono::Utc::now() - chrono::Duration::minutes(30),
        prior_fraud_score: None,
        latitude: None,
        longitude: None,
    });
    harness.cache.set_user_history("user-3", &history, harness.settings.ttl.user_history).await;

    let event = EventBuilder::new("user-3", "recipient-1", 100).country("JP").build();
    let transaction_id = event.payload.transaction_id;
    harness.orchestrator.process(event).await.unwrap();

    let analysis = harness
        .analysis_store
        .get_by_transaction(transaction_id)
        .await
        .unwrap()
        .expect("analysis persisted");

    let expected_geo_contribution = harness.settings.geographic.rawscore_cap * 0.20;
    let geo_score = analysis.component_scores["GEOGRAPHIC"];
    assert!(
        (geo_score - expected_geo_contribution).abs() < 1e-9,
        "expected capped geographic contribution {expected_geo_contribution}, got {geo_score}"
    );
}

#[tokio::test]
async fn blocklisted_recipient_forces_reject_with_manual_review() {
    let harness = Harness::new();

    harness
        .blocklist
        .add(BlocklistEntry {
            id: uuid::Uuid::new_v4(),
            entry_type: BlocklistType::Recipient,
            value: "recipient-bad".into(),
            value_hash: sha256_hex("recipient-bad"),
            reason: "reported for prior fraud".into(),
            severity: "high".into(),
            source: "manual".into(),
            is_active: true,
            expires_at: None,
            match_count: 0,
            last_match_at: None,
        })
        .await
        .unwrap();

    let event = EventBuilder::new("user-4", "recipient-bad", 40).build();
    let transaction_id = event.payload.transaction_id;
    harness.orchestrator.process(event).await.unwrap();

    let analysis = harness
        .analysis_store
        .get_by_transaction(transaction_id)
        .await
        .unwrap()
        .expect("analysis persisted");

    assert_eq!(analysis.decision, Decision::Reject);
    assert_eq!(analysis.final_score, 1.0);
    assert!(analysis.requires_manual_review);

    let topics = harness.egress.published_topics().await;
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0], harness.settings.topics.fraud_suspected);

    let entry = harness
        .blocklist
        .lookup(BlocklistType::Recipient, "recipient-bad")
        .await
        .unwrap()
        .expect("still blocklisted");
    assert!(entry.match_count >= 1);
}

#[tokio::test]
async fn blocklisted_recipient_rejects_even_when_amount_analyzer_is_quiet() {
    // The blocklist hit short-circuits the decision regardless of what the
    // other five analyzers and the ML model contribute.
    let harness = Harness::new();
    harness
        .blocklist
        .add(BlocklistEntry {
            id: uuid::Uuid::new_v4(),
            entry_type: BlocklistType::Recipient,
            value: "recipient-quiet".into(),
            value_hash: sha256_hex("recipient-quiet"),
            reason: "reported".into(),
            severity: "high".into(),
            source: "manual".into(),
            is_active: true,
            expires_at: None,
            match_count: 0,
            last_match_at: None,
        })
        .await
        .unwrap();

    let event = EventBuilder::new("user-5", "recipient-quiet", 5).build();
    let transaction_id = event.payload.transaction_id;
    harness.orchestrator.process(event).await.unwrap();

    let analysis = harness.analysis_store.get_by_transaction(transaction_id).await.unwrap().unwrap();
    assert_eq!(analysis.decision, Decision::Reject);
}

#[tokio::test]
async fn redelivery_inside_idempotency_window_is_a_no_op() {
    let harness = Harness::new();
    let event = EventBuilder::new("user-6", "recipient-1", 75).build();
    let transaction_id = event.payload.transaction_id;

    harness.orchestrator.process(event.clone()).await.unwrap();
    let after_first = harness.egress.published_topics().await;
    let rows_after_first = harness.analysis_store.recent_for_user("user-6", 10).await.unwrap();
    assert_eq!(rows_after_first.len(), 1);
    assert_eq!(after_first.len(), 1);

    // Redelivery of the exact same event (same transaction_id) within the
    // idempotency marker's TTL must not publish again or add a new row.
    harness.orchestrator.process(event).await.unwrap();
    let after_second = harness.egress.published_topics().await;
    let rows_after_second = harness.analysis_store.recent_for_user("user-6", 10).await.unwrap();

    assert_eq!(after_second.len(), after_first.len());
    assert_eq!(rows_after_second.len(), 1);
    let _ = transaction_id;
}

#[tokio::test]
async fn velocity_counter_is_monotonic_across_repeated_events() {
    let harness = Harness::new();
    for i in 0..5 {
        let event = EventBuilder::new("user-7", &format!("recipient-{i}"), 20).build();
        harness.orchestrator.process(event).await.unwrap();
    }

    let counters = harness.cache.get_velocity("user-7", fraud_engine::domain::Window::FiveMin).await;
    assert!(counters.count >= 5);
}

#[tokio::test]
async fn processing_completes_within_the_configured_deadline() {
    let harness = Harness::new();
    let event = EventBuilder::new("user-8", "recipient-1", 30).build();
    let transaction_id = event.payload.transaction_id;

    harness.orchestrator.process(event).await.unwrap();

    let analysis = harness.analysis_store.get_by_transaction(transaction_id).await.unwrap().unwrap();
    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert!(Duration::from_millis(analysis.analysis_time_ms) <= harness.settings.processing_timeout);
}

#[tokio::test]
async fn blocklist_value_is_never_cached_in_plaintext() {
    let harness = Harness::new();
    harness
        .blocklist
        .add(BlocklistEntry {
            id: uuid::Uuid::new_v4(),
            entry_type: BlocklistType::Recipient,
            value: "plaintext-sensitive-id".into(),
            value_hash: sha256_hex("plaintext-sensitive-id"),
            reason: "reported".into(),
            severity: "medium".into(),
            source: "manual".into(),
            is_active: true,
            expires_at: None,
            match_count: 0,
            last_match_at: None,
        })
        .await
        .unwrap();

    harness.blocklist.lookup(BlocklistType::Recipient, "plaintext-sensitive-id").await.unwrap();

    // The cache index is keyed by hash, never by the raw value.
    assert!(harness.cache.is_in_blocklist("RECIPIENT", "plaintext-sensitive-id").await.is_none());
    let hash = sha256_hex_truncated("plaintext-sensitive-id");
    assert_eq!(harness.cache.is_in_blocklist("RECIPIENT", &hash).await, Some(true));
}

#[tokio::test]
async fn malformed_event_is_rejected_before_reaching_the_orchestrator() {
    let mut event = EventBuilder::new("user-9", "recipient-1", 10).build();
    event.payload.amount = rust_decimal::Decimal::ZERO;
    assert!(event.validate().is_err());
}
