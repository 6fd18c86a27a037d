//! Append-only persistence for completed [`FraudAnalysis`] records (§4.1
//! step 7). One row per transaction: a unique constraint on
//! `transaction_id` makes a duplicate persist attempt a no-op rather than
//! a second row, which backstops the idempotency marker on redelivery.

#[cfg(test)]
use crate::domain::{Method, RiskFactor};
use crate::domain::{AnalysisStatus, Confidence, Decision, FraudAnalysis};
use crate::error::{FraudError, FraudResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS fraud_analyses (
    analysis_id TEXT PRIMARY KEY,
    transaction_id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    final_score REAL NOT NULL,
    decision TEXT NOT NULL,
    confidence TEXT NOT NULL,
    status TEXT NOT NULL,
    factors_json TEXT NOT NULL,
    model_version TEXT NOT NULL,
    analysis_time_ms INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    requires_manual_review INTEGER NOT NULL,
    component_scores_json TEXT NOT NULL,
    correlation_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_fraud_analyses_user
    ON fraud_analyses(user_id, timestamp DESC);

CREATE INDEX IF NOT EXISTS idx_fraud_analyses_decision
    ON fraud_analyses(decision, timestamp DESC);
"#;

pub struct AnalysisStore {
    conn: Arc<Mutex<Connection>>,
}

impl AnalysisStore {
    pub fn open(db_path: &str) -> FraudResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)
            .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fraud_analyses", [], |r| r.get(0))
            .unwrap_or(0);
        info!(analyses = count, "analysis store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn persist(&self, analysis: &FraudAnalysis) -> FraudResult<()> {
        let conn = self.conn.clone();
        let analysis = analysis.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            conn.execute(
                "INSERT OR IGNORE INTO fraud_analyses \
                 (analysis_id, transaction_id, user_id, final_score, decision, confidence, \
                  status, factors_json, model_version, analysis_time_ms, timestamp, \
                  requires_manual_review, component_scores_json, correlation_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    analysis.analysis_id.to_string(),
                    analysis.transaction_id.to_string(),
                    analysis.user_id,
                    analysis.final_score,
                    decision_str(analysis.decision),
                    confidence_str(analysis.confidence),
                    status_str(analysis.status),
                    serde_json::to_string(&analysis.factors).unwrap_or_default(),
                    analysis.model_version,
                    analysis.analysis_time_ms as i64,
                    analysis.timestamp.to_rfc3339(),
                    analysis.requires_manual_review as i64,
                    serde_json::to_string(&analysis.component_scores).unwrap_or_default(),
                    analysis.correlation_id,
                ],
            )
        })
        .await
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?;
        Ok(())
    }

    pub async fn get_by_transaction(
        &self,
        transaction_id: Uuid,
    ) -> FraudResult<Option<FraudAnalysis>> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> rusqlite::Result<Option<FraudAnalysis>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT analysis_id, transaction_id, user_id, final_score, decision, confidence, \
                        status, factors_json, model_version, analysis_time_ms, timestamp, \
                        requires_manual_review, component_scores_json, correlation_id \
                 FROM fraud_analyses WHERE transaction_id = ?1",
            )?;
            stmt.query_row(params![transaction_id.to_string()], row_to_analysis)
                .ok()
                .transpose()
        })
        .await
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))
    }

    pub async fn recent_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> FraudResult<Vec<FraudAnalysis>> {
        let conn = self.conn.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || -> rusqlite::Result<Vec<FraudAnalysis>> {
            let conn = conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT analysis_id, transaction_id, user_id, final_score, decision, confidence, \
                        status, factors_json, model_version, analysis_time_ms, timestamp, \
                        requires_manual_review, component_scores_json, correlation_id \
                 FROM fraud_analyses WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit], row_to_analysis)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })
        .await
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))?
        .map_err(|e| FraudError::DatabaseUnavailable(e.to_string()))
    }
}

fn decision_str(d: Decision) -> &'static str {
    match d {
        Decision::Approve => "APPROVE",
        Decision::Suspicious => "SUSPICIOUS",
        Decision::Reject => "REJECT",
    }
}

fn confidence_str(c: Confidence) -> &'static str {
    match c {
        Confidence::High => "HIGH",
        Confidence::Medium => "MEDIUM",
        Confidence::Low => "LOW",
    }
}

fn status_str(s: AnalysisStatus) -> &'static str {
    match s {
        AnalysisStatus::Pending => "PENDING",
        AnalysisStatus::Completed => "COMPLETED",
        AnalysisStatus::Failed => "FAILED",
        AnalysisStatus::Timeout => "TIMEOUT",
    }
}

fn row_to_analysis(row: &rusqlite::Row) -> rusqlite::Result<FraudAnalysis> {
    let factors_json: String = row.get(7)?;
    let component_scores_json: String = row.get(12)?;
    let timestamp: String = row.get(10)?;
    Ok(FraudAnalysis {
        analysis_id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
        transaction_id: Uuid::parse_str(&row.get::<_, String>(1)?).unwrap_or_default(),
        user_id: row.get(2)?,
        final_score: row.get(3)?,
        decision: parse_decision(&row.get::<_, String>(4)?),
        confidence: parse_confidence(&row.get::<_, String>(5)?),
        status: parse_status(&row.get::<_, String>(6)?),
        factors: serde_json::from_str(&factors_json).unwrap_or_default(),
        model_version: row.get(8)?,
        analysis_time_ms: row.get::<_, i64>(9)? as u64,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        requires_manual_review: row.get::<_, i64>(11)? != 0,
        component_scores: serde_json::from_str(&component_scores_json).unwrap_or_default(),
        correlation_id: row.get(13)?,
    })
}

fn parse_decision(s: &str) -> Decision {
    match s {
        "APPROVE" => Decision::Approve,
        "REJECT" => Decision::Reject,
        _ => Decision::Suspicious,
    }
}

fn parse_confidence(s: &str) -> Confidence {
    match s {
        "HIGH" => Confidence::High,
        "LOW" => Confidence::Low,
        _ => Confidence::Medium,
    }
}

fn parse_status(s: &str) -> AnalysisStatus {
    match s {
        "COMPLETED" => AnalysisStatus::Completed,
        "FAILED" => AnalysisStatus::Failed,
        "TIMEOUT" => AnalysisStatus::Timeout,
        _ => AnalysisStatus::Pending,
    }
}
