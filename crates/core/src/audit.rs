use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

/// One record per action dispatch, created before the action runs and emitted
/// regardless of outcome. Not persisted beyond the sink.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub record_id: String,
    pub action: String,
    pub params: Value,
    pub outcome: AuditOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(action: impl Into<String>, params: Value, outcome: AuditOutcome) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            action: action.into(),
            params,
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, record: AuditRecord);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl InMemoryAuditSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, record: AuditRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

/// Production sink: structured log line per dispatch.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, record: AuditRecord) {
        tracing::info!(
            event_name = "actions.audit",
            record_id = %record.record_id,
            action = %record.action,
            params = %record.params,
            outcome = ?record.outcome,
            recorded_at = %record.recorded_at.to_rfc3339(),
            "action dispatch audited"
        );
    }
}
