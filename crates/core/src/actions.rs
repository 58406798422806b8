//! Action dispatch state machine.
//!
//! No state survives across invocations. Every dispatch produces exactly one
//! audit record, and every failure mode resolves to a typed `ActionResult`
//! rather than an error: callers above this boundary never see a failure they
//! cannot render directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::info;

use crate::audit::{AuditOutcome, AuditRecord, AuditSink};
use crate::config::ActionsConfig;

pub const DEFAULT_TRACKING_ID: &str = "TRK000";
pub const CARD_DELIVERY_ETA: &str = "2025-12-07";

/// Structured outcome of one action dispatch, immutable once returned.
///
/// `requires_approval` is a distinct non-error outcome: the caller must route
/// it to a step-up flow, never treat it as success or failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    Success { tx_id: String, amount: Number },
    RequiresApproval { message: String },
    InTransit { tracking_id: String, eta: String },
    Error { message: String },
}

/// Business policy applied before any simulated execution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionPolicy {
    /// Amounts strictly above this require step-up approval.
    pub approval_threshold: f64,
    pub pay_latency: Duration,
    pub track_latency: Duration,
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            approval_threshold: 100_000.0,
            pay_latency: Duration::from_millis(600),
            track_latency: Duration::from_millis(200),
        }
    }
}

impl From<&ActionsConfig> for ActionPolicy {
    fn from(config: &ActionsConfig) -> Self {
        Self {
            approval_threshold: config.approval_threshold,
            pay_latency: Duration::from_millis(config.pay_latency_ms),
            track_latency: Duration::from_millis(config.track_latency_ms),
        }
    }
}

/// Injectable delay so the simulated gateway latency is deterministic in
/// tests and real elsewhere.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Test sleeper: resolves immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelay;

#[async_trait]
impl Sleeper for NoDelay {
    async fn sleep(&self, _duration: Duration) {}
}

pub struct ActionExecutor {
    policy: ActionPolicy,
    sleeper: Arc<dyn Sleeper>,
    audit: Arc<dyn AuditSink>,
}

impl ActionExecutor {
    pub fn new(policy: ActionPolicy, sleeper: Arc<dyn Sleeper>, audit: Arc<dyn AuditSink>) -> Self {
        Self { policy, sleeper, audit }
    }

    /// Validate, gate, simulate, and answer. The audit record is emitted for
    /// every invocation regardless of outcome.
    pub async fn execute(&self, action_name: &str, params: &Map<String, Value>) -> ActionResult {
        info!(
            event_name = "actions.dispatch",
            action = action_name,
            params = %serde_json::Value::Object(params.clone()),
            "executing action"
        );

        let result = match action_name {
            "pay_bill" => self.pay_bill(params).await,
            "track_card" => self.track_card(params).await,
            _ => ActionResult::Error { message: "unknown_action".to_string() },
        };

        self.audit.emit(AuditRecord::new(
            action_name,
            Value::Object(params.clone()),
            outcome_of(&result),
        ));

        result
    }

    async fn pay_bill(&self, params: &Map<String, Value>) -> ActionResult {
        let amount = match params.get("amount") {
            None | Some(Value::Null) => {
                return ActionResult::Error { message: "missing amount".to_string() }
            }
            Some(Value::Number(amount)) => amount.clone(),
            Some(_) => {
                return ActionResult::Error { message: "amount must be a number".to_string() }
            }
        };

        // Step-up gate: strictly above the threshold is not executed.
        let numeric = amount.as_f64().unwrap_or(f64::INFINITY);
        if numeric > self.policy.approval_threshold {
            return ActionResult::RequiresApproval {
                message: "amount exceeds threshold".to_string(),
            };
        }

        self.sleeper.sleep(self.policy.pay_latency).await;
        ActionResult::Success { tx_id: next_transaction_id(), amount }
    }

    async fn track_card(&self, params: &Map<String, Value>) -> ActionResult {
        self.sleeper.sleep(self.policy.track_latency).await;

        let tracking_id = params
            .get("tracking_id")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TRACKING_ID)
            .to_string();

        ActionResult::InTransit { tracking_id, eta: CARD_DELIVERY_ETA.to_string() }
    }
}

fn outcome_of(result: &ActionResult) -> AuditOutcome {
    match result {
        ActionResult::Success { .. } | ActionResult::InTransit { .. } => AuditOutcome::Success,
        ActionResult::RequiresApproval { .. } => AuditOutcome::Rejected,
        ActionResult::Error { .. } => AuditOutcome::Failed,
    }
}

static TX_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time-derived transaction id with a process-local sequence suffix so two
/// payments in the same millisecond stay distinct.
fn next_transaction_id() -> String {
    let sequence = TX_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("TXN{}{sequence:04}", Utc::now().timestamp_millis())
}
