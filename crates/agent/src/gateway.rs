//! Model-reply interpretation.
//!
//! The gateway owns the graceful-degradation contract: whatever the
//! generation service does (transport failure, malformed JSON, free text),
//! `generate` resolves to a `ModelReply`. Nothing above this boundary raises.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::llm::LlmClient;

/// Generic answer used whenever the service call or reply parsing fails.
pub const FALLBACK_ANSWER: &str = "Sorry, something went wrong.";

/// Interpreted model output: exactly one action intent or free text, never
/// both, never neither.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelReply {
    Action { name: String, params: Map<String, Value> },
    Info { answer: String },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawReply {
    Action { action: String, params: Map<String, Value> },
}

fn looks_like_action(trimmed: &str) -> bool {
    trimmed.starts_with('{')
        && (trimmed.contains(r#""type": "action""#) || trimmed.contains(r#""type":"action""#))
}

/// Interpret raw model text.
///
/// A reply that announces itself as an action (leading `{` plus the
/// `"type": "action"` marker) must strict-parse in full; incomplete or
/// malformed action JSON degrades to the generic failure answer rather than
/// an error. Anything else is passed through as free text.
pub fn parse_model_reply(raw: &str) -> ModelReply {
    let trimmed = raw.trim();

    if looks_like_action(trimmed) {
        return match serde_json::from_str::<RawReply>(trimmed) {
            Ok(RawReply::Action { action, params }) => ModelReply::Action { name: action, params },
            Err(error) => {
                warn!(
                    event_name = "gateway.reply.malformed_action",
                    error = %error,
                    "model announced an action but the reply did not parse"
                );
                ModelReply::Info { answer: FALLBACK_ANSWER.to_string() }
            }
        };
    }

    ModelReply::Info { answer: trimmed.to_string() }
}

pub struct LlmGateway {
    client: Arc<dyn LlmClient>,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Single call, no retry. Always resolves: service failures become the
    /// generic `Info` fallback and are logged, never surfaced.
    pub async fn generate(&self, prompt: &str) -> ModelReply {
        match self.client.complete(prompt).await {
            Ok(raw) => parse_model_reply(&raw),
            Err(error) => {
                warn!(
                    event_name = "gateway.complete.failed",
                    error = %error,
                    "generation service call failed, degrading to fallback answer"
                );
                ModelReply::Info { answer: FALLBACK_ANSWER.to_string() }
            }
        }
    }
}
