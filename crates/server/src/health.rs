use std::path::{Path, PathBuf};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use cardbot_core::kb::KnowledgeBase;
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    kb_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub knowledge_base: HealthCheck,
    pub checked_at: String,
}

pub fn router(kb_path: PathBuf) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { kb_path })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let knowledge_base = knowledge_base_check(&state.kb_path);
    let ready = knowledge_base.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "cardbot-server runtime initialized".to_string(),
        },
        knowledge_base,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn knowledge_base_check(kb_path: &Path) -> HealthCheck {
    // The store treats a missing source as an empty store; health reports it
    // as degraded so operators notice while the assistant keeps answering.
    let store = KnowledgeBase::load(kb_path);
    if store.is_empty() {
        HealthCheck {
            status: "degraded",
            detail: format!("knowledge source `{}` is missing or empty", kb_path.display()),
        }
    } else {
        HealthCheck { status: "ready", detail: format!("{} knowledge records loaded", store.len()) }
    }
}
