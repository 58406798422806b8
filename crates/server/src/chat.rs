//! Conversational HTTP surface: text chat plus the stubbed voice transcript
//! endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use cardbot_agent::runtime::{AgentRuntime, ChatResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TranscriptResponse {
    pub transcript: String,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/voice/stt", post(voice_stt))
        .with_state(ChatState { runtime })
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<Value>)> {
    if request.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({"error": "text is required"}))));
    }

    info!(
        event_name = "chat.request.received",
        user_id = %request.user_id,
        "chat request received"
    );

    let response = state.runtime.handle_text(&request.user_id, &request.text).await;
    Ok(Json(response))
}

/// Voice transcription is stubbed: the endpoint exists so clients can wire
/// against it, but it always answers with a mock transcript.
pub async fn voice_stt() -> Json<TranscriptResponse> {
    Json(TranscriptResponse { transcript: "Mock transcript".to_string() })
}
