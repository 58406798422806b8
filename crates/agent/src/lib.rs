//! Agent runtime - retrieval-augmented dialogue orchestration
//!
//! This crate wires the deterministic core to the outside world:
//! - `llm` - the `LlmClient` seam and HTTP clients for the supported providers
//! - `embeddings` - HTTP embedding client behind the core `EmbeddingClient` trait
//! - `gateway` - model-reply parsing and the never-fails degradation contract
//! - `runtime` - `AgentRuntime`, the retrieve -> prompt -> generate -> dispatch loop
//!
//! # Safety principle
//!
//! The model is strictly a translator. It proposes action intents; whether an
//! action runs, is gated for approval, or is rejected is decided by the
//! deterministic executor in `cardbot-core`.

pub mod embeddings;
pub mod gateway;
pub mod llm;
pub mod runtime;

pub use gateway::{parse_model_reply, LlmGateway, ModelReply, FALLBACK_ANSWER};
pub use llm::{HttpLlmClient, LlmClient, LlmError};
pub use runtime::{AgentRuntime, ChatResponse, ComposeError, TokioSleeper};
