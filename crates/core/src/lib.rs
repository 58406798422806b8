//! Deterministic core for the cardbot assistant.
//!
//! Everything in this crate is decidable without network access: configuration
//! loading and validation, the knowledge base and its retrieval scoring, the
//! grounding prompt builder, the action executor state machine, and audit
//! record types. Outbound integrations (language model, embedding backend)
//! are reached only through the traits defined here and implemented in
//! `cardbot-agent`.

pub mod actions;
pub mod audit;
pub mod config;
pub mod kb;
pub mod prompt;

pub use actions::{ActionExecutor, ActionPolicy, ActionResult, NoDelay, Sleeper};
pub use audit::{AuditOutcome, AuditRecord, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use kb::vector::{EmbeddingClient, EmbeddingError, VectorIndex, VectorRetriever};
pub use kb::{KnowledgeBase, KnowledgeRecord, LexicalRetriever, Retriever};
pub use prompt::build_prompt;
