use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cardbot_core::actions::{ActionExecutor, ActionPolicy, ActionResult, Sleeper};
use cardbot_core::audit::TracingAuditSink;
use cardbot_core::config::AppConfig;
use cardbot_core::kb::vector::{EmbeddingClient, VectorRetriever};
use cardbot_core::kb::{KnowledgeBase, KnowledgeRecord, LexicalRetriever, Retriever};
use cardbot_core::prompt::build_prompt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::embeddings::HttpEmbeddingClient;
use crate::gateway::{LlmGateway, ModelReply};
use crate::llm::{HttpLlmClient, LlmError};

/// Response envelope returned to the transport layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatResponse {
    ActionResponse { result: ActionResult },
    Info { answer: String, contexts: Vec<KnowledgeRecord> },
}

/// Production sleeper for simulated action latency.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// The orchestration loop: retrieve, ground, generate, and either execute an
/// action intent or pass the informational answer through.
pub struct AgentRuntime {
    retriever: Arc<dyn Retriever>,
    gateway: LlmGateway,
    executor: ActionExecutor,
    top_k: usize,
}

impl AgentRuntime {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        gateway: LlmGateway,
        executor: ActionExecutor,
        top_k: usize,
    ) -> Self {
        Self { retriever, gateway, executor, top_k }
    }

    /// Compose the runtime from configuration. Retriever selection happens
    /// here, once per process: the embedding backend is probed and, when
    /// unreachable or disabled, the lexical retriever takes over
    /// transparently. Cloud providers without credentials have already been
    /// rejected by config validation.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ComposeError> {
        let store = KnowledgeBase::load(&config.kb.path);
        info!(
            event_name = "runtime.kb.loaded",
            path = %config.kb.path.display(),
            records = store.len(),
            "knowledge base loaded"
        );

        let retriever = select_retriever(config, store).await;
        let llm_client = HttpLlmClient::from_config(&config.llm)?;
        let executor = ActionExecutor::new(
            ActionPolicy::from(&config.actions),
            Arc::new(TokioSleeper),
            Arc::new(TracingAuditSink),
        );

        Ok(Self::new(retriever, LlmGateway::new(Arc::new(llm_client)), executor, config.kb.top_k))
    }

    pub async fn handle_text(&self, user_id: &str, text: &str) -> ChatResponse {
        let contexts = self.retriever.get_relevant(text, self.top_k).await;
        let prompt = build_prompt(text, &contexts);

        match self.gateway.generate(&prompt).await {
            ModelReply::Action { name, params } => {
                info!(
                    event_name = "runtime.reply.action_intent",
                    user_id = user_id,
                    action = %name,
                    "model proposed an action intent"
                );
                let result = self.executor.execute(&name, &params).await;
                ChatResponse::ActionResponse { result }
            }
            ModelReply::Info { answer } => {
                info!(
                    event_name = "runtime.reply.info",
                    user_id = user_id,
                    contexts = contexts.len(),
                    "answering with grounded information"
                );
                ChatResponse::Info { answer, contexts }
            }
        }
    }
}

async fn select_retriever(config: &AppConfig, store: KnowledgeBase) -> Arc<dyn Retriever> {
    if !config.embedding.enabled {
        info!(
            event_name = "runtime.retriever.lexical_selected",
            reason = "embedding disabled",
            "using lexical retriever"
        );
        return Arc::new(LexicalRetriever::new(store));
    }

    let client = match HttpEmbeddingClient::from_config(&config.embedding) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            warn!(
                event_name = "runtime.retriever.fallback_lexical",
                error = %error,
                "embedding client construction failed, falling back to lexical retriever"
            );
            return Arc::new(LexicalRetriever::new(store));
        }
    };

    // One readiness probe; availability is decided at startup, not per query.
    if let Err(error) = client.embed(&["readiness probe".to_string()]).await {
        warn!(
            event_name = "runtime.retriever.fallback_lexical",
            error = %error,
            "embedding backend unavailable, falling back to lexical retriever"
        );
        return Arc::new(LexicalRetriever::new(store));
    }

    match VectorRetriever::build(store.clone(), client, &config.kb.index_path).await {
        Ok(retriever) => {
            info!(
                event_name = "runtime.retriever.vector_selected",
                index_path = %config.kb.index_path.display(),
                "using vector retriever"
            );
            Arc::new(retriever)
        }
        Err(error) => {
            warn!(
                event_name = "runtime.retriever.fallback_lexical",
                error = %error,
                "vector index build failed, falling back to lexical retriever"
            );
            Arc::new(LexicalRetriever::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use cardbot_core::actions::{ActionExecutor, ActionPolicy, NoDelay};
    use cardbot_core::audit::InMemoryAuditSink;
    use cardbot_core::kb::{KnowledgeBase, KnowledgeRecord, LexicalRetriever};
    use serde_json::json;

    use super::{AgentRuntime, ChatResponse};
    use crate::gateway::LlmGateway;
    use crate::llm::{LlmClient, LlmError};

    struct ScriptedLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.reply.clone())
        }
    }

    fn store_fixture() -> KnowledgeBase {
        KnowledgeBase::new(vec![KnowledgeRecord {
            q: "How do I pay my bill?".to_string(),
            answer: "Use the pay_bill action.".to_string(),
        }])
    }

    fn runtime_with_reply(reply: &str, sink: InMemoryAuditSink) -> AgentRuntime {
        let executor =
            ActionExecutor::new(ActionPolicy::default(), Arc::new(NoDelay), Arc::new(sink));
        AgentRuntime::new(
            Arc::new(LexicalRetriever::new(store_fixture())),
            LlmGateway::new(Arc::new(ScriptedLlm { reply: reply.to_string() })),
            executor,
            3,
        )
    }

    #[tokio::test]
    async fn action_intent_is_executed_end_to_end() {
        let sink = InMemoryAuditSink::default();
        let runtime = runtime_with_reply(
            r#"{"type": "action", "action": "pay_bill", "params": {"amount": 5000}}"#,
            sink.clone(),
        );

        let response = runtime.handle_text("demo", "I want to pay my bill").await;
        let envelope = serde_json::to_value(&response).expect("serialize envelope");

        assert_eq!(envelope["type"], "action_response");
        assert_eq!(envelope["result"]["status"], "success");
        assert_eq!(envelope["result"]["amount"], json!(5000));
        let tx_id = envelope["result"]["tx_id"].as_str().expect("tx_id");
        assert!(tx_id.starts_with("TXN"));

        assert_eq!(sink.records().len(), 1, "the dispatch should be audited");
    }

    #[tokio::test]
    async fn info_reply_echoes_answer_and_contexts() {
        let runtime =
            runtime_with_reply("Your bill is due on the 5th.", InMemoryAuditSink::default());

        let response = runtime.handle_text("demo", "when is my bill due").await;
        match response {
            ChatResponse::Info { answer, contexts } => {
                assert_eq!(answer, "Your bill is due on the 5th.");
                assert_eq!(contexts.len(), 1);
                assert_eq!(contexts[0].q, "How do I pay my bill?");
            }
            other => panic!("expected info envelope, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn info_envelope_serializes_with_type_tag() {
        let runtime = runtime_with_reply("plain answer", InMemoryAuditSink::default());
        let response = runtime.handle_text("demo", "hello").await;
        let envelope = serde_json::to_value(&response).expect("serialize envelope");

        assert_eq!(envelope["type"], "info");
        assert_eq!(envelope["answer"], "plain answer");
        assert!(envelope["contexts"].is_array());
    }
}
