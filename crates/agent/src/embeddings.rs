use std::time::Duration;

use async_trait::async_trait;
use cardbot_core::config::EmbeddingConfig;
use cardbot_core::kb::vector::{EmbeddingClient, EmbeddingError};
use serde_json::{json, Value};

const EMBEDDING_TIMEOUT_SECS: u64 = 30;

/// HTTP embedding backend (Ollama embeddings API shape). One request per
/// input text; the index build batches at startup, queries send one.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpEmbeddingClient {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMBEDDING_TIMEOUT_SECS))
            .build()
            .map_err(|error| EmbeddingError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = json!({ "model": self.model, "prompt": text });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|error| EmbeddingError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbeddingError::Transport(format!(
                "embedding backend returned status {status}"
            )));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|error| EmbeddingError::MalformedResponse(error.to_string()))?;

        payload["embedding"]
            .as_array()
            .map(|values| values.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
            .filter(|vector: &Vec<f32>| !vector.is_empty())
            .ok_or_else(|| EmbeddingError::MalformedResponse("missing embedding field".into()))
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await?);
        }
        Ok(vectors)
    }
}
