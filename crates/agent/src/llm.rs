use std::time::Duration;

use async_trait::async_trait;
use cardbot_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/// One-shot completion against the generation service. No streaming, no
/// retry; the configured timeout bounds the call.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("llm service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm service returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// HTTP client covering the supported providers with their native request
/// shapes.
pub struct HttpLlmClient {
    client: reqwest::Client,
    provider: LlmProvider,
    api_key: Option<SecretString>,
    base_url: Option<String>,
    model: String,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            client,
            provider: config.provider,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }

    fn base_url(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    fn api_key(&self) -> &str {
        // Config validation guarantees a key for the cloud providers.
        self.api_key.as_ref().map(|key| key.expose_secret()).unwrap_or_default()
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url(OPENAI_DEFAULT_BASE_URL));
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let payload = self
            .post_json(self.client.post(url).bearer_auth(self.api_key()), &body)
            .await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse("missing choices[0].message.content".into()))
    }

    async fn complete_anthropic(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/messages", self.base_url(ANTHROPIC_DEFAULT_BASE_URL));
        let body = json!({
            "model": self.model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
        });

        let request = self
            .client
            .post(url)
            .header("x-api-key", self.api_key())
            .header("anthropic-version", ANTHROPIC_VERSION);
        let payload = self.post_json(request, &body).await?;
        payload["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse("missing content[0].text".into()))
    }

    async fn complete_ollama(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url(""));
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let payload = self.post_json(self.client.post(url), &body).await?;
        payload["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedResponse("missing response field".into()))
    }

    async fn post_json(
        &self,
        request: reqwest::RequestBuilder,
        body: &Value,
    ) -> Result<Value, LlmError> {
        let response = request.json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match self.provider {
            LlmProvider::OpenAi => self.complete_openai(prompt).await,
            LlmProvider::Anthropic => self.complete_anthropic(prompt).await,
            LlmProvider::Ollama => self.complete_ollama(prompt).await,
        }
    }
}
