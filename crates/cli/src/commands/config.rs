use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cardbot_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |field: &str, env_var: Option<&str>| {
        field_source(field, env_var, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "kb.path",
        &config.kb.path.display().to_string(),
        source("kb.path", Some("CARDBOT_KB_PATH")),
    ));
    lines.push(render_line(
        "kb.index_path",
        &config.kb.index_path.display().to_string(),
        source("kb.index_path", Some("CARDBOT_KB_INDEX_PATH")),
    ));
    lines.push(render_line(
        "kb.top_k",
        &config.kb.top_k.to_string(),
        source("kb.top_k", Some("CARDBOT_KB_TOP_K")),
    ));

    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", Some("CARDBOT_LLM_PROVIDER")),
    ));
    let api_key = match &config.llm.api_key {
        Some(_) => "<redacted>",
        None => "<unset>",
    };
    lines.push(render_line("llm.api_key", api_key, source("llm.api_key", Some("CARDBOT_LLM_API_KEY"))));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        source("llm.base_url", Some("CARDBOT_LLM_BASE_URL")),
    ));
    lines.push(render_line(
        "llm.model",
        &config.llm.model,
        source("llm.model", Some("CARDBOT_LLM_MODEL")),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", Some("CARDBOT_LLM_TIMEOUT_SECS")),
    ));

    lines.push(render_line(
        "embedding.enabled",
        &config.embedding.enabled.to_string(),
        source("embedding.enabled", Some("CARDBOT_EMBEDDING_ENABLED")),
    ));
    lines.push(render_line(
        "embedding.base_url",
        &config.embedding.base_url,
        source("embedding.base_url", Some("CARDBOT_EMBEDDING_BASE_URL")),
    ));
    lines.push(render_line(
        "embedding.model",
        &config.embedding.model,
        source("embedding.model", Some("CARDBOT_EMBEDDING_MODEL")),
    ));

    lines.push(render_line(
        "actions.approval_threshold",
        &config.actions.approval_threshold.to_string(),
        source("actions.approval_threshold", Some("CARDBOT_ACTIONS_APPROVAL_THRESHOLD")),
    ));
    lines.push(render_line(
        "actions.pay_latency_ms",
        &config.actions.pay_latency_ms.to_string(),
        source("actions.pay_latency_ms", Some("CARDBOT_ACTIONS_PAY_LATENCY_MS")),
    ));
    lines.push(render_line(
        "actions.track_latency_ms",
        &config.actions.track_latency_ms.to_string(),
        source("actions.track_latency_ms", Some("CARDBOT_ACTIONS_TRACK_LATENCY_MS")),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", Some("CARDBOT_SERVER_BIND_ADDRESS")),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", Some("CARDBOT_SERVER_PORT")),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", Some("CARDBOT_LOGGING_LEVEL")),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", Some("CARDBOT_LOGGING_FORMAT")),
    ));

    lines.join("\n")
}

fn render_line(field: &str, value: &str, source: &'static str) -> String {
    format!("  {field} = {value} (source: {source})")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("cardbot.toml"), PathBuf::from("config/cardbot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &str,
    env_var: Option<&str>,
    file_doc: Option<&Value>,
    file_path: Option<&Path>,
) -> &'static str {
    if let Some(env_var) = env_var {
        if env::var(env_var).map(|value| !value.trim().is_empty()).unwrap_or(false) {
            return "env";
        }
    }

    if file_path.is_some() && file_contains_field(field, file_doc) {
        return "file";
    }

    "default"
}

fn file_contains_field(field: &str, file_doc: Option<&Value>) -> bool {
    let Some(doc) = file_doc else {
        return false;
    };

    let mut current = doc;
    for segment in field.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}
