use cardbot_agent::AgentRuntime;
use cardbot_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

pub fn run(user_id: &str, text: &str) -> CommandResult {
    if text.trim().is_empty() {
        return CommandResult::failure("ask", "invalid_input", "text is required", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config", error.to_string(), 1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "ask",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let response = runtime.block_on(async {
        let agent = AgentRuntime::from_config(&config)
            .await
            .map_err(|error| format!("failed to compose agent runtime: {error}"))?;
        Ok::<_, String>(agent.handle_text(user_id, text).await)
    });

    match response {
        Ok(envelope) => match serde_json::to_string_pretty(&envelope) {
            Ok(json) => CommandResult { exit_code: 0, output: json },
            Err(error) => CommandResult::failure("ask", "serialization", error.to_string(), 1),
        },
        Err(error) => CommandResult::failure("ask", "compose", error, 1),
    }
}
