use std::sync::Arc;

use cardbot_agent::runtime::{AgentRuntime, ComposeError};
use cardbot_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("runtime composition failed: {0}")]
    Compose(#[from] ComposeError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let runtime = AgentRuntime::from_config(&config).await?;

    info!(
        event_name = "system.bootstrap.runtime_composed",
        correlation_id = "bootstrap",
        "agent runtime composed"
    );

    Ok(Application { config, runtime: Arc::new(runtime) })
}
