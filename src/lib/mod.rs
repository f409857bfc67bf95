pub mod application;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{agent, orchestrator, stdio, tooling};
pub use cli::Cli;
pub use config::{AppConfig, ServerConfig};
pub use domain::types;
pub use infrastructure::{model, rpc};

use agent::AgentError;
use model::OllamaClient;
use orchestrator::Orchestrator;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), AgentError> {
    init_tracing();
    info!("Starting mcp-agent");
    debug!(
        config = ?cli.config,
        model = ?cli.model,
        endpoint = ?cli.endpoint,
        "CLI arguments parsed"
    );

    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    info!(
        servers = config.servers.len(),
        model = %config.model,
        endpoint = %config.endpoint,
        "Configuration loaded"
    );

    let provider = Arc::new(OllamaClient::new(config.endpoint.clone()));
    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let reason =
        Orchestrator::launch(&config, provider, input, &mut output, tokio::signal::ctrl_c())
            .await?;
    info!(?reason, "Agent finished");
    Ok(())
}

/// Logs go to stderr so the interactive prompt on stdout stays readable.
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
