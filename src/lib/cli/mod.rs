use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug, Default)]
#[command(
    name = "mcp-agent",
    version,
    about = "Interactive agent that aggregates tools from multiple MCP servers"
)]
pub struct Cli {
    /// Configuration file (JSON `mcpServers` or TOML `[[servers]]`)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Model name passed to the provider
    #[arg(long)]
    pub model: Option<String>,
    /// Base URL of the Ollama server
    #[arg(long, alias = "ollama-url")]
    pub endpoint: Option<String>,
    /// Operator system prompt, prepended to the tool listing
    #[arg(long)]
    pub system: Option<String>,
    /// Seconds allowed for each server's tool listing
    #[arg(long, value_parser = parse_seconds)]
    pub list_timeout: Option<Duration>,
    /// Seconds allowed for a single tool call (unbounded when absent)
    #[arg(long, value_parser = parse_seconds)]
    pub call_timeout: Option<Duration>,
    /// Seconds allowed for a server to finish its handshake
    #[arg(long, value_parser = parse_seconds)]
    pub init_timeout: Option<Duration>,
}

impl Cli {
    /// Command-line values win over whatever the file provided.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            if config.endpoint != *endpoint {
                info!(url = %endpoint, "Overriding model endpoint based on CLI flag");
            }
            config.endpoint = endpoint.clone();
        }
        if let Some(system) = &self.system {
            config.system_prompt = Some(system.clone());
        }
        if let Some(timeout) = self.list_timeout {
            config.list_timeout = timeout;
        }
        if let Some(timeout) = self.call_timeout {
            config.call_timeout = Some(timeout);
        }
        if let Some(timeout) = self.init_timeout {
            config.init_timeout = timeout;
        }
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    if value <= 0.0 {
        return Err("timeout must be greater than zero".to_string());
    }
    Duration::try_from_secs_f64(value).map_err(|err| err.to_string())
}
