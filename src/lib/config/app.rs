use super::defaults::{
    DEFAULT_INIT_TIMEOUT, DEFAULT_LIST_TIMEOUT, DEFAULT_MODEL, DEFAULT_OLLAMA_ENDPOINT,
};
use super::error::ConfigError;
use super::server::ServerConfig;
use std::path::Path;
use std::time::Duration;

/// Application configuration loaded from mcp_config.json (or a TOML file)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: String,
    pub endpoint: String,
    pub system_prompt: Option<String>,
    pub list_timeout: Duration,
    /// `None` leaves tool calls unbounded.
    pub call_timeout: Option<Duration>,
    pub init_timeout: Duration,
    pub servers: Vec<ServerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_OLLAMA_ENDPOINT.to_string(),
            system_prompt: None,
            list_timeout: DEFAULT_LIST_TIMEOUT,
            call_timeout: None,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            servers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a file path (or default path if None)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        super::loader::load_config(path)
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }
}
