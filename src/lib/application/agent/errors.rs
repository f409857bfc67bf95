use crate::config::ConfigError;
use crate::infrastructure::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("no tool server could be connected")]
    NoActiveSessions,
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Config(err) => format!("Configuration error: {err}"),
            AgentError::Model(err) => err.user_message(),
            AgentError::NoActiveSessions => {
                "No MCP server could be started. Check the server commands in your configuration."
                    .to_string()
            }
            AgentError::Io(err) => format!("Terminal I/O failed: {err}"),
        }
    }
}
