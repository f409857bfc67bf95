use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MCP server '{server}' did not finish the handshake within {timeout:?}")]
    HandshakeTimeout { server: String, timeout: Duration },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("MCP server '{server}' is not initialized")]
    NotInitialized { server: String },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
    #[error("MCP server '{server}' did not answer within {timeout:?}")]
    Timeout { server: String, timeout: Duration },
    #[error("MCP server '{server}' returned malformed content: {reason}")]
    Malformed { server: String, reason: String },
}

impl ToolInvokeError {
    pub fn server(&self) -> &str {
        match self {
            ToolInvokeError::Spawn { server, .. }
            | ToolInvokeError::HandshakeTimeout { server, .. }
            | ToolInvokeError::Transport { server, .. }
            | ToolInvokeError::InvalidJson { server, .. }
            | ToolInvokeError::Rpc { server, .. }
            | ToolInvokeError::NotInitialized { server }
            | ToolInvokeError::Terminated { server }
            | ToolInvokeError::Cancelled { server }
            | ToolInvokeError::Timeout { server, .. }
            | ToolInvokeError::Malformed { server, .. } => server,
        }
    }
}
