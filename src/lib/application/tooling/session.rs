use super::content::CallOutcome;
use super::error::ToolInvokeError;
use super::interface::{ServerToolInfo, ToolSession};
use super::process::McpProcess;
use crate::config::ServerConfig;
use crate::constants::PROTOCOL_VERSION;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on `tools/list` pages followed for one listing.
pub const MAX_LIST_PAGES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initialized,
    /// The server went away after a successful handshake.
    Failed,
}

/// An MCP server that completed the `initialize` exchange.
///
/// Only [`McpSession::connect`] creates sessions, so every value of this
/// type has been initialized.
pub struct McpSession {
    name: String,
    process: McpProcess,
    instructions: Option<String>,
}

impl McpSession {
    /// Spawn the server and run the handshake within `init_timeout`.
    ///
    /// On failure the child process is shut down before returning.
    pub async fn connect(
        config: &ServerConfig,
        init_timeout: Duration,
    ) -> Result<Self, ToolInvokeError> {
        debug!(
            server = %config.name,
            command = %config.command.display(),
            "Launching MCP server"
        );
        let process = McpProcess::spawn(config)?;

        let handshake = match tokio::time::timeout(init_timeout, handshake(&process)).await {
            Ok(result) => result,
            Err(_) => Err(ToolInvokeError::HandshakeTimeout {
                server: config.name.clone(),
                timeout: init_timeout,
            }),
        };

        match handshake {
            Ok(init) => {
                let instructions = init
                    .get("instructions")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let protocol = init
                    .get("protocolVersion")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                info!(server = %config.name, protocol, "MCP session initialized");
                Ok(Self {
                    name: config.name.clone(),
                    process,
                    instructions,
                })
            }
            Err(err) => {
                process.shutdown().await;
                Err(err)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        if self.process.is_alive() {
            SessionState::Initialized
        } else {
            SessionState::Failed
        }
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    fn ensure_usable(&self) -> Result<(), ToolInvokeError> {
        match self.state() {
            SessionState::Initialized => Ok(()),
            SessionState::Failed => Err(ToolInvokeError::NotInitialized {
                server: self.name.clone(),
            }),
        }
    }
}

async fn handshake(process: &McpProcess) -> Result<Value, ToolInvokeError> {
    let params = json!({
        "protocolVersion": PROTOCOL_VERSION,
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        },
        "capabilities": {}
    });
    let init_result = process.request("initialize", params).await?;
    if !init_result.is_object() {
        return Err(ToolInvokeError::Transport {
            server: process.server().to_string(),
            message: "initialize returned no result object".to_string(),
        });
    }
    process
        .notify("notifications/initialized", json!({}))
        .await?;
    Ok(init_result)
}

#[async_trait]
impl ToolSession for McpSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ServerToolInfo>, ToolInvokeError> {
        self.ensure_usable()?;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.process.request("tools/list", params).await?;
            tools.extend(parse_tool_list(&result));

            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|next| !next.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }

        if cursor.is_some() {
            warn!(
                server = %self.name,
                pages = MAX_LIST_PAGES,
                listed = tools.len(),
                "tools/list still paginating after page limit; listing truncated"
            );
        }
        Ok(tools)
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<CallOutcome, ToolInvokeError> {
        self.ensure_usable()?;
        let params = json!({
            "name": tool,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        let result = self.process.request("tools/call", params).await?;
        CallOutcome::from_result(&result).map_err(|reason| ToolInvokeError::Malformed {
            server: self.name.clone(),
            reason,
        })
    }

    async fn shutdown(&self) {
        self.process.shutdown().await;
    }
}

fn parse_tool_list(result: &Value) -> Vec<ServerToolInfo> {
    let Some(array) = result.get("tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(|tool| {
            let name = tool.get("name").and_then(Value::as_str)?;
            Some(ServerToolInfo {
                name: name.to_string(),
                description: tool
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                input_schema: tool.get("inputSchema").cloned(),
            })
        })
        .collect()
}
