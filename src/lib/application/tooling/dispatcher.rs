use super::error::ToolInvokeError;
use super::registry::ToolCatalog;
use crate::types::{ChatMessage, ToolCall};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of one tool call, always present even when the call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub content: String,
    pub success: bool,
}

impl ToolResult {
    fn ok(call: &ToolCall, content: String) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            success: true,
        }
    }

    fn error(call: &ToolCall, content: String) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            success: false,
        }
    }

    pub fn into_message(self) -> ChatMessage {
        ChatMessage::tool_result(self.call_id, self.name, self.content)
    }
}

pub fn not_found_message(tool: &str) -> String {
    format!("Error: Tool {tool} not found on any connected server.")
}

/// Result recorded for a call whose turn was dropped before it answered.
pub fn cancelled_message(call_id: &str) -> String {
    format!("Error: Tool call {call_id} was cancelled before it returned.")
}

/// Routes tool calls to the session that owns the tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    call_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(call_timeout: Option<Duration>) -> Self {
        Self { call_timeout }
    }

    /// Run one call against `catalog`. Never fails: every problem is turned
    /// into an error result the model can read.
    pub async fn invoke(&self, catalog: &ToolCatalog, call: &ToolCall) -> ToolResult {
        let Some(entry) = catalog.get(&call.name) else {
            warn!(tool = %call.name, call_id = %call.id, "Model requested an unknown tool");
            return ToolResult::error(call, not_found_message(&call.name));
        };

        info!(tool = %call.name, server = %entry.server(), call_id = %call.id, "Calling tool");
        let invocation = entry
            .session
            .call_tool(&call.name, call.arguments.clone());
        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(result) => result,
                Err(_) => Err(ToolInvokeError::Timeout {
                    server: entry.server().to_string(),
                    timeout: limit,
                }),
            },
            None => invocation.await,
        };

        match outcome {
            Ok(outcome) => {
                let text = outcome.text();
                debug!(
                    tool = %call.name,
                    preview = %preview(&text),
                    is_error = outcome.is_error,
                    "Tool returned"
                );
                if outcome.is_error {
                    ToolResult::error(call, format!("Error: {text}"))
                } else {
                    ToolResult::ok(call, text)
                }
            }
            Err(err) => {
                warn!(tool = %call.name, server = %entry.server(), %err, "Tool execution failed");
                ToolResult::error(call, format!("Error: Tool {} failed: {err}", call.name))
            }
        }
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 100;
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
