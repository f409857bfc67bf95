use async_trait::async_trait;
use serde_json::Value;

use super::content::CallOutcome;
use super::error::ToolInvokeError;

/// A tool as advertised by one server's `tools/list`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
}

/// A live, initialized connection to one tool server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ServerToolInfo>, ToolInvokeError>;

    async fn call_tool(&self, tool: &str, arguments: Value)
    -> Result<CallOutcome, ToolInvokeError>;

    /// Release the underlying channel. Safe to call more than once.
    async fn shutdown(&self);
}
