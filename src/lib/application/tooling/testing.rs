//! In-memory [`ToolSession`] used by unit tests.

use super::content::{CallOutcome, ContentBlock};
use super::error::ToolInvokeError;
use super::interface::{ServerToolInfo, ToolSession};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub(crate) type CallLog = Arc<Mutex<Vec<(String, Value)>>>;

#[derive(Clone)]
pub(crate) struct StubSession {
    name: String,
    tools: Vec<ServerToolInfo>,
    list_delay: Option<Duration>,
    fail_list: bool,
    fail_calls: bool,
    outcome: Option<CallOutcome>,
    call_delays: HashMap<String, Duration>,
    calls: CallLog,
    listings: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl StubSession {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            list_delay: None,
            fail_list: false,
            fail_calls: false,
            outcome: None,
            call_delays: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            listings: Arc::new(AtomicUsize::new(0)),
            shutdowns: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn with_tools(mut self, names: &[&str]) -> Self {
        self.tools = names
            .iter()
            .map(|name| ServerToolInfo {
                name: name.to_string(),
                description: Some(format!("{name} from {}", self.name)),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": { "text": { "type": "string" } }
                })),
            })
            .collect();
        self
    }

    pub(crate) fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub(crate) fn with_call_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.call_delays.insert(tool.to_string(), delay);
        self
    }

    pub(crate) fn with_outcome(mut self, outcome: CallOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub(crate) fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub(crate) fn failing_calls(mut self) -> Self {
        self.fail_calls = true;
        self
    }

    pub(crate) fn calls(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub(crate) fn list_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.listings)
    }

    pub(crate) fn shutdown_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.shutdowns)
    }
}

#[async_trait]
impl ToolSession for StubSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ServerToolInfo>, ToolInvokeError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_list {
            return Err(ToolInvokeError::Terminated {
                server: self.name.clone(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<CallOutcome, ToolInvokeError> {
        self.calls
            .lock()
            .await
            .push((tool.to_string(), arguments.clone()));
        if let Some(delay) = self.call_delays.get(tool) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_calls {
            return Err(ToolInvokeError::Transport {
                server: self.name.clone(),
                message: "broken pipe".to_string(),
            });
        }
        if let Some(outcome) = &self.outcome {
            return Ok(outcome.clone());
        }
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{tool} ok"));
        Ok(CallOutcome {
            content: vec![ContentBlock::Text(text)],
            is_error: false,
        })
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
