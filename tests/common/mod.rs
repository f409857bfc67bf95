// Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use mcp_agent::config::ServerConfig;
use mcp_agent::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use mcp_agent::types::{ChatMessage, ToolCall};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Descriptor for the bundled echo server built alongside the tests.
pub fn echo_server(name: &str) -> ServerConfig {
    ServerConfig::new(name, env!("CARGO_BIN_EXE_mcp-echo-server"))
}

pub fn echo_call(id: &str, text: &str) -> ToolCall {
    ToolCall::new(id, "echo", json!({ "text": text }))
}

/// Replays canned assistant messages and records every request.
#[derive(Clone)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<Vec<ChatMessage>>>,
    recordings: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ChatMessage>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.recordings.lock().await.push(request);
        let mut responses = self.responses.lock().await;
        if responses.is_empty() {
            return Err(ModelError::invalid_response("scripted", "script exhausted"));
        }
        Ok(ModelResponse::new(responses.remove(0)))
    }
}
