//! Ollama client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelProvider;
use crate::infrastructure::model::types::{ModelError, ModelRequest, ModelResponse};
use crate::types::{ChatMessage, MessageRole, ToolCall};

const PROVIDER_ID: &str = "ollama";

/// Ollama client for local LLM with native tool calling
#[derive(Clone)]
pub struct OllamaClient {
    base: HttpClientBase,
}

impl OllamaClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            base: HttpClientBase::new(PROVIDER_ID, endpoint),
        }
    }

    fn parse_message(&self, message: OllamaMessage) -> Result<ChatMessage, ModelError> {
        let role = match message.role.as_deref() {
            None => MessageRole::Assistant,
            Some(raw) => raw
                .parse()
                .map_err(|reason| ModelError::invalid_response(&self.base.id, reason))?,
        };

        let tool_calls = message
            .tool_calls
            .iter()
            .map(MessageAdapter::parse_tool_call)
            .collect::<Result<Vec<ToolCall>, String>>()
            .map_err(|reason| ModelError::invalid_response(&self.base.id, reason))?;

        let mut parsed = ChatMessage::new(role, message.content);
        parsed.tool_calls = tool_calls;
        Ok(parsed)
    }
}

#[async_trait]
impl ModelProvider for OllamaClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url("/api/chat");

        let payload = OllamaRequest {
            model: request.model.clone(),
            messages: MessageAdapter::to_ollama_format(&request.messages),
            tools: MessageAdapter::tools_to_ollama(&request.tools),
            stream: false,
        };

        info!(
            provider = self.base.id.as_str(),
            model = request.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to Ollama"
        );

        let response: OllamaResponse = self.base.post_no_auth(&url, &payload).await?;
        debug!("Received response from Ollama");

        let message = response
            .message
            .ok_or_else(|| ModelError::invalid_response(&self.base.id, "missing message"))?;

        Ok(ModelResponse::new(self.parse_message(message)?))
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<Value>,
}
