//! Message adapters - convert between domain messages and the Ollama wire format

use crate::types::{ChatMessage, MessageRole, ToolCall, ToolSpec};
use serde_json::{Map as JsonMap, Value, json};
use uuid::Uuid;

/// Adapter for converting messages to and from the Ollama chat API
pub struct MessageAdapter;

impl MessageAdapter {
    /// Convert messages to Ollama format
    /// Returns: [{"role": "...", "content": "...", ...}]
    pub fn to_ollama_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages.iter().map(Self::message_to_ollama).collect()
    }

    fn message_to_ollama(message: &ChatMessage) -> Value {
        let mut map = JsonMap::new();
        map.insert("role".into(), Value::from(message.role.as_str()));
        map.insert("content".into(), Value::from(message.content.clone()));

        if message.role == MessageRole::Assistant && message.has_tool_calls() {
            let calls = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.arguments,
                        }
                    })
                })
                .collect();
            map.insert("tool_calls".into(), Value::Array(calls));
        }

        if message.role == MessageRole::Tool {
            if let Some(name) = &message.tool_name {
                map.insert("tool_name".into(), Value::from(name.clone()));
            }
            if let Some(id) = &message.tool_call_id {
                map.insert("tool_call_id".into(), Value::from(id.clone()));
            }
        }

        Value::Object(map)
    }

    /// Convert the tool catalog to function declarations
    pub fn tools_to_ollama(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect()
    }

    /// Parse one `tool_calls` entry.
    ///
    /// Arguments may arrive as an object or as a JSON-encoded string; a
    /// missing id is replaced by a generated one.
    pub fn parse_tool_call(raw: &Value) -> Result<ToolCall, String> {
        let function = raw
            .get("function")
            .ok_or_else(|| "tool call without 'function'".to_string())?;
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| "tool call without function name".to_string())?;

        let arguments = match function.get("arguments") {
            None | Some(Value::Null) => Value::Object(JsonMap::new()),
            Some(Value::String(encoded)) if encoded.trim().is_empty() => {
                Value::Object(JsonMap::new())
            }
            Some(Value::String(encoded)) => serde_json::from_str(encoded)
                .map_err(|err| format!("arguments for '{name}' are not valid JSON: {err}"))?,
            Some(other) => other.clone(),
        };

        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple()));

        Ok(ToolCall::new(id, name, arguments))
    }
}
