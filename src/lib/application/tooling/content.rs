//! Tool result content as returned by `tools/call`.

use serde_json::Value;

/// One block of a tool result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    /// Any non-text block (`image`, `audio`, `resource`, ...), kept by kind only.
    Other { kind: String },
}

impl ContentBlock {
    /// A `text` block must carry a string `text` field; other kinds are not inspected.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if kind.eq_ignore_ascii_case("text") {
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .ok_or("text block without a string 'text' field")?;
            Ok(ContentBlock::Text(text.to_string()))
        } else {
            Ok(ContentBlock::Other {
                kind: kind.to_ascii_lowercase(),
            })
        }
    }

    /// Placeholder token standing in for a non-text block, e.g. `[Image Content]`.
    pub fn placeholder(kind: &str) -> String {
        let mut chars = kind.chars();
        let label = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => "Unknown".to_string(),
        };
        format!("[{label} Content]")
    }
}

/// Parsed `tools/call` result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallOutcome {
    pub content: Vec<ContentBlock>,
    pub is_error: bool,
}

impl CallOutcome {
    /// Parse a `tools/call` result. Returns the reason when the result is not
    /// an object with a `content` array of well-formed blocks.
    pub fn from_result(result: &Value) -> Result<Self, String> {
        if !result.is_object() {
            return Err(format!("expected a result object, got {result}"));
        }
        let blocks = match result.get("content") {
            Some(Value::Array(blocks)) => blocks,
            Some(other) => return Err(format!("'content' must be an array, got {other}")),
            None => return Err("result has no 'content' field".to_string()),
        };
        let content = blocks
            .iter()
            .map(ContentBlock::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self { content, is_error })
    }

    pub fn text(&self) -> String {
        normalize(&self.content)
    }
}

/// Flatten blocks into one text blob, preserving order.
pub fn normalize(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text(text) => text.clone(),
            ContentBlock::Other { kind } => ContentBlock::placeholder(kind),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
