//! Model traits

use super::types::{ModelError, ModelRequest, ModelResponse};
use async_trait::async_trait;

/// Trait for model provider implementations
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Send the transcript and tool catalog, receive one assistant message
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
