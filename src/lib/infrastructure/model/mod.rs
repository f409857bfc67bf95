//! Model infrastructure module
//!
//! # Structure
//! - `types` - Request, Response, Error types
//! - `traits` - ModelProvider trait
//! - `adapter` - Ollama wire format conversion
//! - `clients` - HTTP client implementations

pub mod adapter;
pub mod clients;
pub mod traits;
pub mod types;

pub use clients::OllamaClient;
pub use traits::ModelProvider;
pub use types::{ModelError, ModelRequest, ModelResponse};
