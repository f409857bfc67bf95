//! JSON-RPC 2.0 envelopes shared by the bundled stdio tool server.

pub mod types;

pub use types::{RpcError, RpcRequest, RpcResponse};
