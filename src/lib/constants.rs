//! Application constants
//!
//! Single source of truth for paths and other constants.

/// Default configuration file path
pub const CONFIG_PATH: &str = "mcp_config.json";

/// Default environment file path
pub const ENV_PATH: &str = ".env";

/// Name of the descriptor used when no configuration file exists
pub const DEFAULT_SERVER_NAME: &str = "default";

/// Binary launched by the built-in descriptor
pub const DEFAULT_SERVER_BINARY: &str = "mcp-echo-server";

/// MCP protocol revision announced during the handshake
pub const PROTOCOL_VERSION: &str = "2025-06-18";
