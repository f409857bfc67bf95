use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse JSON config from {path:?}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse TOML config from {path:?}: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("server entry with an empty name in configuration")]
    EmptyName,

    #[error("server '{server}' is missing required field 'command'")]
    EmptyCommand { server: String },

    #[error("server '{server}' is defined more than once")]
    DuplicateServer { server: String },

    #[error("server '{server}' has an invalid definition: {reason}")]
    InvalidServer { server: String, reason: String },
}
