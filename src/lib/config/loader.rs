use super::app::AppConfig;
use super::error::ConfigError;
use super::server::{RawServer, ServerConfig};
use crate::constants::{CONFIG_PATH, DEFAULT_SERVER_BINARY, DEFAULT_SERVER_NAME, ENV_PATH};
use dotenvy::from_filename;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, error, warn};

static ENV_LOADER: Once = Once::new();

/// JSON layout: `{"mcpServers": {"name": {...}}, ...}`
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawJsonConfig {
    #[serde(flatten)]
    common: RawCommon,
    #[serde(default)]
    mcp_servers: JsonMap<String, Value>,
}

/// TOML layout: top-level settings plus `[[servers]]` entries.
#[derive(Debug, Deserialize, Default)]
struct RawTomlConfig {
    #[serde(flatten)]
    common: RawCommon,
    /// Kept untyped so one malformed entry does not reject the whole file.
    #[serde(default)]
    servers: Vec<toml::Value>,
}

#[derive(Debug, Deserialize, Default)]
struct RawCommon {
    model: Option<String>,
    endpoint: Option<String>,
    #[serde(alias = "systemPrompt")]
    system_prompt: Option<String>,
    #[serde(alias = "listTimeoutSecs")]
    list_timeout_secs: Option<f64>,
    #[serde(alias = "callTimeoutSecs")]
    call_timeout_secs: Option<f64>,
    #[serde(alias = "initTimeoutSecs")]
    init_timeout_secs: Option<f64>,
}

/// Ensures environment variables are loaded from .env
pub fn ensure_env_loaded() {
    ENV_LOADER.call_once(|| {
        let _ = from_filename(ENV_PATH);
    });
}

/// Load and validate configuration from a file path.
///
/// A missing file at the default location is not an error: the agent falls
/// back to the bundled local server. An explicitly requested file must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    ensure_env_loaded();
    match path {
        Some(path) => read_config(path),
        None => match read_config(Path::new(CONFIG_PATH)) {
            Err(ConfigError::NotFound { path }) => {
                warn!(path = %path.display(), "Config file not found, using built-in server");
                Ok(fallback_config())
            }
            other => other,
        },
    }
}

/// Configuration used when no file is present.
pub fn fallback_config() -> AppConfig {
    AppConfig {
        servers: vec![ServerConfig::new(DEFAULT_SERVER_NAME, default_server_command())],
        ..AppConfig::default()
    }
}

/// The bundled echo server next to the running executable, or a PATH lookup.
fn default_server_command() -> PathBuf {
    let binary = format!("{DEFAULT_SERVER_BINARY}{}", env::consts::EXE_SUFFIX);
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&binary)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(binary))
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading agent configuration file");

    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        parse_toml(&content, path)
    } else {
        parse_json(&content, path)
    }
}

pub(crate) fn parse_json(content: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    let parse_err = |source| ConfigError::ParseJson {
        path: path.to_path_buf(),
        source,
    };
    let parsed: RawJsonConfig = serde_json::from_str(content).map_err(parse_err)?;

    let servers = parsed
        .mcp_servers
        .into_iter()
        .map(|(name, value)| {
            let raw = serde_json::from_value::<RawServer>(value).map_err(|err| err.to_string());
            (name, raw)
        })
        .collect();

    Ok(validate_and_build(parsed.common, servers))
}

pub(crate) fn parse_toml(content: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    let parsed: RawTomlConfig = toml::from_str(content).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;

    let servers = parsed
        .servers
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let name = value
                .get("name")
                .and_then(toml::Value::as_str)
                .unwrap_or_default()
                .to_string();
            match value.try_into::<RawServer>() {
                Ok(raw) => (name, Ok(raw)),
                Err(err) if name.trim().is_empty() => {
                    (format!("servers[{index}]"), Err(err.to_string()))
                }
                Err(err) => (name, Err(err.to_string())),
            }
        })
        .collect();

    Ok(validate_and_build(parsed.common, servers))
}

/// Build the config, skipping (and logging) every server entry that cannot
/// be launched. The remaining servers keep their declaration order.
fn validate_and_build(
    common: RawCommon,
    servers: Vec<(String, Result<RawServer, String>)>,
) -> AppConfig {
    let mut seen = HashSet::new();
    let mut built = Vec::with_capacity(servers.len());
    for (name, raw) in servers {
        match validate_server(name, raw, &mut seen) {
            Ok(server) => built.push(server),
            Err(err) => error!(error = %err, "Skipping invalid server entry"),
        }
    }

    if built.is_empty() {
        warn!("No usable servers defined in config");
    }

    let defaults = AppConfig::default();
    AppConfig {
        model: common.model.unwrap_or(defaults.model),
        endpoint: common.endpoint.unwrap_or(defaults.endpoint),
        system_prompt: common.system_prompt,
        list_timeout: common
            .list_timeout_secs
            .and_then(seconds)
            .unwrap_or(defaults.list_timeout),
        call_timeout: common.call_timeout_secs.and_then(seconds),
        init_timeout: common
            .init_timeout_secs
            .and_then(seconds)
            .unwrap_or(defaults.init_timeout),
        servers: built,
    }
}

fn validate_server(
    name: String,
    raw: Result<RawServer, String>,
    seen: &mut HashSet<String>,
) -> Result<ServerConfig, ConfigError> {
    let name = name.trim().to_string();
    let raw = raw.map_err(|reason| ConfigError::InvalidServer {
        server: name.clone(),
        reason,
    })?;
    if name.is_empty() {
        return Err(ConfigError::EmptyName);
    }
    if raw.command.trim().is_empty() {
        return Err(ConfigError::EmptyCommand { server: name });
    }
    if !seen.insert(name.clone()) {
        return Err(ConfigError::DuplicateServer { server: name });
    }
    Ok(raw.into_config(name))
}

fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok().filter(|d| !d.is_zero())
}
