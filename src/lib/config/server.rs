use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

/// Value of an environment override for a server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Literal(String),
    /// Taken from the agent's own environment when the server is launched.
    Ambient(String),
}

impl EnvValue {
    /// `$NAME` refers to an ambient variable, anything else is literal.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('$') {
            Some(name) if !name.is_empty() => EnvValue::Ambient(name.to_string()),
            _ => EnvValue::Literal(raw.to_string()),
        }
    }

    /// Unset ambient variables resolve to an empty string.
    pub fn resolve(&self) -> String {
        match self {
            EnvValue::Literal(value) => value.clone(),
            EnvValue::Ambient(name) => env::var(name).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, EnvValue>,
    pub workdir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            workdir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: &str) -> Self {
        self.env.insert(key.into(), EnvValue::parse(value));
        self
    }

    /// Overrides to apply on top of the inherited process environment.
    pub fn resolved_env(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(key, value)| (key.clone(), value.resolve()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawServer {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, alias = "cwd")]
    pub workdir: Option<String>,
}

impl RawServer {
    pub(crate) fn into_config(self, name: String) -> ServerConfig {
        let expand = |s: &str| -> String {
            shellexpand::full(s)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| s.to_string())
        };

        let command = PathBuf::from(expand(&self.command));
        let workdir = self.workdir.map(|d| PathBuf::from(expand(&d)));
        let args = self.args.iter().map(|arg| expand(arg)).collect();
        let env = self
            .env
            .iter()
            .map(|(key, value)| (key.clone(), EnvValue::parse(value)))
            .collect();

        ServerConfig {
            name,
            command,
            args,
            env,
            workdir,
        }
    }
}
