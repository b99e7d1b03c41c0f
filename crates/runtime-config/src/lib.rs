//! Runtime configuration for the agentstream CLI.
//!
//! Read from `agentstream.toml`. Every field has a serde default so a partial or
//! empty file is valid; the pipeline crate itself never reads configuration.

use agentstream_core::Framing;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "agentstream.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration (persisted as `agentstream.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AgentStreamConfig {
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub relay: RelaySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamSettings {
    /// `ndjson` (alias `jsonl`) or `sse`.
    #[serde(default)]
    pub framing: Framing,
    /// Wall-clock ceiling for one stream, counted from its start.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Agent name for records without an `author`.
    #[serde(default = "default_agent")]
    pub default_agent: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            timeout_secs: default_timeout_secs(),
            default_agent: default_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSettings {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    /// Streaming run endpoint, relative to `url`.
    #[serde(default = "default_run_path")]
    pub run_path: String,
    /// Sent as a bearer token when non-empty.
    #[serde(default)]
    pub token: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            app_name: default_app_name(),
            user_id: default_user_id(),
            run_path: default_run_path(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelaySettings {
    /// Append a `done` event when the upstream stream ends.
    #[serde(default = "default_true")]
    pub emit_done: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            emit_done: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_agent() -> String {
    "assistant".to_string()
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_app_name() -> String {
    "agent".to_string()
}

fn default_user_id() -> String {
    "user".to_string()
}

fn default_run_path() -> String {
    "/run_sse".to_string()
}

impl AgentStreamConfig {
    /// Parse TOML text. `path` is only used for error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        apply_fallbacks(&mut config);
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Load `path` when given, otherwise `./agentstream.toml` if it exists, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new(CONFIG_FILE_NAME);
                if local.is_file() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Replace values that parse but cannot be used.
/// Returns true when any field was updated.
pub fn apply_fallbacks(config: &mut AgentStreamConfig) -> bool {
    let mut changed = false;

    if config.stream.timeout_secs == 0 {
        config.stream.timeout_secs = default_timeout_secs();
        changed = true;
    }

    if config.stream.default_agent.trim().is_empty() {
        config.stream.default_agent = default_agent();
        changed = true;
    }

    let trimmed = config.backend.url.trim_end_matches('/');
    if trimmed.len() != config.backend.url.len() {
        config.backend.url = trimmed.to_string();
        changed = true;
    }

    changed
}
