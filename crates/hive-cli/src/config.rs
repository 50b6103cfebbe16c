//! TOML configuration file for the `hive` binary.
//!
//! spec §6 names the endpoint list shape and the policy knobs with their
//! defaults but leaves how they are loaded to the caller. Grounded in the
//! teacher crate's `gator-cli::config`: a TOML file at a documented XDG
//! path, overridable by an environment variable and a `--config` flag, with
//! `serde(default)` supplying every named default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hive_core::{OrchestratorConfig, PoolConfig};

/// Errors produced while locating, reading, or parsing a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config file at {path} declares no endpoints")]
    NoEndpoints { path: PathBuf },

    #[error("failed to write config file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// -----------------------------------------------------------------------
// Config file shape
// -----------------------------------------------------------------------

/// On-disk representation of `hive.toml`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub endpoints: Vec<EndpointEntry>,
    #[serde(default)]
    pub policy: PolicySection,
}

/// One configured endpoint, per spec §6's
/// `{provider, credential, modelName, baseURL?, priority, capabilities}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub provider: String,
    pub credential: String,
    pub model_name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Policy knobs, each defaulting to the value spec §6 names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub max_retries: u32,
    pub circuit_breaker_threshold: u32,
    pub health_check_interval_sec: u64,
    pub peer_review_enabled: bool,
    pub self_correction_enabled: bool,
    pub max_subtask_attempts: u32,
    pub execution_step_cap: u32,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            circuit_breaker_threshold: 5,
            health_check_interval_sec: 60,
            peer_review_enabled: true,
            self_correction_enabled: true,
            max_subtask_attempts: 3,
            execution_step_cap: 5,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the hive config directory: `$XDG_CONFIG_HOME/hive` or
/// `~/.config/hive`. Like `gator-cli`, this intentionally ignores
/// `dirs::config_dir()`'s platform-specific behavior on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("hive");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("hive")
}

/// Return the default path to `hive.toml`.
pub fn config_path() -> PathBuf {
    config_dir().join("hive.toml")
}

/// Resolve the config file path: `--config` flag > `HIVE_CONFIG` env var >
/// the default XDG path.
fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(p) = cli_path {
        return p.to_path_buf();
    }
    if let Ok(p) = std::env::var("HIVE_CONFIG") {
        return PathBuf::from(p);
    }
    config_path()
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize and write `config` to `path`, creating parent directories as
/// needed.
pub fn save_config(config: &ConfigFile, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready to build an `ApiPool` and
/// `Orchestrator` from.
#[derive(Debug)]
pub struct HiveConfig {
    pub endpoints: Vec<EndpointEntry>,
    pub pool: PoolConfig,
    pub orchestrator: OrchestratorConfig,
}

impl HiveConfig {
    /// Load the config file found via [`resolve_path`] and translate its
    /// policy section into [`PoolConfig`] and [`OrchestratorConfig`].
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = resolve_path(cli_path);
        let file = load_config(&path)?;

        if file.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints { path });
        }

        let policy = file.policy;
        let pool = PoolConfig {
            max_retries: policy.max_retries,
            circuit_breaker_threshold: policy.circuit_breaker_threshold,
            health_check_interval: std::time::Duration::from_secs(policy.health_check_interval_sec),
        };
        let orchestrator = OrchestratorConfig {
            peer_review_enabled: policy.peer_review_enabled,
            self_correction_enabled: policy.self_correction_enabled,
            max_subtask_attempts: policy.max_subtask_attempts,
            execution_step_cap: policy.execution_step_cap,
        };

        Ok(Self {
            endpoints: file.endpoints,
            pool,
            orchestrator,
        })
    }
}
