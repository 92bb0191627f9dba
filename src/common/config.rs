//! Settings file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::{Error, Result};

/// Environment variable used to pass the input when `--env` is given
pub const DEFAULT_ENV_VAR: &str = "WATTS_PARAMETER";

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Plugin invocation settings
    #[serde(default)]
    pub invocation: InvocationConfig,
}

/// Plugin invocation settings
#[derive(Debug, Deserialize)]
pub struct InvocationConfig {
    /// Wall-clock limit for a single plugin run
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Variable name for passing the input via the environment
    #[serde(default = "default_env_var")]
    pub env_var: String,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            env_var: default_env_var(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_env_var() -> String {
    DEFAULT_ENV_VAR.to_string()
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
