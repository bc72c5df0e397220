//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/todoist/config.toml)
//! 3. Environment variables (TODOIST_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "TODOIST";

/// Sync API endpoint
pub const DEFAULT_API_URL: &str = "https://api.todoist.com/sync/v9/sync";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the local cache
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// API token (required for any network operation)
    #[serde(default)]
    pub api_token: Option<String>,

    /// Sync endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds (0 disables it)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_token: None,
            api_url: default_api_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TODOIST_DATA_DIR, TODOIST_API_TOKEN,
    ///    TODOIST_API_URL, TODOIST_TIMEOUT_SECS)
    /// 2. Config file (~/.config/todoist/config.toml or TODOIST_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string clears the token
        if let Ok(val) = std::env::var(format!("{}_API_TOKEN", ENV_PREFIX)) {
            self.api_token = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_url = val;
            }
        }

        // Unparseable values are ignored
        if let Ok(val) = std::env::var(format!("{}_TIMEOUT_SECS", ENV_PREFIX)) {
            if let Ok(secs) = val.trim().parse() {
                self.timeout_secs = secs;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Set a single key from its text form (`todoist config set`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "api_token" => {
                self.api_token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "api_url" => {
                if value.is_empty() {
                    bail!("api_url cannot be empty");
                }
                self.api_url = value.to_string();
            }
            "timeout_secs" => {
                self.timeout_secs = value
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs: '{}'", value))?;
            }
            "log_file" => {
                self.log_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            _ => bail!(
                "Unknown config key '{}'. Valid keys: data_dir, api_token, api_url, timeout_secs, log_file",
                key
            ),
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with TODOIST_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("todoist")
            .join("config.toml")
    }

    /// Get the path to the cached sync state
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.json")
    }

    /// Request timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todoist")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
