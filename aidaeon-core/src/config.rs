//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/aidaeon/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/aidaeon/` (~/.config/aidaeon/)
//! - Data: `$XDG_DATA_HOME/aidaeon/` (~/.local/share/aidaeon/)
//! - State/Logs: `$XDG_STATE_HOME/aidaeon/` (~/.local/state/aidaeon/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Database location
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Document store behaviour
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database location override
#[derive(Debug, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file (defaults to the XDG data directory)
    pub path: Option<PathBuf>,
}

/// How dependent counter updates are written
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CounterMode {
    /// Read the document, bump in memory, write it back. Concurrent writers
    /// can lose increments.
    #[default]
    ReadModifyWrite,
    /// Single `UPDATE` statement per bump.
    Atomic,
}

/// Document store configuration
#[derive(Debug, Deserialize, Default)]
pub struct StoreConfig {
    /// Counter update strategy for assistant metrics
    #[serde(default)]
    pub counter_mode: CounterMode,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl LoggingConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "logging.level must be one of {}, got {:?}",
                LEVELS.join(", "),
                self.level
            )));
        }
        if self.max_files == 0 {
            return Err(Error::Config(
                "logging.max_files must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.logging.validate()?;
        Ok(config)
    }

    /// Returns the configured database path, or the XDG default
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/aidaeon/config.toml` (~/.config/aidaeon/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("aidaeon").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/aidaeon/` (~/.local/share/aidaeon/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("aidaeon")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/aidaeon/` (~/.local/state/aidaeon/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("aidaeon")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/aidaeon/aidaeon.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("aidaeon.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/aidaeon/aidaeon.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("aidaeon.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// CLI binaries call this before anything reads the env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
