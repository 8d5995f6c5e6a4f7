//! Configuration for ttx-server
//!
//! Bootstrap configuration loaded from a TOML file once at startup;
//! command-line arguments override individual fields. Minimal by design:
//! only settings that cannot change while the server is running live here.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file (created if missing)
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-topic broadcast channel capacity (events buffered before slow
    /// subscribers start lagging)
    #[serde(default = "default_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("ttx.db")
}

fn default_port() -> u16 {
    5780
}

fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            port: default_port(),
            event_channel_capacity: default_channel_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or built-in defaults when no
    /// path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))
            }
            None => Ok(Self::default()),
        }
    }
}
