//! Configuration module for Cubby.

use serde::Deserialize;
use std::path::Path;

use crate::{CubbyError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/cubby.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Physical storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding every user's tree.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Permission bits for created directories.
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,
    /// Permission bits for created files.
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,
}

fn default_storage_path() -> String {
    "data/storage".to_string()
}

fn default_dir_mode() -> u32 {
    0o700
}

fn default_file_mode() -> u32 {
    0o600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            dir_mode: default_dir_mode(),
            file_mode: default_file_mode(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Console only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CubbyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the storage engine unusable.
    pub fn validate(&self) -> Result<()> {
        if self.storage.path.trim().is_empty() {
            return Err(CubbyError::Config("storage.path must not be empty".to_string()));
        }
        if self.database.path.trim().is_empty() {
            return Err(CubbyError::Config("database.path must not be empty".to_string()));
        }
        // Owner needs rwx on directories and rw on files.
        if self.storage.dir_mode > 0o777 || self.storage.dir_mode & 0o700 != 0o700 {
            return Err(CubbyError::Config(format!(
                "storage.dir_mode {:o} must be within 0o777 and grant the owner rwx",
                self.storage.dir_mode
            )));
        }
        if self.storage.file_mode > 0o777 || self.storage.file_mode & 0o600 != 0o600 {
            return Err(CubbyError::Config(format!(
                "storage.file_mode {:o} must be within 0o777 and grant the owner rw",
                self.storage.file_mode
            )));
        }
        Ok(())
    }
}
