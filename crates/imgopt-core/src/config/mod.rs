//! Configuration management for imgopt.
//!
//! Configuration is loaded from the platform config directory with defaults
//! that reproduce the stock site build (three batches, skip-existing on,
//! one worker per core).

mod types;
mod validate;

pub use types::*;
pub use validate::validate_options;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for imgopt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline settings
    pub pipeline: PipelineConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Batches run by `imgopt run`, in order
    pub batches: Vec<BatchConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
            batches: stock_batches(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.imgopt.imgopt/config.toml
    /// - Linux: ~/.config/imgopt/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\imgopt\config\config.toml
    ///
    /// Falls back to ~/.imgopt/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "imgopt", "imgopt")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".imgopt").join("config.toml")
            })
    }

    /// Look up a batch by name.
    pub fn batch(&self, name: &str) -> Option<&BatchConfig> {
        self.batches.iter().find(|b| b.name == name)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
