//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::types::OptimizeOptions;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.workers == Some(0) {
            return Err(ConfigError::ValidationError(
                "pipeline.workers must be > 0".into(),
            ));
        }
        if self.pipeline.write_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.write_attempts must be > 0".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        let mut names = HashSet::new();
        for batch in &self.batches {
            if !names.insert(batch.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate batch name {:?}",
                    batch.name
                )));
            }
            if batch.inputs.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "batches.{}.inputs must list at least one directory",
                    batch.name
                )));
            }
            validate_options(&batch.name, &batch.options)?;
        }
        Ok(())
    }
}

/// Range checks for a single options record.
pub fn validate_options(batch: &str, options: &OptimizeOptions) -> Result<(), ConfigError> {
    if options.width == Some(0) {
        return Err(ConfigError::ValidationError(format!(
            "batches.{batch}.width must be > 0"
        )));
    }
    if let Some(quality) = options.quality {
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::ValidationError(format!(
                "batches.{batch}.quality must be between 1 and 100"
            )));
        }
    }
    if let Some(blur) = options.blur {
        if !blur.is_finite() || blur < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "batches.{batch}.blur must be a non-negative number"
            )));
        }
    }
    Ok(())
}
