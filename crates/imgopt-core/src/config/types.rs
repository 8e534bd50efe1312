//! Sub-configuration structs with defaults matching the stock build.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{OptimizeOptions, OutputFormat};

/// Pipeline settings: concurrency, skip policy and write retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run jobs on one worker per CPU core; `false` processes sequentially
    pub multithreading: bool,

    /// Explicit worker count (only used with multithreading)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Drop jobs whose output file already exists
    pub skip_existing: bool,

    /// Remove the output root before each batch
    pub clean_output: bool,

    /// Total write attempts per image (first try included)
    pub write_attempts: u32,

    /// Delay between failed write attempts in milliseconds
    pub write_retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            multithreading: true,
            workers: None,
            skip_existing: true,
            clean_output: false,
            write_attempts: 3,
            write_retry_delay_ms: 1000,
        }
    }
}

impl PipelineConfig {
    /// Number of workers the pool runs with.
    ///
    /// One per available core when multithreading is on (unless overridden),
    /// otherwise exactly one.
    pub fn worker_count(&self) -> usize {
        if !self.multithreading {
            return 1;
        }
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// One named batch invocation: input roots plus the options every job shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Name used to select the batch from the CLI
    pub name: String,

    /// Input root directories (`~` is expanded)
    pub inputs: Vec<PathBuf>,

    #[serde(flatten)]
    pub options: OptimizeOptions,
}

impl BatchConfig {
    /// Input roots with `~` expanded.
    pub fn resolved_inputs(&self) -> Vec<PathBuf> {
        self.inputs
            .iter()
            .map(|p| {
                let path_str = p.to_string_lossy();
                PathBuf::from(shellexpand::tilde(&path_str).into_owned())
            })
            .collect()
    }
}

/// The three batches the site build runs by default.
pub fn stock_batches() -> Vec<BatchConfig> {
    vec![
        BatchConfig {
            name: "screenshots".to_string(),
            inputs: vec![PathBuf::from("images/screenshots/")],
            options: OptimizeOptions {
                quality: Some(60),
                format: Some(OutputFormat::Avif),
                keep_aspect: true,
                crop: true,
                output_path: "src/lib/images/screenshots/".to_string(),
                trim_black_borders: true,
                trim_threshold: Some(10),
                output_metadata: true,
                ..Default::default()
            },
        },
        BatchConfig {
            name: "bento".to_string(),
            inputs: vec![PathBuf::from("images/bento/")],
            options: OptimizeOptions {
                quality: Some(70),
                width: Some(750),
                format: Some(OutputFormat::Avif),
                keep_aspect: true,
                crop: true,
                output_path: "src/lib/images/bento/".to_string(),
                omit_optimized: true,
                output_metadata: true,
                ..Default::default()
            },
        },
        BatchConfig {
            name: "thumbnails".to_string(),
            inputs: vec![PathBuf::from("images/screenshots/")],
            options: OptimizeOptions {
                quality: Some(50),
                width: Some(600),
                format: Some(OutputFormat::Avif),
                keep_aspect: true,
                crop: true,
                output_path: "src/lib/images/thumbnails/".to_string(),
                trim_black_borders: true,
                trim_threshold: Some(10),
                ..Default::default()
            },
        },
    ]
}
