//! Error types for the imgopt pipeline.
//!
//! Errors are split by blast radius: [`PipelineError`] aborts a whole batch,
//! while [`JobError`] stays attached to a single image and is converted into a
//! failed result at the job boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for imgopt operations.
#[derive(Error, Debug)]
pub enum OptimizeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Batch-fatal pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Errors that abort a batch. None of these are retried.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The output root could not be created or accessed
    #[error("Cannot prepare output directory {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Refused to clean an output root that overlaps the inputs or cwd
    #[error("Refusing to clean output directory {path}: {reason}")]
    UnsafeClean { path: PathBuf, reason: String },

    /// The metadata sidecar could not be read
    #[error("Failed to read metadata sidecar {path}: {source}")]
    SidecarRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The metadata sidecar is not a valid game metadata map
    #[error("Failed to parse metadata sidecar {path}: {source}")]
    SidecarParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The metadata sidecar could not be written
    #[error("Failed to write metadata sidecar {path}: {source}")]
    SidecarWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Classification of a per-job failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobErrorKind {
    /// Source file absent when the job started
    InputMissing,
    /// Dimensions could not be determined
    MetadataUnavailable,
    /// Pixel data could not be decoded after a successful probe
    DecodeFailed,
    /// Every write attempt failed
    WriteFailed,
    /// The written file is zero bytes
    EmptyOutput,
    /// The worker itself died instead of reporting
    WorkerCrash,
}

impl std::fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobErrorKind::InputMissing => "input missing",
            JobErrorKind::MetadataUnavailable => "metadata unavailable",
            JobErrorKind::DecodeFailed => "decode failed",
            JobErrorKind::WriteFailed => "write failed",
            JobErrorKind::EmptyOutput => "empty output",
            JobErrorKind::WorkerCrash => "worker crash",
        };
        f.write_str(name)
    }
}

/// A failure confined to one job.
#[derive(Error, Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[error("{kind} for {path}: {message}")]
pub struct JobError {
    pub kind: JobErrorKind,
    pub path: PathBuf,
    pub message: String,
}

impl JobError {
    pub fn new(kind: JobErrorKind, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Convenience type alias for imgopt results.
pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Convenience type alias for batch-level pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
