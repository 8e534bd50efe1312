//! Core data types for the imgopt pipeline.
//!
//! A batch turns a list of [`Job`]s into one [`JobReport`] per job; the
//! aggregated counters end up in a [`BatchSummary`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::JobError;

/// Formats an image can be written as.
///
/// The variant name doubles as the output file extension, so `Jpg` and
/// `Jpeg` (likewise `Tif`/`Tiff`) produce different filenames for the same
/// encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Jpg,
    Png,
    Webp,
    Gif,
    Tiff,
    Tif,
    Avif,
    Bmp,
    Heif,
    Heic,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 11] = [
        OutputFormat::Jpeg,
        OutputFormat::Jpg,
        OutputFormat::Png,
        OutputFormat::Webp,
        OutputFormat::Gif,
        OutputFormat::Tiff,
        OutputFormat::Tif,
        OutputFormat::Avif,
        OutputFormat::Bmp,
        OutputFormat::Heif,
        OutputFormat::Heic,
    ];

    /// File extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Tif => "tif",
            OutputFormat::Avif => "avif",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Heif => "heif",
            OutputFormat::Heic => "heic",
        }
    }

    /// Parse a format name or extension (case-insensitive, leading dot allowed).
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim_start_matches('.').to_lowercase();
        Self::ALL.into_iter().find(|f| f.extension() == lower)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unsupported output format: {s}"))
    }
}

/// Options shared by every job of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// Target width in pixels; original width when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Encoder quality (1-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,

    /// Output format; the source extension is kept when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,

    /// Gaussian blur sigma
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<f32>,

    /// Derive the height from the width, preserving aspect ratio
    pub keep_aspect: bool,

    /// Cover-crop to the target box instead of fitting inside it
    pub crop: bool,

    /// Output root, relative to the working directory (also the public URL prefix)
    pub output_path: String,

    pub grayscale: bool,

    /// Trim near-black borders after resizing
    pub trim_black_borders: bool,

    /// Per-channel tolerance for border trimming (defaults to 10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_threshold: Option<u8>,

    /// Write `name.avif` instead of `name.optimized.avif`
    pub omit_optimized: bool,

    /// Merge results into `metadata.json` at the output root
    pub output_metadata: bool,
}

/// Default tolerance used when border trimming is on but no threshold is set.
pub const DEFAULT_TRIM_THRESHOLD: u8 = 10;

impl OptimizeOptions {
    pub fn trim_threshold(&self) -> u8 {
        self.trim_threshold.unwrap_or(DEFAULT_TRIM_THRESHOLD)
    }
}

/// One image to transform and write.
#[derive(Debug, Clone)]
pub struct Job {
    /// Source file
    pub input: PathBuf,

    /// Options shared by the whole batch
    pub options: Arc<OptimizeOptions>,

    /// Absolute output root
    pub output_dir: PathBuf,

    /// Source path relative to the input root it was found under
    pub relative: PathBuf,
}

/// Success payload of one processed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageStats {
    /// Final width in pixels
    pub width: u32,

    /// Final height in pixels
    pub height: u32,

    /// Detected source format ("jpeg", "png", ...)
    pub original_format: String,

    /// Source resolution as `WIDTHxHEIGHT`
    pub original_resolution: String,

    /// Source file size in bytes
    pub original_size: u64,

    /// Written file size in bytes
    pub optimized_size: u64,

    /// Format the output was encoded as
    pub format: String,
}

/// What happened to a job.
pub type JobOutcome = Result<ImageStats, JobError>;

/// A finished job together with its outcome.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: Job,
    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Aggregate counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub original_bytes: u64,
    pub optimized_bytes: u64,
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Every discovered image lands in exactly one of the three counters.
    pub fn total(&self) -> u64 {
        self.processed + self.skipped + self.failed
    }

    pub fn original_mb(&self) -> f64 {
        self.original_bytes as f64 / (1_024.0 * 1_024.0)
    }

    pub fn optimized_mb(&self) -> f64 {
        self.optimized_bytes as f64 / (1_024.0 * 1_024.0)
    }
}
