//! imgopt core - build-time batch image optimization.
//!
//! Walks input directories, resizes and re-encodes every image on a bounded
//! pool of workers, mirrors the tree under an output root, and keeps a
//! game-keyed `metadata.json` sidecar up to date across runs.
//!
//! # Architecture
//!
//! ```text
//! Roots → Collect → Skip existing → Worker pool (probe → resize → trim →
//!   blur → grayscale → encode → write) → Aggregate → metadata.json
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use imgopt_core::{Config, Optimizer};
//!
//! #[tokio::main]
//! async fn main() -> imgopt_core::Result<()> {
//!     let config = Config::load()?;
//!     let optimizer = Optimizer::new(config.pipeline.clone());
//!
//!     for batch in &config.batches {
//!         let outcome = optimizer
//!             .optimize_images(&batch.resolved_inputs(), batch.options.clone())
//!             .await?;
//!         println!("{}: {} processed", batch.name, outcome.summary.processed);
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod page;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::{BatchConfig, Config, PipelineConfig};
pub use error::{
    ConfigError, JobError, JobErrorKind, OptimizeError, PipelineError, PipelineResult, Result,
};
pub use pipeline::{BatchOutcome, BatchProgress, Optimizer};
pub use types::{BatchSummary, ImageStats, Job, JobReport, OptimizeOptions, OutputFormat};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
