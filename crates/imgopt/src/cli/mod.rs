//! Command implementations and the flags they share.

pub mod config;
pub mod optimize;
pub mod page;
pub mod progress;
pub mod run;

use clap::Args;
use imgopt_core::{Config, PipelineConfig};
use std::path::Path;

/// Load the config from `path`, or from the default location when unset.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Pipeline overrides accepted by `run` and `optimize`.
#[derive(Args, Debug, Default, Clone)]
pub struct PipelineArgs {
    /// Reprocess images whose output already exists
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Process on a single worker
    #[arg(long)]
    pub single_thread: bool,

    /// Number of parallel workers (defaults to one per CPU core)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Remove the output directory before processing
    #[arg(long)]
    pub clean: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl PipelineArgs {
    /// Apply the flags on top of the configured pipeline settings.
    pub fn apply(&self, mut pipeline: PipelineConfig) -> anyhow::Result<PipelineConfig> {
        if self.workers == Some(0) {
            anyhow::bail!("--workers must be at least 1");
        }
        if self.no_skip_existing {
            pipeline.skip_existing = false;
        }
        if self.single_thread {
            pipeline.multithreading = false;
        }
        if let Some(workers) = self.workers {
            pipeline.multithreading = true;
            pipeline.workers = Some(workers);
        }
        if self.clean {
            pipeline.clean_output = true;
        }
        Ok(pipeline)
    }
}
