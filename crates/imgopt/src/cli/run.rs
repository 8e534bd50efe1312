//! The `imgopt run` command: run the configured batches in order.

use clap::Args;
use imgopt_core::{BatchConfig, Config, Optimizer};
use std::time::Instant;

use super::progress::ProgressReporter;
use super::PipelineArgs;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Only run the named batch (repeatable); all batches when omitted
    #[arg(short, long)]
    pub batch: Vec<String>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, config: Config, show_progress: bool) -> anyhow::Result<()> {
    let pipeline = args.pipeline.apply(config.pipeline.clone())?;
    let batches = select_batches(&config, &args.batch)?;

    let workers = pipeline.worker_count();
    eprintln!();
    eprintln!("=== Starting Image Optimization ===");
    eprintln!(
        "Mode: {} ({workers} worker{})",
        if pipeline.multithreading {
            "Multithreading"
        } else {
            "Single thread"
        },
        if workers == 1 { "" } else { "s" }
    );
    eprintln!(
        "Skip existing: {}",
        if pipeline.skip_existing {
            "enabled"
        } else {
            "disabled"
        }
    );

    let total_start = Instant::now();
    let optimizer = Optimizer::new(pipeline);
    let mut progress = ProgressReporter::new(show_progress && !args.pipeline.no_progress);

    for batch in batches {
        tracing::info!("Batch: {}", batch.name);
        optimizer
            .optimize_images_with(&batch.resolved_inputs(), batch.options.clone(), &mut progress)
            .await?;
    }

    eprintln!();
    eprintln!(
        "=== Image Optimization Complete ({:.2}s) ===",
        total_start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Batches to run, in config order. Unknown names are an error.
fn select_batches<'a>(config: &'a Config, names: &[String]) -> anyhow::Result<Vec<&'a BatchConfig>> {
    if names.is_empty() {
        return Ok(config.batches.iter().collect());
    }

    if let Some(unknown) = names.iter().find(|n| config.batch(n).is_none()) {
        let available: Vec<&str> = config.batches.iter().map(|b| b.name.as_str()).collect();
        anyhow::bail!(
            "Unknown batch {unknown:?}. Available batches: {}",
            available.join(", ")
        );
    }

    Ok(config
        .batches
        .iter()
        .filter(|b| names.contains(&b.name))
        .collect())
}
