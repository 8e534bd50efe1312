//! Batch entry point: collect, filter, process, aggregate, persist.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, Result};
use crate::types::{BatchSummary, JobReport, OptimizeOptions};

use super::aggregate::Aggregate;
use super::backend::{ImageBackend, RustBackend};
use super::discovery::JobCollector;
use super::filter::{self, Filtered};
use super::pool::{BatchResults, WorkerPool};
use super::processor::ImageProcessor;
use super::report;
use super::sidecar::{self, GameMetadata};

/// Hooks the caller can use to follow a batch (progress bars, tests).
///
/// All methods run on the coordinator.
pub trait BatchProgress {
    /// Called once with the number of jobs left after skip filtering.
    fn on_start(&mut self, _pending: usize) {}

    /// Called as each job finishes, in completion order.
    fn on_complete(&mut self, _report: &JobReport) {}

    /// Called after the last job, before aggregation.
    fn on_finish(&mut self) {}
}

impl BatchProgress for () {}

/// Everything a finished batch produced.
#[derive(Debug)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    /// Absolute output root the batch wrote into
    pub output_dir: PathBuf,
    pub results: BatchResults,
    /// Merged sidecar contents, when metadata emission was on
    pub metadata: Option<GameMetadata>,
}

/// Runs batches with one pipeline configuration and image backend.
pub struct Optimizer<B: ImageBackend + 'static = RustBackend> {
    pipeline: PipelineConfig,
    processor: Arc<ImageProcessor<B>>,
    base_dir: Option<PathBuf>,
}

impl Optimizer<RustBackend> {
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self::with_backend(pipeline, RustBackend::new())
    }
}

impl<B: ImageBackend + 'static> Optimizer<B> {
    pub fn with_backend(pipeline: PipelineConfig, backend: B) -> Self {
        let processor = Arc::new(ImageProcessor::with_backend(backend, &pipeline));
        Self {
            pipeline,
            processor,
            base_dir: None,
        }
    }

    /// Resolve relative input and output paths against `dir` instead of the
    /// process working directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Absolute output root for a batch with these options.
    pub fn output_dir(&self, options: &OptimizeOptions) -> Result<PathBuf> {
        let output = Path::new(&options.output_path);
        if output.is_absolute() {
            return Ok(output.to_path_buf());
        }
        Ok(self.working_dir()?.join(output))
    }

    /// Optimize every image under `roots` with shared `options`.
    pub async fn optimize_images(
        &self,
        roots: &[PathBuf],
        options: OptimizeOptions,
    ) -> Result<BatchOutcome> {
        self.optimize_images_with(roots, options, &mut ()).await
    }

    /// Like [`optimize_images`](Self::optimize_images), reporting progress.
    ///
    /// Per-job failures are counted, never returned. The batch itself fails
    /// only when the output root cannot be prepared or the sidecar cannot be
    /// read, parsed or written.
    pub async fn optimize_images_with<P: BatchProgress>(
        &self,
        roots: &[PathBuf],
        options: OptimizeOptions,
        progress: &mut P,
    ) -> Result<BatchOutcome> {
        let start = Instant::now();
        let output_dir = self.output_dir(&options)?;
        let roots: Vec<PathBuf> = roots.iter().map(|root| self.resolve(root)).collect();
        tracing::info!("Output directory: {}", output_dir.display());

        if self.pipeline.clean_output {
            clean_output_dir(&output_dir, &roots, &self.working_dir()?)?;
        }
        std::fs::create_dir_all(&output_dir).map_err(|source| PipelineError::OutputRoot {
            path: output_dir.clone(),
            source,
        })?;

        let options = Arc::new(options);
        let jobs = JobCollector::new(Arc::clone(&options), &output_dir).collect_all(&roots);
        let discovered = jobs.len();
        let Filtered { pending, skipped } = filter::skip_existing(jobs, self.pipeline.skip_existing);

        let pool = WorkerPool::new(self.pipeline.worker_count());
        tracing::info!(
            "Found {discovered} image(s): {} to process, {skipped} skipped ({} worker{})",
            pending.len(),
            pool.workers(),
            if pool.workers() == 1 { "" } else { "s" }
        );

        progress.on_start(pending.len());
        let results = pool
            .run_with(pending, Arc::clone(&self.processor), |report| {
                report::log_result(report);
                progress.on_complete(report);
            })
            .await;
        progress.on_finish();

        let aggregate = Aggregate::from_results(&results, roots.first().map(PathBuf::as_path));
        let metadata = if options.output_metadata {
            Some(sidecar::update(&output_dir, aggregate.metadata.clone())?)
        } else {
            None
        };

        let summary = aggregate.summary(skipped, start.elapsed());
        report::log_summary(&summary);

        Ok(BatchOutcome {
            summary,
            output_dir,
            results,
            metadata,
        })
    }

    fn working_dir(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Remove the output root, refusing when it would take an input root or the
/// working directory with it.
fn clean_output_dir(output_dir: &Path, roots: &[PathBuf], working_dir: &Path) -> PipelineResult<()> {
    if !output_dir.exists() {
        return Ok(());
    }
    let canonical = output_dir
        .canonicalize()
        .map_err(|source| PipelineError::OutputRoot {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let protected = roots
        .iter()
        .map(|root| working_dir.join(root))
        .chain(std::iter::once(working_dir.to_path_buf()));
    for path in protected {
        let Ok(path) = path.canonicalize() else {
            continue;
        };
        if path.starts_with(&canonical) {
            return Err(PipelineError::UnsafeClean {
                path: output_dir.to_path_buf(),
                reason: format!("it contains {}", path.display()),
            });
        }
    }

    tracing::info!("Cleaning output directory {}", output_dir.display());
    std::fs::remove_dir_all(output_dir).map_err(|source| PipelineError::OutputRoot {
        path: output_dir.to_path_buf(),
        source,
    })
}
