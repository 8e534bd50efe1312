//! Bounded worker pool.
//!
//! The coordinator owns the job queue and the set of busy tasks. Each job
//! runs on a blocking thread with its own copy of the job; the only thing
//! that travels back is the [`JobReport`]. At most `workers` jobs are in
//! flight, and the pool resolves once the queue is drained and nothing is
//! busy. A task that dies without reporting still yields a `WorkerCrash`
//! report for its job.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{self, JoinError, JoinSet};

use crate::error::{JobError, JobErrorKind};
use crate::types::{Job, JobOutcome, JobReport};

/// Final result mapping: source path to its report.
pub type BatchResults = HashMap<PathBuf, JobReport>;

/// Something that can execute one job synchronously.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: &Job) -> JobOutcome;
}

/// Fixed-size pool of blocking workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Create a pool; zero is treated as one.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every job and collect one report per job.
    pub async fn run<R: JobRunner>(&self, jobs: Vec<Job>, runner: Arc<R>) -> BatchResults {
        self.run_with(jobs, runner, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_complete` on the coordinator
    /// as each job finishes, in completion order.
    pub async fn run_with<R, F>(&self, jobs: Vec<Job>, runner: Arc<R>, mut on_complete: F) -> BatchResults
    where
        R: JobRunner,
        F: FnMut(&JobReport),
    {
        let mut queue: VecDeque<Job> = jobs.into();
        let mut results = BatchResults::with_capacity(queue.len());
        let mut in_flight: JoinSet<JobReport> = JoinSet::new();
        let mut pending: HashMap<task::Id, Job> = HashMap::new();

        tracing::debug!(
            "Starting {} job(s) on {} worker(s)",
            queue.len(),
            self.workers.min(queue.len())
        );

        while pending.len() < self.workers {
            let Some(job) = queue.pop_front() else { break };
            spawn_job(&mut in_flight, &mut pending, job, &runner);
        }

        while let Some(joined) = in_flight.join_next_with_id().await {
            let report = match joined {
                Ok((id, report)) => {
                    pending.remove(&id);
                    report
                }
                Err(e) => match pending.remove(&e.id()) {
                    Some(job) => crash_report(job, e),
                    None => {
                        tracing::error!("Worker task {} finished without a job: {e}", e.id());
                        continue;
                    }
                },
            };
            on_complete(&report);
            results.insert(report.job.input.clone(), report);

            if let Some(job) = queue.pop_front() {
                spawn_job(&mut in_flight, &mut pending, job, &runner);
            }
        }

        debug_assert!(pending.is_empty());
        results
    }
}

/// Start `job` on a blocking thread; `pending` tracks it until it reports.
fn spawn_job<R: JobRunner>(
    in_flight: &mut JoinSet<JobReport>,
    pending: &mut HashMap<task::Id, Job>,
    job: Job,
    runner: &Arc<R>,
) {
    let runner = Arc::clone(runner);
    let worker_job = job.clone();
    let handle = in_flight.spawn_blocking(move || {
        let outcome = runner.run(&worker_job);
        JobReport {
            job: worker_job,
            outcome,
        }
    });
    pending.insert(handle.id(), job);
}

/// Failed result for a job whose worker panicked or was cancelled.
fn crash_report(job: Job, error: JoinError) -> JobReport {
    let message = crash_message(error);
    tracing::error!("Worker crashed processing {:?}: {message}", job.input);
    let outcome = Err(JobError::new(JobErrorKind::WorkerCrash, &job.input, message));
    JobReport { job, outcome }
}

fn crash_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {s}")
    } else {
        "worker panicked".to_string()
    }
}
