//! Skip-existing filter.

use crate::types::Job;

use super::naming;

/// Jobs left to run plus the number dropped because their output exists.
#[derive(Debug)]
pub struct Filtered {
    pub pending: Vec<Job>,
    pub skipped: u64,
}

/// Drop jobs whose output file is already on disk.
///
/// With `skip_existing` off every job passes through and nothing is counted.
pub fn skip_existing(jobs: Vec<Job>, skip_existing: bool) -> Filtered {
    if !skip_existing {
        return Filtered {
            pending: jobs,
            skipped: 0,
        };
    }

    let mut skipped = 0;
    let pending = jobs
        .into_iter()
        .filter(|job| {
            let output = naming::output_path(job);
            if output.exists() {
                tracing::trace!("Skipping {:?}: {:?} exists", job.input, output);
                skipped += 1;
                false
            } else {
                true
            }
        })
        .collect();

    Filtered { pending, skipped }
}
