//! Progress bar driven by the batch's completion hooks.

use imgopt_core::{BatchProgress, JobReport};
use indicatif::{ProgressBar, ProgressStyle};

/// Shows one bar per batch; a no-op when disabled.
pub struct ProgressReporter {
    enabled: bool,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }
}

impl BatchProgress for ProgressReporter {
    fn on_start(&mut self, pending: usize) {
        if self.enabled && pending > 0 {
            self.bar = Some(create_progress_bar(pending as u64));
        }
    }

    fn on_complete(&mut self, report: &JobReport) {
        if let Some(bar) = &self.bar {
            let name = report
                .job
                .input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            bar.set_message(name);
            bar.inc(1);
        }
    }

    fn on_finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}
