//! Fold pool results into batch counters and game-keyed metadata entries.

use std::path::{Component, Path};

use crate::types::{BatchSummary, JobReport};

use super::naming;
use super::pool::BatchResults;
use super::sidecar::{GameMetadata, MetadataEntry};

/// Game label used for images directly under the input root.
pub const DEFAULT_GAME: &str = "default";

/// Counters and metadata gathered from one batch's results.
#[derive(Debug, Default)]
pub struct Aggregate {
    pub processed: u64,
    pub failed: u64,
    pub original_bytes: u64,
    pub optimized_bytes: u64,
    pub metadata: GameMetadata,
}

impl Aggregate {
    /// Aggregate results against the batch's first input root.
    ///
    /// Reports are visited in input-path order so the metadata is stable
    /// regardless of completion order.
    pub fn from_results(results: &BatchResults, first_root: Option<&Path>) -> Self {
        let mut reports: Vec<&JobReport> = results.values().collect();
        reports.sort_by(|a, b| a.job.input.cmp(&b.job.input));

        let mut aggregate = Self::default();
        for report in reports {
            let stats = match &report.outcome {
                Ok(stats) => stats,
                Err(_) => {
                    aggregate.failed += 1;
                    continue;
                }
            };

            aggregate.processed += 1;
            aggregate.original_bytes += stats.original_size;
            aggregate.optimized_bytes += stats.optimized_size;

            let game = game_label(report, first_root);
            aggregate
                .metadata
                .entry(game.clone())
                .or_default()
                .push(MetadataEntry {
                    width: stats.width,
                    height: stats.height,
                    game,
                    path: naming::public_path(&report.job),
                });
        }
        aggregate
    }

    /// Combine with the skip count and elapsed time into the batch summary.
    pub fn summary(&self, skipped: u64, elapsed: std::time::Duration) -> BatchSummary {
        BatchSummary {
            processed: self.processed,
            skipped,
            failed: self.failed,
            original_bytes: self.original_bytes,
            optimized_bytes: self.optimized_bytes,
            elapsed,
        }
    }
}

/// First path component of the image's directory relative to `first_root`.
///
/// Images found under a later root fall back to their own relative
/// directory. Empty labels become [`DEFAULT_GAME`].
pub fn game_label(report: &JobReport, first_root: Option<&Path>) -> String {
    let job = &report.job;
    let dir = job.input.parent().unwrap_or(Path::new(""));
    let relative = first_root
        .and_then(|root| dir.strip_prefix(root).ok())
        .unwrap_or_else(|| naming::relative_dir(&job.relative));

    relative
        .components()
        .find_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_GAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{JobError, JobErrorKind};
    use crate::types::{ImageStats, Job, OptimizeOptions, OutputFormat};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn report(root: &str, relative: &str, outcome: Result<(u32, u32), JobErrorKind>) -> JobReport {
        let input = Path::new(root).join(relative);
        let options = OptimizeOptions {
            format: Some(OutputFormat::Avif),
            output_path: "out/".to_string(),
            ..Default::default()
        };
        let outcome = match outcome {
            Ok((width, height)) => Ok(ImageStats {
                width,
                height,
                original_format: "png".to_string(),
                original_resolution: "800x600".to_string(),
                original_size: 1000,
                optimized_size: 250,
                format: "avif".to_string(),
            }),
            Err(kind) => Err(JobError::new(kind, &input, "boom")),
        };
        JobReport {
            job: Job {
                input,
                options: Arc::new(options),
                output_dir: PathBuf::from("/site/out"),
                relative: PathBuf::from(relative),
            },
            outcome,
        }
    }

    fn results(reports: Vec<JobReport>) -> BatchResults {
        reports
            .into_iter()
            .map(|r| (r.job.input.clone(), r))
            .collect()
    }

    #[test]
    fn test_counts_and_bytes() {
        let results = results(vec![
            report("/in", "a/cat.png", Ok((400, 300))),
            report("/in", "b/dog.jpg", Ok((400, 300))),
            report("/in", "b/bad.png", Err(JobErrorKind::MetadataUnavailable)),
        ]);
        let agg = Aggregate::from_results(&results, Some(Path::new("/in")));

        assert_eq!(agg.processed, 2);
        assert_eq!(agg.failed, 1);
        assert_eq!(agg.original_bytes, 2000);
        assert_eq!(agg.optimized_bytes, 500);

        let summary = agg.summary(3, Duration::from_millis(10));
        assert_eq!(summary.total(), 6);
    }

    #[test]
    fn test_metadata_grouped_by_game() {
        let results = results(vec![
            report("/in", "a/cat.png", Ok((400, 300))),
            report("/in", "b/dog.jpg", Ok((400, 300))),
        ]);
        let agg = Aggregate::from_results(&results, Some(Path::new("/in")));

        assert_eq!(agg.metadata.len(), 2);
        let a = &agg.metadata["a"];
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].game, "a");
        assert_eq!(a[0].path, "/out/a/cat.optimized.avif");
        assert_eq!((a[0].width, a[0].height), (400, 300));
        assert_eq!(agg.metadata["b"][0].path, "/out/b/dog.optimized.avif");
    }

    #[test]
    fn test_game_uses_first_component_only() {
        let r = report("/in", "celeste/chapter1/level.png", Ok((1, 1)));
        assert_eq!(game_label(&r, Some(Path::new("/in"))), "celeste");
    }

    #[test]
    fn test_game_defaults_at_root() {
        let r = report("/in", "loose.png", Ok((1, 1)));
        assert_eq!(game_label(&r, Some(Path::new("/in"))), DEFAULT_GAME);
    }

    #[test]
    fn test_game_for_image_outside_first_root() {
        let r = report("/other", "hades/boss.png", Ok((1, 1)));
        assert_eq!(game_label(&r, Some(Path::new("/in"))), "hades");
        assert_eq!(game_label(&r, None), "hades");
    }

    #[test]
    fn test_entries_sorted_by_input_path() {
        let results = results(vec![
            report("/in", "a/zebra.png", Ok((1, 1))),
            report("/in", "a/apple.png", Ok((2, 2))),
        ]);
        let agg = Aggregate::from_results(&results, Some(Path::new("/in")));
        let paths: Vec<&str> = agg.metadata["a"].iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            ["/out/a/apple.optimized.avif", "/out/a/zebra.optimized.avif"]
        );
    }
}
