//! Human-readable log lines for job results and batch summaries.

use crate::types::{BatchSummary, JobReport};

/// Throughput of a 1.5 Mbps "slow 4G" link in MB/s.
pub const SLOW_4G_MB_PER_SEC: f64 = 0.1875;

/// Lines describing one finished job: resolution, format, size change and
/// estimated load time for successes, a single line for failures.
pub fn result_lines(report: &JobReport) -> Vec<String> {
    let stats = match &report.outcome {
        Ok(stats) => stats,
        Err(e) => return vec![format!("Failed: {e}")],
    };

    let original_kb = stats.original_size as f64 / 1024.0;
    let optimized_kb = stats.optimized_size as f64 / 1024.0;
    let change = if original_kb > 0.0 {
        (optimized_kb - original_kb) / original_kb * 100.0
    } else {
        0.0
    };
    let label = if change >= 0.0 { "increase" } else { "reduction" };

    let mut lines = vec![
        format!("Optimized image: {}", report.job.input.display()),
        format!(
            "  Resolution: {} -> {}x{}",
            stats.original_resolution, stats.width, stats.height
        ),
        format!("  Format: {} -> {}", stats.original_format, stats.format),
        format!(
            "  Size: {original_kb:.2} KB -> {optimized_kb:.2} KB ({:.2}% {label})",
            change.abs()
        ),
        format!(
            "  Estimated load time: {:.2}s -> {:.2}s on slow 4G",
            load_seconds(stats.original_size),
            load_seconds(stats.optimized_size)
        ),
    ];
    if let Some(blur) = report.job.options.blur {
        lines.push(format!("  Applied blur of {blur}px"));
    }
    lines
}

/// Estimated transfer time of `bytes` on a slow 4G link.
pub fn load_seconds(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0) / SLOW_4G_MB_PER_SEC
}

/// Emit [`result_lines`] at the level matching the outcome.
pub fn log_result(report: &JobReport) {
    match &report.outcome {
        Ok(_) => {
            for line in result_lines(report) {
                tracing::info!("{line}");
            }
        }
        Err(e) => tracing::warn!("Failed to optimize {:?}: {e}", report.job.input),
    }
}

/// The two summary lines printed after every batch.
pub fn summary_lines(summary: &BatchSummary) -> [String; 2] {
    [
        format!(
            "Processed {} images, skipped {} images, failed {} images in {:.3}s",
            summary.processed,
            summary.skipped,
            summary.failed,
            summary.elapsed.as_secs_f64()
        ),
        format!(
            "Original size: {:.2} MB, optimized size: {:.2} MB",
            summary.original_mb(),
            summary.optimized_mb()
        ),
    ]
}

pub fn log_summary(summary: &BatchSummary) {
    for line in summary_lines(summary) {
        tracing::info!("{line}");
    }
}
