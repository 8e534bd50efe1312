//! Output naming rule.
//!
//! `{basename}.{"optimized." unless omitted}{format}`, placed under the
//! output root at the same relative directory as the source. The
//! skip-existing filter, the processor and the metadata aggregator all call
//! into this module so the three can never disagree about where a job's
//! output lives.

use std::path::{Path, PathBuf};

use crate::types::{Job, OptimizeOptions};

/// Infix inserted between basename and extension unless `omit_optimized` is set.
pub const OPTIMIZED_INFIX: &str = "optimized.";

/// Extension an output is written with: the explicit format, else the source's.
pub fn output_extension(input: &Path, options: &OptimizeOptions) -> String {
    match options.format {
        Some(format) => format.extension().to_string(),
        None => input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Output filename (no directory) for a source file.
pub fn output_file_name(input: &Path, options: &OptimizeOptions) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let infix = if options.omit_optimized {
        ""
    } else {
        OPTIMIZED_INFIX
    };
    format!("{stem}.{infix}{}", output_extension(input, options))
}

/// Directory of the source relative to its input root (empty at the root).
pub fn relative_dir(relative: &Path) -> &Path {
    relative.parent().unwrap_or(Path::new(""))
}

/// Full output path for a job.
pub fn output_path(job: &Job) -> PathBuf {
    job.output_dir
        .join(relative_dir(&job.relative))
        .join(output_file_name(&job.input, &job.options))
}

/// Public URL path recorded in the metadata sidecar.
///
/// `/{output_path}{relative dir}/{filename}`, using forward slashes
/// regardless of platform.
pub fn public_path(job: &Job) -> String {
    let mut prefix = job.options.output_path.replace('\\', "/");
    if !prefix.is_empty() && !prefix.ends_with('/') {
        prefix.push('/');
    }
    let prefix = prefix.trim_start_matches("./").trim_start_matches('/');

    let dir: Vec<String> = relative_dir(&job.relative)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let file = output_file_name(&job.input, &job.options);

    if dir.is_empty() {
        format!("/{prefix}{file}")
    } else {
        format!("/{prefix}{}/{file}", dir.join("/"))
    }
}
