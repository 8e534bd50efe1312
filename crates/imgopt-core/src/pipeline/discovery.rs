//! Job collection: find images under the input roots.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::types::{Job, OptimizeOptions};

/// Filename suffixes (lowercase) picked up by the collector.
pub const IMAGE_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".avif"];

/// Builds jobs for every image under a set of input roots.
pub struct JobCollector {
    options: Arc<OptimizeOptions>,
    output_dir: PathBuf,
}

impl JobCollector {
    /// Create a collector whose jobs share `options` and write below `output_dir`.
    pub fn new(options: Arc<OptimizeOptions>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            options,
            output_dir: output_dir.into(),
        }
    }

    /// Collect jobs from every root, root by root.
    pub fn collect_all(&self, roots: &[PathBuf]) -> Vec<Job> {
        roots.iter().flat_map(|root| self.collect(root)).collect()
    }

    /// Recursively collect jobs under one root.
    ///
    /// Relative paths are computed against `root`, so the same folder used by
    /// a later batch gets fresh relative paths. Jobs come out in directory
    /// listing order; nothing downstream depends on it.
    pub fn collect(&self, root: &Path) -> Vec<Job> {
        if !root.exists() {
            tracing::warn!("Input directory does not exist: {:?}", root);
            return Vec::new();
        }

        let mut jobs = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_image_file(entry.file_name()) {
                continue;
            }

            let input = entry.path().to_path_buf();
            let relative = input
                .strip_prefix(root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(entry.file_name()));
            jobs.push(Job {
                input,
                options: Arc::clone(&self.options),
                output_dir: self.output_dir.clone(),
                relative,
            });
        }

        tracing::debug!("Collected {} image(s) under {:?}", jobs.len(), root);
        jobs
    }
}

/// Check whether a filename ends with a recognized image extension.
pub fn is_image_file(file_name: &std::ffi::OsStr) -> bool {
    let lower = file_name.to_string_lossy().to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::fs;

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(OsStr::new("test.jpg")));
        assert!(is_image_file(OsStr::new("test.JPG")));
        assert!(is_image_file(OsStr::new("test.jpeg")));
        assert!(is_image_file(OsStr::new("test.png")));
        assert!(is_image_file(OsStr::new("logo.svg")));
        assert!(is_image_file(OsStr::new("shot.avif")));
        assert!(!is_image_file(OsStr::new("test.tiff")));
        assert!(!is_image_file(OsStr::new("notes.txt")));
        assert!(!is_image_file(OsStr::new("jpg")));
    }

    #[test]
    fn test_collect_recurses_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/deep")).unwrap();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("a/cat.png"), b"x").unwrap();
        fs::write(root.join("a/deep/owl.webp"), b"x").unwrap();
        fs::write(root.join("b/dog.JPG"), b"x").unwrap();
        fs::write(root.join("b/readme.md"), b"x").unwrap();
        fs::write(root.join("top.gif"), b"x").unwrap();

        let collector = JobCollector::new(Arc::new(OptimizeOptions::default()), "/out");
        let jobs = collector.collect(root);

        let mut relative: Vec<PathBuf> = jobs.iter().map(|j| j.relative.clone()).collect();
        relative.sort();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a/cat.png"),
                PathBuf::from("a/deep/owl.webp"),
                PathBuf::from("b/dog.JPG"),
                PathBuf::from("top.gif"),
            ]
        );
        assert!(jobs.iter().all(|j| j.output_dir == Path::new("/out")));
        assert!(jobs.iter().all(|j| j.input.starts_with(root)));
    }

    #[test]
    fn test_collect_all_uses_each_root() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(first.path().join("one.png"), b"x").unwrap();
        fs::create_dir_all(second.path().join("g")).unwrap();
        fs::write(second.path().join("g/two.png"), b"x").unwrap();

        let collector = JobCollector::new(Arc::new(OptimizeOptions::default()), "/out");
        let jobs =
            collector.collect_all(&[first.path().to_path_buf(), second.path().to_path_buf()]);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].relative, PathBuf::from("one.png"));
        assert_eq!(jobs[1].relative, PathBuf::from("g/two.png"));
    }

    #[test]
    fn test_collect_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let collector = JobCollector::new(Arc::new(OptimizeOptions::default()), "/out");
        assert!(collector.collect(&dir.path().join("nope")).is_empty());
    }

    #[test]
    fn test_jobs_share_options() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        fs::write(dir.path().join("b.png"), b"x").unwrap();

        let options = Arc::new(OptimizeOptions {
            width: Some(300),
            ..Default::default()
        });
        let collector = JobCollector::new(Arc::clone(&options), "/out");
        let jobs = collector.collect(dir.path());
        assert!(jobs.iter().all(|j| Arc::ptr_eq(&j.options, &options)));
    }
}
