//! Per-image processing: probe, transform, encode and write one job.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::{JobError, JobErrorKind};
use crate::types::{ImageStats, Job, JobOutcome, OutputFormat};

use super::backend::{ImageBackend, ImageInfo, RustBackend};
use super::naming;
use super::pool::JobRunner;
use super::resize::{plan_resize, target_dimensions, Fit};

/// Runs one job end to end and turns every failure into a [`JobError`].
pub struct ImageProcessor<B: ImageBackend = RustBackend> {
    backend: B,
    write_attempts: u32,
    retry_delay: Duration,
}

impl ImageProcessor<RustBackend> {
    /// Create a processor on the `image` crate backend.
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_backend(RustBackend::new(), config)
    }
}

impl<B: ImageBackend> ImageProcessor<B> {
    pub fn with_backend(backend: B, config: &PipelineConfig) -> Self {
        Self {
            backend,
            write_attempts: config.write_attempts.max(1),
            retry_delay: config.write_retry_delay(),
        }
    }

    /// Process a single job.
    ///
    /// Steps run in a fixed order: existence check, output directory,
    /// probe, decode, resize, trim, blur, grayscale, encode + write
    /// (retried), then verification of the written file.
    pub fn process(&self, job: &Job) -> JobOutcome {
        let input = job.input.as_path();
        let options = job.options.as_ref();
        tracing::debug!("Processing: {:?}", input);

        if !input.exists() {
            return Err(JobError::new(
                JobErrorKind::InputMissing,
                input,
                "input file does not exist",
            ));
        }

        let output = naming::output_path(job);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                JobError::new(
                    JobErrorKind::WriteFailed,
                    input,
                    format!("cannot create {}: {e}", parent.display()),
                )
            })?;
        }

        let info = self.backend.probe(input).map_err(|e| {
            JobError::new(
                JobErrorKind::MetadataUnavailable,
                input,
                format!("could not get image dimensions: {e}"),
            )
        })?;
        let original_size = fs::metadata(input)
            .map(|m| m.len())
            .map_err(|e| JobError::new(JobErrorKind::InputMissing, input, e.to_string()))?;

        let image = self
            .backend
            .decode(input)
            .map_err(|e| JobError::new(JobErrorKind::DecodeFailed, input, e.to_string()))?;

        let original = info.dimensions;
        let target = target_dimensions(original, options);
        let plan = plan_resize(original, target, Fit::for_options(options));
        tracing::trace!("  Resize {} -> {} ({:?})", original, plan.output(), plan);

        let mut image = if plan.is_noop(original) {
            image
        } else {
            self.backend.resize(image, &plan)
        };
        if options.trim_black_borders {
            image = self.backend.trim(image, options.trim_threshold());
        }
        if let Some(sigma) = options.blur {
            image = self.backend.blur(image, sigma);
        }
        if options.grayscale {
            image = self.backend.grayscale(image);
        }

        let format = encode_format(input, options.format, &info).ok_or_else(|| {
            JobError::new(
                JobErrorKind::WriteFailed,
                input,
                format!("no encoder for source format {}", info.format),
            )
        })?;
        self.write_with_retry(&image, format, options.quality, &output)
            .map_err(|message| JobError::new(JobErrorKind::WriteFailed, input, message))?;

        let optimized_size = fs::metadata(&output)
            .map(|m| m.len())
            .map_err(|e| JobError::new(JobErrorKind::WriteFailed, input, e.to_string()))?;
        if optimized_size == 0 {
            // Leaving it would make skip-existing treat the job as done
            let _ = fs::remove_file(&output);
            return Err(JobError::new(
                JobErrorKind::EmptyOutput,
                input,
                "output file was created but is empty",
            ));
        }

        // Report what landed on disk; the in-memory size is a last resort
        let final_dims = self
            .backend
            .probe(&output)
            .map(|written| written.dimensions)
            .unwrap_or_else(|_| self.backend.dimensions(&image));

        Ok(ImageStats {
            width: final_dims.width,
            height: final_dims.height,
            original_format: info.format.clone(),
            original_resolution: original.to_string(),
            original_size,
            optimized_size,
            format: options
                .format
                .map(|f| f.extension().to_string())
                .unwrap_or(info.format),
        })
    }

    /// Encode and write, retrying the whole step up to `write_attempts` times.
    ///
    /// Bytes go to a temporary sibling that is renamed into place, so a
    /// failed attempt never leaves a partial file at the output path.
    fn write_with_retry(
        &self,
        image: &B::Image,
        format: OutputFormat,
        quality: Option<u8>,
        output: &Path,
    ) -> Result<(), String> {
        let temp = temp_path(output);
        let mut last_error = String::new();

        for attempt in 1..=self.write_attempts {
            if attempt > 1 {
                tracing::debug!(
                    "Retry {}/{} writing {:?} after {:?}",
                    attempt - 1,
                    self.write_attempts - 1,
                    output,
                    self.retry_delay
                );
                std::thread::sleep(self.retry_delay);
            }

            let result = self
                .backend
                .encode(image, format, quality)
                .map_err(|e| e.to_string())
                .and_then(|bytes| {
                    fs::write(&temp, bytes)
                        .and_then(|_| fs::rename(&temp, output))
                        .map_err(|e| e.to_string())
                });

            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let _ = fs::remove_file(&temp);
                    tracing::debug!("Write attempt {attempt} for {:?} failed: {e}", output);
                    last_error = e;
                }
            }
        }

        Err(format!(
            "failed after {} attempt(s): {last_error}",
            self.write_attempts
        ))
    }
}

impl<B: ImageBackend + 'static> JobRunner for ImageProcessor<B> {
    fn run(&self, job: &Job) -> JobOutcome {
        self.process(job)
    }
}

/// The explicit format, else the detected source format, else the extension.
fn encode_format(
    input: &Path,
    requested: Option<OutputFormat>,
    info: &ImageInfo,
) -> Option<OutputFormat> {
    requested
        .or_else(|| OutputFormat::parse(&info.format))
        .or_else(|| {
            input
                .extension()
                .and_then(|e| OutputFormat::parse(&e.to_string_lossy()))
        })
}

fn temp_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    output.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::backend::tests::{framed, write_avif, write_png, write_svg};
    use crate::pipeline::backend::BackendError;
    use crate::pipeline::resize::{Dimensions, ResizePlan};
    use crate::types::OptimizeOptions;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            write_retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn job_for(root: &Path, out: &Path, relative: &str, options: OptimizeOptions) -> Job {
        Job {
            input: root.join(relative),
            options: Arc::new(options),
            output_dir: out.to_path_buf(),
            relative: PathBuf::from(relative),
        }
    }

    #[test]
    fn test_process_resizes_and_writes_avif() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "a/cat.png", 80, 60);

        let options = OptimizeOptions {
            width: Some(40),
            keep_aspect: true,
            format: Some(OutputFormat::Avif),
            quality: Some(60),
            ..Default::default()
        };
        let job = job_for(input.path(), output.path(), "a/cat.png", options);
        let stats = ImageProcessor::new(&fast_config()).process(&job).unwrap();

        assert!(output.path().join("a/cat.optimized.avif").is_file());
        assert_eq!((stats.width, stats.height), (40, 30));
        assert_eq!(stats.original_format, "png");
        assert_eq!(stats.original_resolution, "80x60");
        assert_eq!(stats.format, "avif");
        assert!(stats.optimized_size > 0);
        assert_eq!(
            stats.original_size,
            fs::metadata(input.path().join("a/cat.png")).unwrap().len()
        );
    }

    #[test]
    fn test_process_keeps_source_format() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "dog.png", 30, 20);

        let job = job_for(input.path(), output.path(), "dog.png", OptimizeOptions::default());
        let stats = ImageProcessor::new(&fast_config()).process(&job).unwrap();

        assert!(output.path().join("dog.optimized.png").is_file());
        assert_eq!(stats.format, "png");
        assert_eq!((stats.width, stats.height), (30, 20));
    }

    #[test]
    fn test_process_never_enlarges() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "small.png", 20, 10);

        let options = OptimizeOptions {
            width: Some(400),
            keep_aspect: true,
            crop: true,
            ..Default::default()
        };
        let job = job_for(input.path(), output.path(), "small.png", options);
        let stats = ImageProcessor::new(&fast_config()).process(&job).unwrap();
        assert_eq!((stats.width, stats.height), (20, 10));
    }

    #[test]
    fn test_process_trims_black_borders() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        framed(50, 40, 5)
            .save(input.path().join("shot.png"))
            .unwrap();

        let options = OptimizeOptions {
            trim_black_borders: true,
            ..Default::default()
        };
        let job = job_for(input.path(), output.path(), "shot.png", options);
        let stats = ImageProcessor::new(&fast_config()).process(&job).unwrap();
        assert_eq!((stats.width, stats.height), (40, 30));
        assert_eq!(stats.original_resolution, "50x40");
    }

    #[test]
    fn test_process_avif_input() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_avif(input.path(), "shot.avif", &framed(32, 24, 2));

        let options = OptimizeOptions {
            width: Some(16),
            keep_aspect: true,
            format: Some(OutputFormat::Png),
            ..Default::default()
        };
        let job = job_for(input.path(), output.path(), "shot.avif", options);
        let stats = ImageProcessor::new(&fast_config()).process(&job).unwrap();

        assert!(output.path().join("shot.optimized.png").is_file());
        assert_eq!((stats.width, stats.height), (16, 12));
        assert_eq!(stats.original_format, "avif");
        assert_eq!(stats.original_resolution, "32x24");
    }

    #[test]
    fn test_process_avif_to_avif_reads_back_output() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_avif(input.path(), "shot.avif", &framed(32, 24, 2));

        let job = job_for(input.path(), output.path(), "shot.avif", OptimizeOptions::default());
        let stats = ImageProcessor::new(&fast_config()).process(&job).unwrap();

        let written = output.path().join("shot.optimized.avif");
        let info = RustBackend::new().probe(&written).unwrap();
        assert_eq!(info.dimensions, Dimensions::new(32, 24));
        assert_eq!((stats.width, stats.height), (32, 24));
        assert_eq!(stats.format, "avif");
    }

    #[test]
    fn test_process_svg_input() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_svg(input.path(), "icons/logo.svg", 40, 20);

        let options = OptimizeOptions {
            format: Some(OutputFormat::Png),
            ..Default::default()
        };
        let job = job_for(input.path(), output.path(), "icons/logo.svg", options);
        let stats = ImageProcessor::new(&fast_config()).process(&job).unwrap();

        assert!(output.path().join("icons/logo.optimized.png").is_file());
        assert_eq!((stats.width, stats.height), (40, 20));
        assert_eq!(stats.original_format, "svg");
    }

    #[test]
    fn test_process_svg_needs_a_raster_format() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_svg(input.path(), "logo.svg", 40, 20);

        let job = job_for(input.path(), output.path(), "logo.svg", OptimizeOptions::default());
        let err = ImageProcessor::new(&fast_config()).process(&job).unwrap_err();
        assert_eq!(err.kind, JobErrorKind::WriteFailed);
        assert!(err.message.contains("svg"));
    }

    #[test]
    fn test_process_missing_input() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let job = job_for(input.path(), output.path(), "gone.png", OptimizeOptions::default());

        let err = ImageProcessor::new(&fast_config()).process(&job).unwrap_err();
        assert_eq!(err.kind, JobErrorKind::InputMissing);
        assert_eq!(err.path, input.path().join("gone.png"));
    }

    #[test]
    fn test_process_unreadable_metadata() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("broken.png"), b"not a png").unwrap();
        let job = job_for(input.path(), output.path(), "broken.png", OptimizeOptions::default());

        let err = ImageProcessor::new(&fast_config()).process(&job).unwrap_err();
        assert_eq!(err.kind, JobErrorKind::MetadataUnavailable);
        assert!(!output.path().join("broken.optimized.png").exists());
    }

    #[test]
    fn test_process_unsupported_encoder_fails_write() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "cat.png", 8, 8);

        let options = OptimizeOptions {
            format: Some(OutputFormat::Heic),
            ..Default::default()
        };
        let job = job_for(input.path(), output.path(), "cat.png", options);
        let err = ImageProcessor::new(&fast_config()).process(&job).unwrap_err();

        assert_eq!(err.kind, JobErrorKind::WriteFailed);
        assert!(err.message.contains("3 attempt"));
        assert!(!output.path().join("cat.optimized.heic").exists());
        assert!(!output.path().join("cat.optimized.heic.tmp").exists());
    }

    /// Delegates to the real backend but fails the first `failures` encodes.
    struct FlakyEncoder {
        inner: RustBackend,
        failures: u32,
        calls: AtomicU32,
        empty: bool,
    }

    impl FlakyEncoder {
        fn failing(failures: u32) -> Self {
            Self {
                inner: RustBackend::new(),
                failures,
                calls: AtomicU32::new(0),
                empty: false,
            }
        }
    }

    impl ImageBackend for FlakyEncoder {
        type Image = image::DynamicImage;

        fn probe(&self, path: &Path) -> Result<ImageInfo, BackendError> {
            self.inner.probe(path)
        }
        fn decode(&self, path: &Path) -> Result<Self::Image, BackendError> {
            self.inner.decode(path)
        }
        fn dimensions(&self, image: &Self::Image) -> Dimensions {
            self.inner.dimensions(image)
        }
        fn resize(&self, image: Self::Image, plan: &ResizePlan) -> Self::Image {
            self.inner.resize(image, plan)
        }
        fn trim(&self, image: Self::Image, threshold: u8) -> Self::Image {
            self.inner.trim(image, threshold)
        }
        fn blur(&self, image: Self::Image, sigma: f32) -> Self::Image {
            self.inner.blur(image, sigma)
        }
        fn grayscale(&self, image: Self::Image) -> Self::Image {
            self.inner.grayscale(image)
        }
        fn encode(
            &self,
            image: &Self::Image,
            format: OutputFormat,
            quality: Option<u8>,
        ) -> Result<Vec<u8>, BackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(Vec::new());
            }
            if call < self.failures {
                return Err(BackendError::Io(std::io::Error::other("disk hiccup")));
            }
            self.inner.encode(image, format, quality)
        }
    }

    /// Delegates to the real backend and records every call in order.
    #[derive(Default)]
    struct Recording {
        inner: RustBackend,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Recording {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ImageBackend for Recording {
        type Image = image::DynamicImage;

        fn probe(&self, path: &Path) -> Result<ImageInfo, BackendError> {
            self.record("probe");
            self.inner.probe(path)
        }
        fn decode(&self, path: &Path) -> Result<Self::Image, BackendError> {
            self.record("decode");
            self.inner.decode(path)
        }
        fn dimensions(&self, image: &Self::Image) -> Dimensions {
            self.inner.dimensions(image)
        }
        fn resize(&self, image: Self::Image, plan: &ResizePlan) -> Self::Image {
            self.record("resize");
            self.inner.resize(image, plan)
        }
        fn trim(&self, image: Self::Image, threshold: u8) -> Self::Image {
            self.record("trim");
            self.inner.trim(image, threshold)
        }
        fn blur(&self, image: Self::Image, sigma: f32) -> Self::Image {
            self.record("blur");
            self.inner.blur(image, sigma)
        }
        fn grayscale(&self, image: Self::Image) -> Self::Image {
            self.record("grayscale");
            self.inner.grayscale(image)
        }
        fn encode(
            &self,
            image: &Self::Image,
            format: OutputFormat,
            quality: Option<u8>,
        ) -> Result<Vec<u8>, BackendError> {
            self.record("encode");
            self.inner.encode(image, format, quality)
        }
    }

    #[test]
    fn test_steps_run_in_order() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        framed(60, 40, 4).save(input.path().join("shot.png")).unwrap();

        let options = OptimizeOptions {
            width: Some(30),
            keep_aspect: true,
            trim_black_borders: true,
            blur: Some(1.5),
            grayscale: true,
            ..Default::default()
        };
        let processor = ImageProcessor::with_backend(Recording::default(), &fast_config());
        let job = job_for(input.path(), output.path(), "shot.png", options);
        processor.process(&job).unwrap();

        assert_eq!(
            *processor.backend.calls.lock().unwrap(),
            ["probe", "decode", "resize", "trim", "blur", "grayscale", "encode", "probe"]
        );
    }

    #[test]
    fn test_optional_steps_are_skipped() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "cat.png", 20, 10);

        let processor = ImageProcessor::with_backend(Recording::default(), &fast_config());
        let job = job_for(input.path(), output.path(), "cat.png", OptimizeOptions::default());
        processor.process(&job).unwrap();

        assert_eq!(
            *processor.backend.calls.lock().unwrap(),
            ["probe", "decode", "encode", "probe"]
        );
    }

    #[test]
    fn test_process_grayscale_output() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "cat.png", 12, 8);

        let options = OptimizeOptions {
            grayscale: true,
            ..Default::default()
        };
        let job = job_for(input.path(), output.path(), "cat.png", options);
        ImageProcessor::new(&fast_config()).process(&job).unwrap();

        let written = image::open(output.path().join("cat.optimized.png"))
            .unwrap()
            .to_rgb8();
        assert!(written.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }

    #[test]
    fn test_write_retries_then_succeeds() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "cat.png", 8, 8);

        let processor = ImageProcessor::with_backend(FlakyEncoder::failing(2), &fast_config());
        let job = job_for(input.path(), output.path(), "cat.png", OptimizeOptions::default());
        processor.process(&job).unwrap();

        assert_eq!(processor.backend.calls.load(Ordering::SeqCst), 3);
        assert!(output.path().join("cat.optimized.png").is_file());
    }

    #[test]
    fn test_write_gives_up_after_attempts() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "cat.png", 8, 8);

        let processor = ImageProcessor::with_backend(FlakyEncoder::failing(3), &fast_config());
        let job = job_for(input.path(), output.path(), "cat.png", OptimizeOptions::default());
        let err = processor.process(&job).unwrap_err();

        assert_eq!(err.kind, JobErrorKind::WriteFailed);
        assert!(err.message.contains("disk hiccup"));
        assert_eq!(processor.backend.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_empty_output_is_rejected() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_png(input.path(), "cat.png", 8, 8);

        let backend = FlakyEncoder {
            empty: true,
            ..FlakyEncoder::failing(0)
        };
        let processor = ImageProcessor::with_backend(backend, &fast_config());
        let job = job_for(input.path(), output.path(), "cat.png", OptimizeOptions::default());
        let err = processor.process(&job).unwrap_err();

        assert_eq!(err.kind, JobErrorKind::EmptyOutput);
        assert!(!output.path().join("cat.optimized.png").exists());
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("/out/a/cat.optimized.avif")),
            PathBuf::from("/out/a/cat.optimized.avif.tmp")
        );
    }
}
