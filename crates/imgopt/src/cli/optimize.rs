//! The `imgopt optimize` command: one ad-hoc batch from the command line.

use clap::Args;
use imgopt_core::config::validate_options;
use imgopt_core::{Config, OptimizeOptions, Optimizer, OutputFormat};
use std::path::PathBuf;

use super::progress::ProgressReporter;
use super::PipelineArgs;

/// Arguments for the `optimize` command.
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Input directories to scan recursively
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory (relative to the working directory)
    #[arg(short, long)]
    pub output: String,

    /// Target width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Encoder quality (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Output format (defaults to the source format)
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Gaussian blur sigma
    #[arg(long)]
    pub blur: Option<f32>,

    /// Convert to grayscale
    #[arg(long)]
    pub grayscale: bool,

    /// Derive the height from the width
    #[arg(long)]
    pub keep_aspect: bool,

    /// Cover-crop to the target box
    #[arg(long)]
    pub crop: bool,

    /// Trim near-black borders
    #[arg(long)]
    pub trim: bool,

    /// Tolerance for --trim
    #[arg(long, requires = "trim")]
    pub trim_threshold: Option<u8>,

    /// Write `name.ext` instead of `name.optimized.ext`
    #[arg(long)]
    pub omit_optimized: bool,

    /// Merge results into metadata.json at the output root
    #[arg(long)]
    pub metadata: bool,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

impl OptimizeArgs {
    /// Build the shared options record for this batch.
    pub fn options(&self) -> OptimizeOptions {
        OptimizeOptions {
            width: self.width,
            quality: self.quality,
            format: self.format,
            blur: self.blur,
            keep_aspect: self.keep_aspect,
            crop: self.crop,
            output_path: self.output.clone(),
            grayscale: self.grayscale,
            trim_black_borders: self.trim,
            trim_threshold: self.trim_threshold,
            omit_optimized: self.omit_optimized,
            output_metadata: self.metadata,
        }
    }

    fn resolved_inputs(&self) -> Vec<PathBuf> {
        self.inputs
            .iter()
            .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()))
            .collect()
    }
}

/// Execute the optimize command.
pub async fn execute(args: OptimizeArgs, config: Config, show_progress: bool) -> anyhow::Result<()> {
    let options = args.options();
    validate_options("optimize", &options)?;

    let inputs = args.resolved_inputs();
    if let Some(missing) = inputs.iter().find(|p| !p.is_dir()) {
        anyhow::bail!("Input directory not found: {}", missing.display());
    }

    let pipeline = args.pipeline.apply(config.pipeline)?;
    let optimizer = Optimizer::new(pipeline);
    let mut progress = ProgressReporter::new(show_progress && !args.pipeline.no_progress);

    let outcome = optimizer
        .optimize_images_with(&inputs, options, &mut progress)
        .await?;

    if outcome.summary.failed > 0 {
        tracing::warn!(
            "{} image(s) failed; see the warnings above",
            outcome.summary.failed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(inputs: Vec<PathBuf>, output: &str) -> OptimizeArgs {
        OptimizeArgs {
            inputs,
            output: output.to_string(),
            width: None,
            quality: None,
            format: None,
            blur: None,
            grayscale: false,
            keep_aspect: false,
            crop: false,
            trim: false,
            trim_threshold: None,
            omit_optimized: false,
            metadata: false,
            pipeline: PipelineArgs {
                workers: Some(2),
                no_progress: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_options_mapping() {
        let mut a = args(vec![PathBuf::from("in")], "out/");
        a.width = Some(750);
        a.quality = Some(70);
        a.format = Some(OutputFormat::Avif);
        a.trim = true;
        a.trim_threshold = Some(12);
        a.omit_optimized = true;

        let options = a.options();
        assert_eq!(options.width, Some(750));
        assert_eq!(options.quality, Some(70));
        assert_eq!(options.format, Some(OutputFormat::Avif));
        assert!(options.trim_black_borders);
        assert_eq!(options.trim_threshold(), 12);
        assert!(options.omit_optimized);
        assert_eq!(options.output_path, "out/");
    }

    #[tokio::test]
    async fn test_missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = args(vec![dir.path().join("nope")], "out/");
        let err = execute(a, Config::default(), false).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_rejects_negative_blur() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(vec![dir.path().to_path_buf()], "out/");
        a.blur = Some(-1.0);
        assert!(execute(a, Config::default(), false).await.is_err());
    }

    #[tokio::test]
    async fn test_optimizes_into_absolute_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        std::fs::create_dir_all(&input).unwrap();
        image::RgbImage::from_pixel(20, 10, image::Rgb([1, 2, 250]))
            .save(input.join("logo.png"))
            .unwrap();
        let output = dir.path().join("public");

        let mut a = args(vec![input], &output.to_string_lossy());
        a.grayscale = true;
        a.omit_optimized = true;
        execute(a, Config::default(), false).await.unwrap();

        assert!(output.join("logo.png").is_file());
    }
}
