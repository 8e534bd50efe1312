//! Image backend: probing, pixel operations and encoding.
//!
//! [`ImageBackend`] keeps the processor independent of the pixel library.
//! The production implementation is [`RustBackend`] on top of the `image`
//! crate, with AVIF inputs decoded by `rav1d` and SVG inputs rasterized by
//! `resvg`. Every call is synchronous; the worker pool runs the processor on
//! blocking threads.

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use super::resize::{Dimensions, ResizePlan};
use super::{avif, svg};
use crate::types::OutputFormat;

/// rav1e speed preset (1 slowest, 10 fastest).
const AVIF_SPEED: u8 = 6;
const DEFAULT_AVIF_QUALITY: u8 = 50;
const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("SVG error: {0}")]
    Svg(#[from] resvg::usvg::Error),
    #[error("Unsupported format: {0}")]
    Unsupported(String),
}

/// Header-level facts about an image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub dimensions: Dimensions,
    /// Detected container format ("jpeg", "png", ...)
    pub format: String,
}

/// Operations the processor needs from a pixel library.
pub trait ImageBackend: Send + Sync {
    type Image: Send;

    /// Read dimensions and format without decoding pixels.
    fn probe(&self, path: &Path) -> Result<ImageInfo, BackendError>;

    fn decode(&self, path: &Path) -> Result<Self::Image, BackendError>;

    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    fn resize(&self, image: Self::Image, plan: &ResizePlan) -> Self::Image;

    /// Crop away borders whose pixels are within `threshold` of black.
    fn trim(&self, image: Self::Image, threshold: u8) -> Self::Image;

    fn blur(&self, image: Self::Image, sigma: f32) -> Self::Image;

    fn grayscale(&self, image: Self::Image) -> Self::Image;

    /// Encode into an in-memory buffer.
    fn encode(
        &self,
        image: &Self::Image,
        format: OutputFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, BackendError>;
}

/// Backend built on the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn probe(&self, path: &Path) -> Result<ImageInfo, BackendError> {
        if svg::is_svg(path) {
            return Ok(ImageInfo {
                dimensions: svg::dimensions(&fs::read(path)?)?,
                format: "svg".to_string(),
            });
        }

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let detected = reader
            .format()
            .or_else(|| ImageFormat::from_path(path).ok());
        let format = detected
            .map(format_to_string)
            .unwrap_or_else(|| "unknown".to_string());
        let dimensions = if detected == Some(ImageFormat::Avif) {
            avif::dimensions(&fs::read(path)?)?
        } else {
            let (width, height) = reader.into_dimensions()?;
            Dimensions::new(width, height)
        };
        Ok(ImageInfo { dimensions, format })
    }

    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        if svg::is_svg(path) {
            return svg::rasterize(&fs::read(path)?);
        }

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let detected = reader
            .format()
            .or_else(|| ImageFormat::from_path(path).ok());
        if detected == Some(ImageFormat::Avif) {
            return avif::decode(&fs::read(path)?);
        }
        Ok(reader.decode()?)
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        let (width, height) = image.dimensions();
        Dimensions::new(width, height)
    }

    fn resize(&self, image: DynamicImage, plan: &ResizePlan) -> DynamicImage {
        let scaled = if self.dimensions(&image) == plan.scaled {
            image
        } else {
            image.resize_exact(plan.scaled.width, plan.scaled.height, FilterType::Lanczos3)
        };
        match plan.crop {
            Some(crop) => scaled.crop_imm(crop.x, crop.y, crop.width, crop.height),
            None => scaled,
        }
    }

    fn trim(&self, image: DynamicImage, threshold: u8) -> DynamicImage {
        match content_bounds(&image, threshold) {
            Some((x, y, width, height)) => {
                if (x, y, width, height) == (0, 0, image.width(), image.height()) {
                    image
                } else {
                    image.crop_imm(x, y, width, height)
                }
            }
            // All background: nothing sensible to keep, leave it as is
            None => image,
        }
    }

    fn blur(&self, image: DynamicImage, sigma: f32) -> DynamicImage {
        if sigma > 0.0 {
            image.blur(sigma)
        } else {
            image
        }
    }

    fn grayscale(&self, image: DynamicImage) -> DynamicImage {
        image.grayscale()
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, BackendError> {
        let mut buffer = Vec::new();
        match format {
            OutputFormat::Avif => {
                let encoder = AvifEncoder::new_with_speed_quality(
                    &mut buffer,
                    AVIF_SPEED,
                    quality.unwrap_or(DEFAULT_AVIF_QUALITY),
                );
                image.write_with_encoder(encoder)?;
            }
            OutputFormat::Jpeg | OutputFormat::Jpg => {
                let encoder = JpegEncoder::new_with_quality(
                    &mut buffer,
                    quality.unwrap_or(DEFAULT_JPEG_QUALITY),
                );
                // JPEG carries no alpha and only 8-bit samples
                match image {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => {
                        image.write_with_encoder(encoder)?
                    }
                    _ => DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?,
                }
            }
            OutputFormat::Png => {
                image.write_with_encoder(PngEncoder::new(&mut buffer))?;
            }
            OutputFormat::Webp => {
                // Only the lossless WebP encoder is available; quality does not apply
                let encoder = WebPEncoder::new_lossless(&mut buffer);
                DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)?;
            }
            OutputFormat::Gif => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Gif)?;
            }
            OutputFormat::Bmp => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Bmp)?;
            }
            OutputFormat::Tiff | OutputFormat::Tif => {
                image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Tiff)?;
            }
            OutputFormat::Heif | OutputFormat::Heic => {
                return Err(BackendError::Unsupported(format!(
                    "no {format} encoder is available"
                )));
            }
        }
        Ok(buffer)
    }
}

/// Bounding box `(x, y, width, height)` of pixels that differ from black by
/// more than `threshold` in any color channel. Fully transparent pixels count
/// as background. `None` when every pixel is background.
pub fn content_bounds(image: &DynamicImage, threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.pixels() {
        let [r, g, b, a] = pixel.0;
        if a == 0 || (r <= threshold && g <= threshold && b <= threshold) {
            continue;
        }
        found = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Convert an ImageFormat to the lowercase name used in reports.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Avif => "avif",
        ImageFormat::Ico => "ico",
        _ => "unknown",
    }
    .to_string()
}
