//! Pure dimension math for the resize step.
//!
//! Nothing here touches pixels or the filesystem; the backend receives a
//! finished [`ResizePlan`] and only executes it.

use crate::types::OptimizeOptions;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How the source is fitted into the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    /// Scale to cover the box, then center-crop the overflow
    Cover,
    /// Scale to fit inside the box, preserving aspect ratio
    Contain,
    /// Stretch to the box exactly
    Fill,
}

impl Fit {
    /// `cover` when cropping, `contain` when only keeping aspect, `fill` otherwise.
    pub fn for_options(options: &OptimizeOptions) -> Self {
        if options.crop {
            Fit::Cover
        } else if options.keep_aspect {
            Fit::Contain
        } else {
            Fit::Fill
        }
    }
}

/// Centered crop window applied after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scale to `scaled`, then optionally crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub scaled: Dimensions,
    pub crop: Option<Crop>,
}

impl ResizePlan {
    /// Dimensions of the image after the plan is applied.
    pub fn output(&self) -> Dimensions {
        match self.crop {
            Some(crop) => Dimensions::new(crop.width, crop.height),
            None => self.scaled,
        }
    }

    /// True when applying the plan would not change the image.
    pub fn is_noop(&self, original: Dimensions) -> bool {
        self.scaled == original && self.crop.is_none()
    }
}

/// Target box for a source image.
///
/// - width set + keep-aspect: height follows proportionally (rounded)
/// - width set without keep-aspect: original height is kept
/// - no width: the original dimensions
pub fn target_dimensions(original: Dimensions, options: &OptimizeOptions) -> Dimensions {
    match options.width {
        Some(width) if options.keep_aspect => {
            let height =
                (width as f64 / original.width as f64 * original.height as f64).round() as u32;
            Dimensions::new(width, height.max(1))
        }
        Some(width) => Dimensions::new(width, original.height),
        None => original,
    }
}

/// Plan a resize of `original` into `target` without ever enlarging.
pub fn plan_resize(original: Dimensions, target: Dimensions, fit: Fit) -> ResizePlan {
    let (w, h) = (original.width as f64, original.height as f64);
    let (tw, th) = (target.width as f64, target.height as f64);

    match fit {
        Fit::Fill => ResizePlan {
            scaled: Dimensions::new(
                target.width.min(original.width).max(1),
                target.height.min(original.height).max(1),
            ),
            crop: None,
        },
        Fit::Contain => {
            let scale = (tw / w).min(th / h).min(1.0);
            ResizePlan {
                scaled: scale_by(original, scale),
                crop: None,
            }
        }
        Fit::Cover => {
            let scale = (tw / w).max(th / h).min(1.0);
            let scaled = scale_by(original, scale);
            let width = target.width.min(scaled.width).max(1);
            let height = target.height.min(scaled.height).max(1);
            let crop = (width != scaled.width || height != scaled.height).then(|| Crop {
                x: (scaled.width - width) / 2,
                y: (scaled.height - height) / 2,
                width,
                height,
            });
            ResizePlan { scaled, crop }
        }
    }
}

fn scale_by(original: Dimensions, scale: f64) -> Dimensions {
    if scale >= 1.0 {
        return original;
    }
    Dimensions::new(
        ((original.width as f64 * scale).round() as u32).max(1),
        ((original.height as f64 * scale).round() as u32).max(1),
    )
}
