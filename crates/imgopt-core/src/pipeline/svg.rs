//! SVG inputs, rasterized at their intrinsic size with `resvg`.

use image::{DynamicImage, RgbaImage};
use resvg::{tiny_skia, usvg};
use std::path::Path;

use super::backend::BackendError;
use super::resize::Dimensions;

/// SVG is recognized by extension; the `image` crate has no sniffer for it.
pub fn is_svg(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

fn parse(data: &[u8]) -> Result<usvg::Tree, BackendError> {
    Ok(usvg::Tree::from_data(data, &usvg::Options::default())?)
}

/// Intrinsic size (width/height attributes, else the viewBox), rounded up.
pub fn dimensions(data: &[u8]) -> Result<Dimensions, BackendError> {
    let size = parse(data)?.size().to_int_size();
    Ok(Dimensions::new(size.width(), size.height()))
}

/// Render to straight-alpha RGBA8.
pub fn rasterize(data: &[u8]) -> Result<DynamicImage, BackendError> {
    let tree = parse(data)?;
    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        BackendError::Decode(format!("cannot allocate a {width}x{height} canvas"))
    })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let pixels = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(width, height, pixels)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| BackendError::Decode("rendered SVG buffer has the wrong size".to_string()))
}
