#![forbid(unsafe_code)]

//! Vector images, rasterized on white into a square canvas.

use std::path::Path;

use image::{DynamicImage, RgbaImage};
use resvg::{tiny_skia, usvg};

use crate::error::ImageError;

/// Canvas side when the caller asks for the intrinsic size.
pub const DEFAULT_SIDE: u32 = 200;

/// Whether `path` names an SVG file.
#[must_use]
pub fn is_svg(path: &Path) -> bool {
    path.to_string_lossy().to_ascii_lowercase().contains(".svg")
}

/// Side of the square canvas for a requested target box: the larger of the
/// two, or [`DEFAULT_SIDE`] when both are 0.
#[must_use]
pub fn canvas_side(width: u32, height: u32) -> u32 {
    match width.max(height) {
        0 => DEFAULT_SIDE,
        side => side,
    }
}

/// Rasterize SVG `data` onto a white `side` x `side` canvas, stretching the
/// drawing to fill it.
///
/// # Errors
///
/// [`ImageError::Svg`] if the document cannot be parsed or the canvas
/// cannot be allocated.
pub fn rasterize(data: &[u8], side: u32) -> Result<DynamicImage, ImageError> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default())
        .map_err(|err| ImageError::Svg(err.to_string()))?;
    let mut pixmap = tiny_skia::Pixmap::new(side, side)
        .ok_or_else(|| ImageError::Svg(format!("cannot allocate a {side}x{side} canvas")))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let size = tree.size();
    let transform = tiny_skia::Transform::from_scale(
        side as f32 / size.width(),
        side as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // The canvas is opaque, so premultiplied and straight alpha agree.
    RgbaImage::from_raw(side, side, pixmap.take())
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ImageError::Svg("canvas size mismatch".into()))
}
