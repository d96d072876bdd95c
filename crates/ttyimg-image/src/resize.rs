#![forbid(unsafe_code)]

//! Fitting an image to the resolved target size.

use image::{DynamicImage, GenericImageView, imageops::FilterType};

/// How the image is fitted to the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResizeMode {
    /// Shrink to fit inside the box, keeping the aspect ratio. An image that
    /// already fits is left alone.
    #[default]
    Fit,
    /// Resize to exactly the box, ignoring the aspect ratio.
    Stretch,
    /// Center-crop to the box's aspect ratio, then resize to exactly the box.
    Crop,
}

const FILTER: FilterType = FilterType::Lanczos3;

/// The box an image of `source` size is fitted into.
///
/// A zero request means "unconstrained": both zero keeps the source size,
/// one zero derives that side from the aspect ratio.
#[must_use]
pub fn target_size(source: (u32, u32), requested: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    match requested {
        (0, 0) => source,
        (0, h) if src_h > 0 => (scale_side(h, src_w, src_h), h),
        (w, 0) if src_w > 0 => (w, scale_side(w, src_h, src_w)),
        (w, h) => (w, h),
    }
}

fn scale_side(known: u32, numerator: u32, denominator: u32) -> u32 {
    (f64::from(known) * f64::from(numerator) / f64::from(denominator)).round() as u32
}

/// Fit `image` into a `width` x `height` box (see [`target_size`]).
#[must_use]
pub fn resize(image: &DynamicImage, width: u32, height: u32, mode: ResizeMode) -> DynamicImage {
    let (orig_w, orig_h) = image.dimensions();
    let (target_w, target_h) = target_size((orig_w, orig_h), (width, height));
    if target_w == 0 || target_h == 0 || orig_w == 0 || orig_h == 0 {
        return image.clone();
    }

    let (new_w, new_h) = match mode {
        ResizeMode::Stretch | ResizeMode::Crop => (target_w, target_h),
        ResizeMode::Fit if orig_w <= target_w && orig_h <= target_h => (orig_w, orig_h),
        ResizeMode::Fit => scale_to_fit(orig_w, orig_h, target_w, target_h),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(?mode, orig_w, orig_h, new_w, new_h, "resizing image");

    match mode {
        ResizeMode::Crop => {
            let (x, y, w, h) = crop_window(orig_w, orig_h, new_w, new_h);
            image.crop_imm(x, y, w, h).resize_exact(new_w, new_h, FILTER)
        }
        _ if new_w == orig_w && new_h == orig_h => image.clone(),
        _ => image.resize_exact(new_w, new_h, FILTER),
    }
}

fn scale_to_fit(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let scale_w = f64::from(max_width) / f64::from(width);
    let scale_h = f64::from(max_height) / f64::from(height);
    let scale = scale_w.min(scale_h);

    let new_w = (f64::from(width) * scale).round().max(1.0) as u32;
    let new_h = (f64::from(height) * scale).round().max(1.0) as u32;
    (new_w.min(max_width), new_h.min(max_height))
}

/// Largest centered region of `src` with the target's aspect ratio, as
/// `(x, y, width, height)`.
fn crop_window(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32, u32, u32) {
    let (sw, sh) = (f64::from(src_w), f64::from(src_h));
    let (tw, th) = (f64::from(target_w), f64::from(target_h));

    let (crop_w, crop_h) = if sw / tw > sh / th {
        (((sh * tw / th) as u32).clamp(1, src_w), src_h)
    } else {
        (src_w, ((sw * th / tw) as u32).clamp(1, src_h))
    };
    ((src_w - crop_w) / 2, (src_h - crop_h) / 2, crop_w, crop_h)
}
