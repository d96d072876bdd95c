#![forbid(unsafe_code)]

//! Cell offsets that center an image on the screen.

use crate::dimension::Axis;
use crate::geometry::ScreenSize;

/// Offset in cells `(x, y)` that centers an `image_width` x `image_height`
/// pixel image on `screen`.
///
/// Both offsets are clamped at 0: an image wider or taller than the screen
/// starts at the left or top edge. When the pixel-per-cell ratio is unknown
/// (no cell count, or fewer pixels than cells) it is taken as 1.
#[must_use]
pub fn center(image_width: u32, image_height: u32, screen: &ScreenSize) -> (u32, u32) {
    (
        axis_offset(image_width, screen, Axis::Horizontal),
        axis_offset(image_height, screen, Axis::Vertical),
    )
}

fn axis_offset(image: u32, screen: &ScreenSize, axis: Axis) -> u32 {
    let free = i64::from(screen.pixels(axis)) - i64::from(image);
    if free <= 0 {
        return 0;
    }
    let per_cell = screen.cell_pixels(axis).unwrap_or(1);
    // free / 2 fits in u32 since free <= u32::MAX.
    u32::try_from(free / 2).unwrap_or(u32::MAX) / per_cell
}
