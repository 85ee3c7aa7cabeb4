//! Pure extent-to-pixel calculations for the compositor.
//!
//! Raster rows run top to bottom while project y grows upward, so the y axis
//! is flipped: row 0 sits at `frame.ymax`.

use crate::types::Extent;

/// Integer pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fractional pixel bounds `(x0, y0, x1, y1)` of `region` inside a
/// `width` x `height` raster that covers `frame`.
fn pixel_bounds(frame: &Extent, region: &Extent, width: u32, height: u32) -> (f64, f64, f64, f64) {
    let sx = f64::from(width) / frame.width();
    let sy = f64::from(height) / frame.height();
    (
        (region.xmin - frame.xmin) * sx,
        (frame.ymax - region.ymax) * sy,
        (region.xmax - frame.xmin) * sx,
        (frame.ymax - region.ymin) * sy,
    )
}

fn to_rect(x0: f64, y0: f64, x1: f64, y1: f64, width: u32, height: u32) -> Option<PixelRect> {
    let clamp_x = |v: f64| v.clamp(0.0, f64::from(width)) as u32;
    let clamp_y = |v: f64| v.clamp(0.0, f64::from(height)) as u32;
    let (x0, x1) = (clamp_x(x0), clamp_x(x1));
    let (y0, y1) = (clamp_y(y0), clamp_y(y1));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(PixelRect {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// Pixels of a layer raster that contribute to `region`.
///
/// Rounds outward so partially covered edge pixels are still read.
pub fn source_window(frame: &Extent, region: &Extent, width: u32, height: u32) -> Option<PixelRect> {
    let (x0, y0, x1, y1) = pixel_bounds(frame, region, width, height);
    to_rect(x0.floor(), y0.floor(), x1.ceil(), y1.ceil(), width, height)
}

/// Pixels of the output image that `region` lands on.
///
/// Rounds to the nearest pixel edge so neighbouring layers line up.
pub fn target_window(frame: &Extent, region: &Extent, width: u32, height: u32) -> Option<PixelRect> {
    let (x0, y0, x1, y1) = pixel_bounds(frame, region, width, height);
    to_rect(x0.round(), y0.round(), x1.round(), y1.round(), width, height)
}
