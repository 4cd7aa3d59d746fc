//! Pure calculation functions for the fixed-frame transform.
//!
//! All functions here are pure and testable without any pixel buffers.

use super::params::Dimensions;
use crate::region::Region;

/// Scale bounds applied to adjustment percentages before use.
pub const MIN_SCALE_PERCENT: f64 = 50.0;
pub const MAX_SCALE_PERCENT: f64 = 200.0;

/// Wrap a rotation into `[-180, 180)`.
///
/// Uses Euclidean modulo so negative inputs wrap forward:
/// `370 → 10`, `-200 → 160`, `180 → -180`.
pub fn normalize_rotation(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// Clamp a scale percentage into `[50, 200]`. NaN falls back to 100.
pub fn clamp_scale(percent: f64) -> f64 {
    if percent.is_nan() {
        return 100.0;
    }
    percent.clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT)
}

/// Pixel rectangle inside a source raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Map a fractional region onto a source raster.
///
/// Each edge is `round(fraction * dimension)`, then clamped so the rectangle
/// stays inside the raster. The result may have zero area when the region is
/// degenerate or the source is tiny.
pub fn crop_rect(region: &Region, source: Dimensions) -> CropRect {
    let sw = source.width as f64;
    let sh = source.height as f64;

    let x = ((region.x * sw).round().max(0.0) as u32).min(source.width);
    let y = ((region.y * sh).round().max(0.0) as u32).min(source.height);
    let width = ((region.width * sw).round().max(0.0) as u32).min(source.width - x);
    let height = ((region.height * sh).round().max(0.0) as u32).min(source.height - y);

    CropRect {
        x,
        y,
        width,
        height,
    }
}

/// Cover-fit scale: the smallest uniform scale at which `content` fully
/// covers `frame`. One axis matches exactly, the other overflows.
///
/// # Examples
/// ```
/// # use pageshot::imaging::cover_scale;
/// # use pageshot::imaging::Dimensions;
/// // 826×531 crop into a 413×531 frame: height already matches
/// assert_eq!(cover_scale(Dimensions::new(826, 531), Dimensions::new(413, 531)), 1.0);
/// ```
pub fn cover_scale(content: Dimensions, frame: Dimensions) -> f64 {
    let sx = frame.width as f64 / content.width as f64;
    let sy = frame.height as f64 / content.height as f64;
    sx.max(sy)
}

/// Preview frame with the target's aspect ratio at a fixed width.
pub fn preview_dimensions(target: Dimensions, preview_width: u32) -> Dimensions {
    let height =
        (preview_width as f64 * target.height as f64 / target.width as f64).round() as u32;
    Dimensions::new(preview_width, height.max(1))
}
