//! Fixed-frame compositor: crop, rotate and scale source pixels into an
//! output raster whose dimensions never change.
//!
//! The transform is an inverse mapping. For every output pixel the matching
//! point in the crop is found by undoing the frame-centre translation, the
//! rotation and the scale, then sampled bilinearly. Anything that lands
//! outside the crop stays white, and semi-transparent source pixels are
//! blended over that white fill so the result is always fully opaque.
//!
//! When the final scale shrinks the crop, it is first resized with Lanczos3
//! so downsampling does not alias. The residual scale after that resize is
//! tracked per axis.

use super::calculations::{
    clamp_scale, cover_scale, crop_rect, normalize_rotation, preview_dimensions,
};
use super::params::Dimensions;
use crate::region::{Adjustment, Region};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompositeError {
    #[error("invalid source: {0}")]
    InvalidSource(String),
}

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Crop `region` out of `source` and render it into a `frame`-sized raster.
///
/// The output is always exactly `frame.width × frame.height`.
pub fn composite(
    source: &RgbaImage,
    region: &Region,
    adjustment: &Adjustment,
    frame: Dimensions,
) -> Result<RgbaImage, CompositeError> {
    let crop = crop_source(source, region)?;
    render_frame(&crop, adjustment, frame)
}

/// Same transform as [`composite`] at a reduced preview frame that keeps the
/// target's aspect ratio.
pub fn preview(
    source: &RgbaImage,
    region: &Region,
    adjustment: &Adjustment,
    target: Dimensions,
    preview_width: u32,
) -> Result<RgbaImage, CompositeError> {
    composite(
        source,
        region,
        adjustment,
        preview_dimensions(target, preview_width),
    )
}

/// Extract the pixels `region` covers.
pub fn crop_source(source: &RgbaImage, region: &Region) -> Result<RgbaImage, CompositeError> {
    if source.width() == 0 || source.height() == 0 {
        return Err(CompositeError::InvalidSource("source raster is empty".into()));
    }

    let rect = crop_rect(region, Dimensions::new(source.width(), source.height()));
    if rect.width == 0 || rect.height == 0 {
        return Err(CompositeError::InvalidSource(format!(
            "crop of {}×{} at ({}, {}) has zero area",
            rect.width, rect.height, rect.x, rect.y
        )));
    }

    Ok(imageops::crop_imm(source, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// Render `content` centred in a `frame`, cover-fitted, then rotated and
/// scaled by `adjustment`.
///
/// Used both for fresh extractions (content is the crop) and for
/// post-extraction adjustments (content is the extraction-time frame).
pub fn render_frame(
    content: &RgbaImage,
    adjustment: &Adjustment,
    frame: Dimensions,
) -> Result<RgbaImage, CompositeError> {
    if content.width() == 0 || content.height() == 0 {
        return Err(CompositeError::InvalidSource("content raster is empty".into()));
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(CompositeError::InvalidSource(format!(
            "output frame {frame} has zero area"
        )));
    }

    let content_dims = Dimensions::new(content.width(), content.height());
    let rotation = normalize_rotation(adjustment.rotation_degrees).to_radians();
    let final_scale =
        cover_scale(content_dims, frame) * clamp_scale(adjustment.scale_percent) / 100.0;

    let (sampled, scale_x, scale_y) = prefilter(content, final_scale);
    let (sin, cos) = rotation.sin_cos();
    let half_fw = frame.width as f64 / 2.0;
    let half_fh = frame.height as f64 / 2.0;
    let cw = sampled.width() as f64;
    let ch = sampled.height() as f64;

    let mut out = RgbaImage::from_pixel(frame.width, frame.height, WHITE);
    for (ox, oy, pixel) in out.enumerate_pixels_mut() {
        let dx = ox as f64 + 0.5 - half_fw;
        let dy = oy as f64 + 0.5 - half_fh;

        // Undo the clockwise rotation, then the scale.
        let sx = (cos * dx + sin * dy) / scale_x + cw / 2.0;
        let sy = (-sin * dx + cos * dy) / scale_y + ch / 2.0;
        if sx < 0.0 || sy < 0.0 || sx > cw || sy > ch {
            continue;
        }

        *pixel = over_white(sample_bilinear(&sampled, sx, sy));
    }

    Ok(out)
}

/// Downscale with Lanczos3 when the transform shrinks the content.
///
/// Returns the buffer to sample from plus the residual scale on each axis.
fn prefilter(content: &RgbaImage, final_scale: f64) -> (Cow<'_, RgbaImage>, f64, f64) {
    if final_scale >= 1.0 {
        return (Cow::Borrowed(content), final_scale, final_scale);
    }

    let cw = content.width() as f64;
    let ch = content.height() as f64;
    let w = ((cw * final_scale).round() as u32).max(1);
    let h = ((ch * final_scale).round() as u32).max(1);
    let resized = imageops::resize(content, w, h, FilterType::Lanczos3);

    let residual_x = final_scale * cw / w as f64;
    let residual_y = final_scale * ch / h as f64;
    (Cow::Owned(resized), residual_x, residual_y)
}

/// Bilinear sample at continuous coordinates where pixel `i` spans `[i, i+1)`.
/// Neighbours past the edge clamp to the border pixel.
fn sample_bilinear(img: &RgbaImage, x: f64, y: f64) -> [f64; 4] {
    let max_x = img.width() as i64 - 1;
    let max_y = img.height() as i64 - 1;

    let u = x - 0.5;
    let v = y - 0.5;
    let x0 = u.floor();
    let y0 = v.floor();
    let fx = u - x0;
    let fy = v - y0;

    let px = |ix: i64, iy: i64| img.get_pixel(ix.clamp(0, max_x) as u32, iy.clamp(0, max_y) as u32);
    let (x0, y0) = (x0 as i64, y0 as i64);
    let p00 = px(x0, y0);
    let p10 = px(x0 + 1, y0);
    let p01 = px(x0, y0 + 1);
    let p11 = px(x0 + 1, y0 + 1);

    let mut out = [0.0; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        *slot = top * (1.0 - fy) + bottom * fy;
    }
    out
}

fn over_white(rgba: [f64; 4]) -> Rgba<u8> {
    let alpha = rgba[3] / 255.0;
    let blend = |c: f64| (c * alpha + 255.0 * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8;
    Rgba([blend(rgba[0]), blend(rgba[1]), blend(rgba[2]), 255])
}
