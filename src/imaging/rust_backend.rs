//! Pure Rust image backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::ImageReader` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (emits JFIF APP0) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! Both encoders receive an RGB8 buffer. The compositor already flattens
//! alpha over white, so dropping the channel loses nothing.

use super::backend::{BackendError, ImageBackend};
use super::params::{OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageReader, RgbaImage};
use std::path::Path;

/// Extensions accepted as page images.
const PAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Returns the file extensions that [`load_image`] can decode.
pub fn supported_input_extensions() -> &'static [&'static str] {
    PAGE_EXTENSIONS
}

/// Pure Rust backend using the `image` crate encoders.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk into RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage, BackendError> {
    let img = ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::DecodeFailed(format!("Failed to decode {}: {}", path.display(), e))
        })?;
    Ok(img.into_rgba8())
}

impl ImageBackend for RustBackend {
    fn encode(
        &self,
        raster: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let rgb = DynamicImage::ImageRgba8(raster.clone()).into_rgb8();
        let mut buf = Vec::new();

        let result = match format {
            OutputFormat::Jpeg => JpegEncoder::new_with_quality(&mut buf, quality.jpeg_quality())
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    ExtendedColorType::Rgb8,
                ),
            OutputFormat::Png => PngEncoder::new(&mut buf).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            ),
        };
        result.map_err(|e| BackendError::EncodeFailed(format!("{format}: {e}")))?;

        Ok(buf)
    }
}
