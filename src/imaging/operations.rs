//! High-level image operations.
//!
//! [`encode_bounded`] combines the backend encoder with density embedding and
//! walks a quality ladder until the encoded bytes fit the configured budget:
//!
//! 1. Encode at the starting quality and embed the density.
//! 2. PNG over budget: switch to JPEG once (never back) and re-encode at the
//!    starting quality.
//! 3. While still over budget and above [`Quality::FLOOR`], drop the quality by
//!    [`Quality::STEP`] and re-encode.
//!
//! Ending over budget at the floor is not an error. The result is flagged
//! with `budget_exceeded` and a warning is logged.

use super::backend::{BackendError, ImageBackend};
use super::density::{DensityError, embed_density};
use super::params::{OutputFormat, Quality};
use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Density(#[from] DensityError),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, EncodeError>;

/// What the encoder should produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeSettings {
    pub format: OutputFormat,
    pub quality: Quality,
    pub dpi: u16,
    pub max_bytes: usize,
}

/// Encoded bytes plus the settings that actually produced them.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub quality: Quality,
    /// PNG was abandoned for JPEG to meet the budget.
    pub downgraded: bool,
    /// Still over budget at the quality floor.
    pub budget_exceeded: bool,
}

/// Encode `raster` under `settings.max_bytes`, embedding `settings.dpi`.
pub fn encode_bounded(
    backend: &impl ImageBackend,
    raster: &RgbaImage,
    settings: &EncodeSettings,
) -> Result<EncodedImage> {
    let mut format = settings.format;
    let mut quality = settings.quality;
    let mut downgraded = false;

    let mut bytes = encode_once(backend, raster, format, quality, settings.dpi)?;

    if format == OutputFormat::Png && bytes.len() > settings.max_bytes {
        debug!(
            size = bytes.len(),
            max = settings.max_bytes,
            "PNG over budget, switching to JPEG"
        );
        format = OutputFormat::Jpeg;
        downgraded = true;
        bytes = encode_once(backend, raster, format, quality, settings.dpi)?;
    }

    while bytes.len() > settings.max_bytes && quality > Quality::FLOOR {
        quality = quality.step_down();
        bytes = encode_once(backend, raster, format, quality, settings.dpi)?;
    }

    let budget_exceeded = bytes.len() > settings.max_bytes;
    if budget_exceeded {
        warn!(
            size = bytes.len(),
            max = settings.max_bytes,
            %quality,
            "size budget exceeded at quality floor"
        );
    }

    Ok(EncodedImage {
        bytes,
        format,
        quality,
        downgraded,
        budget_exceeded,
    })
}

fn encode_once(
    backend: &impl ImageBackend,
    raster: &RgbaImage,
    format: OutputFormat,
    quality: Quality,
    dpi: u16,
) -> Result<Vec<u8>> {
    let encoded = backend.encode(raster, format, quality)?;
    let bytes = embed_density(encoded, format, dpi)?;
    debug!(%format, %quality, size = bytes.len(), "encoded");
    Ok(bytes)
}
