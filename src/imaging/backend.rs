//! Image encoding backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the single seam between pixel buffers and
//! encoded bytes: given a raster, a container format and a quality, produce
//! the encoded stream. Density metadata is *not* the backend's concern; the
//! [`operations`](super::operations) layer patches it in afterwards.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate's pure-Rust JPEG and PNG encoders.

use super::params::{OutputFormat, Quality};
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
    #[error("Decoding failed: {0}")]
    DecodeFailed(String),
}

/// Trait for image encoding backends.
pub trait ImageBackend: Sync {
    /// Encode a raster. Alpha is discarded for formats that do not carry it.
    fn encode(
        &self,
        raster: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
