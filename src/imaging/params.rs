//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They sit between the
//! high-level [`operations`](super::operations) module (which decides how many
//! encode passes to run) and the [`backend`](super::backend) (which does the
//! actual codec work).
//!
//! ## Types
//!
//! - [`OutputFormat`]: JPEG or PNG, with file extension.
//! - [`Quality`]: Lossy encoding quality in hundredths (0–100, default 92).
//!   Kept as an integer so the quality ladder never drifts.
//! - [`Dimensions`]: Width × height in pixels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoded output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension used when the image is written out.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Png => write!(f, "png"),
        }
    }
}

/// Quality setting for lossy encoding, stored in hundredths (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u32);

impl Quality {
    /// Lowest quality the size-constrained encoder will step down to.
    pub const FLOOR: Quality = Quality(10);
    /// Amount removed from the quality on every re-encode pass.
    pub const STEP: u32 = 5;

    pub fn new(hundredths: u32) -> Self {
        Self(hundredths.min(100))
    }

    /// Build from a `0.0..=1.0` fraction, rounding to the nearest hundredth.
    pub fn from_fraction(fraction: f32) -> Self {
        let clamped = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        Self((clamped * 100.0).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn as_fraction(self) -> f32 {
        self.0 as f32 / 100.0
    }

    /// JPEG encoder quality (1-100). Zero is not accepted by the codec.
    pub fn jpeg_quality(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }

    /// Next rung down the quality ladder, never below [`Quality::FLOOR`].
    pub fn step_down(self) -> Self {
        Self(self.0.saturating_sub(Self::STEP).max(Self::FLOOR.0))
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(92)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_fraction())
    }
}

/// Width × height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}
