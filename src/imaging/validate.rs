//! Output dimension check against the configured target.
//!
//! Purely informational: a failed validation is attached to the output image
//! and reported, it never stops an export.

use serde::Serialize;

/// Allowed deviation from each target dimension, as a fraction.
pub const TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub details: ValidationDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationDetails {
    pub width: u32,
    pub height: u32,
    /// Width divided by height, three decimals.
    pub aspect_ratio: String,
}

/// Compare actual dimensions against the target, each axis independently.
pub fn validate(
    actual_width: u32,
    actual_height: u32,
    target_width: u32,
    target_height: u32,
) -> Validation {
    let mut warnings = Vec::new();

    if exceeds_tolerance(actual_width, target_width) {
        warnings.push(format!(
            "width {actual_width}px deviates from target {target_width}px by more than 5%"
        ));
    }
    if exceeds_tolerance(actual_height, target_height) {
        warnings.push(format!(
            "height {actual_height}px deviates from target {target_height}px by more than 5%"
        ));
    }

    let aspect_ratio = if actual_height == 0 {
        "0.000".to_string()
    } else {
        format!("{:.3}", actual_width as f64 / actual_height as f64)
    };

    Validation {
        is_valid: warnings.is_empty(),
        warnings,
        details: ValidationDetails {
            width: actual_width,
            height: actual_height,
            aspect_ratio,
        },
    }
}

fn exceeds_tolerance(actual: u32, target: u32) -> bool {
    let tolerance = target as f64 * TOLERANCE;
    (actual as f64 - target as f64).abs() > tolerance
}
