//! Export configuration.
//!
//! Handles loading, validating, and merging a `pageshot.toml` file. Stock
//! defaults are the base layer; a user file overrides only the keys it sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! width = 413               # Output frame width in pixels
//! height = 531              # Output frame height in pixels
//! dpi = 300                 # Density written into the file
//! format = "jpeg"           # jpeg | png
//! quality = 0.92            # Starting quality (0.0-1.0)
//! max_file_bytes = 1048576  # Per-file size budget
//!
//! [naming]
//! mode = "sequential"       # sequential | manual | custom
//!
//! [render]
//! preview_scale = 1.5       # Page scale for previews
//! export_scale = 3.0        # Page scale for export
//! max_retries = 3           # Extra render attempts per page
//! retry_delay_ms = 300      # Wait between attempts
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use crate::naming::NamingMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Export configuration loaded from TOML.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Frame size, density, format and size budget.
    pub output: OutputConfig,
    /// How output images are named.
    pub naming: NamingConfig,
    /// Page rendering scales and retry policy.
    pub render: RenderConfig,
}

impl ExportConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.output;
        if o.width == 0 || o.height == 0 {
            return Err(ConfigError::Validation(
                "output.width and output.height must be non-zero".into(),
            ));
        }
        if o.dpi == 0 {
            return Err(ConfigError::Validation("output.dpi must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&o.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 0.0-1.0".into(),
            ));
        }
        if o.max_file_bytes == 0 {
            return Err(ConfigError::Validation(
                "output.max_file_bytes must be non-zero".into(),
            ));
        }
        let r = &self.render;
        if !(r.preview_scale > 0.0 && r.export_scale > 0.0) {
            return Err(ConfigError::Validation(
                "render scales must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub dpi: u16,
    pub format: OutputFormat,
    /// Starting point of the quality ladder.
    pub quality: f64,
    pub max_file_bytes: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 413,
            height: 531,
            dpi: 300,
            format: OutputFormat::Jpeg,
            quality: 0.92,
            max_file_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    pub mode: NamingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub preview_scale: f64,
    pub export_scale: f64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            preview_scale: 1.5,
            export_scale: 3.0,
            max_retries: 3,
            retry_delay_ms: 300,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ExportConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ExportConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ExportConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config at `path`, or the stock defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<ExportConfig, ConfigError> {
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pageshot configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Output image
# ---------------------------------------------------------------------------
[output]
# Every exported image is exactly this many pixels, whatever the selection.
width = 413
height = 531

# Physical resolution written into the file (JFIF density / PNG pHYs).
dpi = 300

# Container format: "jpeg" or "png". PNG falls back to JPEG when it cannot
# fit the size budget.
format = "jpeg"

# Starting JPEG quality (0.0-1.0). Lowered in steps of 0.05, down to 0.10,
# until the file fits max_file_bytes.
quality = 0.92

# Per-file size budget in bytes.
max_file_bytes = 1048576

# ---------------------------------------------------------------------------
# Naming
# ---------------------------------------------------------------------------
[naming]
# "sequential": names from the name list in order, then 001, 002, ...
# "manual":     names picked per image from the name list
# "custom":     free text per image
mode = "sequential"

# ---------------------------------------------------------------------------
# Page rendering
# ---------------------------------------------------------------------------
[render]
# Scale factor for page previews.
preview_scale = 1.5

# Scale factor for export rendering. Higher gives sharper crops.
export_scale = 3.0

# Extra attempts when a page fails to render, and the wait between them.
max_retries = 3
retry_delay_ms = 300
"##
}
