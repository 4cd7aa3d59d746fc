//! # Pageshot
//!
//! Extracts fixed-size ID photos from document pages. A user marks one
//! rectangle per page; every rectangle is fitted into the output frame,
//! optionally rotated and zoomed, named, encoded under a file size limit with
//! the print density embedded, and packed into a ZIP.
//!
//! # Architecture: Extract, Then Encode
//!
//! ```text
//! 1. Select    page rasters  →  RegionModel      (normalized rectangles + adjustments)
//! 2. Extract   RegionModel   →  Vec<OutputImage> (frame-sized rasters with names)
//! 3. Encode    OutputImage   →  ExportedFile     (bytes under budget, density set)
//! 4. Write     ExportedFile  →  .zip or directory
//! ```
//!
//! Extraction and encoding are separate passes so the extracted images can
//! be renamed, rotated and rescaled before anything is encoded. Both passes
//! run pages in ascending order and stop at the first fatal error, keeping
//! what was finished.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`region`] | Normalized selection rectangles and per-page adjustments |
//! | [`rasterize`] | Page rasterizer seam, retry state machine, page image directories |
//! | [`imaging`] | Compositing, validation, bounded encoding, density metadata |
//! | [`naming`] | Sequential, list-driven, manual and custom naming |
//! | [`name_list`] | `.txt` / `.csv` name list loading |
//! | [`export`] | Batch extraction and encoding with progress events |
//! | [`archive`] | ZIP and directory writers |
//! | [`session`] | The mutable state of one job, plus its TOML description |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Regions Are Fractions
//!
//! A rectangle is stored as fractions of the raster it was drawn on, so the
//! same selection applies to the low-scale preview render and the high-scale
//! export render without re-mapping.
//!
//! ## Fixed Output Frame
//!
//! Every output is exactly the configured frame size. The crop is scaled to
//! cover the frame and then rotated and zoomed around the frame center;
//! uncovered pixels are white. Consumers can rely on the dimensions without
//! checking.
//!
//! ## Bounded Encoding
//!
//! The encoder steps JPEG quality down in fixed increments until the file
//! fits the byte budget. PNG output that is too large switches to JPEG once.
//! At the quality floor the file is kept anyway and flagged, since an
//! oversized photo is more useful than none.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling and encoding use the `image` crate only. The binary
//! has no system dependencies.

pub mod archive;
pub mod config;
pub mod export;
pub mod imaging;
pub mod name_list;
pub mod naming;
pub mod output;
pub mod rasterize;
pub mod region;
pub mod session;

#[cfg(test)]
pub(crate) mod test_helpers;
