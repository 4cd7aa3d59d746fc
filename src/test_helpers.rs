//! Shared test utilities for the pageshot test suite.
//!
//! Provides synthetic page rasters, a scripted [`FakeRasterizer`] and a
//! helper that writes page images to a directory for [`PageDirectory`] tests.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! // Page 2 fails twice before rendering.
//! let fake = FakeRasterizer::new(3, 300, 400).fail_times(2, 2);
//! let raster = fake.render(1, 1.5).unwrap();
//! assert_eq!(raster.dimensions(), (450, 600));
//! ```
//!
//! [`PageDirectory`]: crate::rasterize::PageDirectory

use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::rasterize::{PageRasterizer, RenderError};

// =========================================================================
// Synthetic rasters
// =========================================================================

/// A page with a tinted quadrant pattern, so crops from different areas are
/// distinguishable. The tint varies per page.
pub fn synthetic_page(page: u32, width: u32, height: u32) -> RgbaImage {
    let tint = (page * 40 % 256) as u8;
    RgbaImage::from_fn(width, height, |x, y| {
        let right = x >= width / 2;
        let bottom = y >= height / 2;
        match (right, bottom) {
            (false, false) => Rgba([tint, 0, 0, 255]),
            (true, false) => Rgba([0, tint, 0, 255]),
            (false, true) => Rgba([0, 0, tint, 255]),
            (true, true) => Rgba([tint, tint, tint, 255]),
        }
    })
}

/// Write `page-001.png`, `page-002.png`, … with the given sizes.
pub fn write_page_images(dir: &Path, sizes: &[(u32, u32)]) {
    for (i, &(w, h)) in sizes.iter().enumerate() {
        let page = i as u32 + 1;
        synthetic_page(page, w, h)
            .save(dir.join(format!("page-{:03}.png", page)))
            .unwrap();
    }
}

// =========================================================================
// FakeRasterizer
// =========================================================================

/// In-memory rasterizer with a fixed page size at scale 1.0 and scripted
/// failures per page.
pub struct FakeRasterizer {
    pages: u32,
    width: u32,
    height: u32,
    failures: Mutex<HashMap<u32, u32>>,
    calls: Mutex<HashMap<u32, u32>>,
}

impl FakeRasterizer {
    pub fn new(pages: u32, width: u32, height: u32) -> Self {
        Self {
            pages,
            width,
            height,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next `times` renders of `page` fail.
    pub fn fail_times(self, page: u32, times: u32) -> Self {
        self.failures.lock().unwrap().insert(page, times);
        self
    }

    /// Number of render calls seen for `page`.
    pub fn calls(&self, page: u32) -> u32 {
        self.calls.lock().unwrap().get(&page).copied().unwrap_or(0)
    }
}

impl PageRasterizer for FakeRasterizer {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn render(&self, page: u32, scale: f64) -> Result<RgbaImage, RenderError> {
        *self.calls.lock().unwrap().entry(page).or_default() += 1;

        if page == 0 || page > self.pages {
            return Err(RenderError::PageOutOfRange {
                page,
                total: self.pages,
            });
        }

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&page) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RenderError::PageRender {
                    page,
                    reason: "scripted failure".into(),
                });
            }
        }

        let w = (self.width as f64 * scale).round() as u32;
        let h = (self.height as f64 * scale).round() as u32;
        Ok(synthetic_page(page, w, h))
    }
}
