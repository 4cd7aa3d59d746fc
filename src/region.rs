//! Per-page selection regions and their adjustments.
//!
//! A [`Region`] is stored as fractions of the raster it was drawn on, so the
//! same selection can be applied to the page rendered at any scale: the
//! preview raster it was captured on and the high-resolution export raster
//! both map it back to the same area of the page.
//!
//! Every page with a region also has exactly one [`Adjustment`]. It is
//! created with defaults the first time the region is set, survives
//! re-selection, and is removed together with the region.

use crate::imaging::{Dimensions, clamp_scale};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Smallest selection, per axis, accepted in device pixels.
pub const MIN_SELECTION_PX: f64 = 20.0;

#[derive(Error, Debug, PartialEq)]
pub enum RegionError {
    #[error("selection of {width:.0}×{height:.0}px is below the 20px minimum")]
    SelectionTooSmall { width: f64, height: f64 },
    #[error("selection has a non-finite coordinate")]
    NonFiniteSelection,
    #[error("page {page} is outside 1..={total}")]
    PageOutOfRange { page: u32, total: u32 },
    #[error("page {0} has no region")]
    NoRegion(u32),
}

/// Rectangle in device pixels on a captured raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DeviceRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanned by two drag corners, in any order.
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Clip to `[0, width] × [0, height]`.
    pub fn clamp_to(&self, dims: Dimensions) -> Self {
        let (w, h) = (dims.width as f64, dims.height as f64);
        // Negative extents are normalized first.
        let norm = Self::from_corners(self.x, self.y, self.x + self.width, self.y + self.height);
        let x0 = norm.x.clamp(0.0, w);
        let y0 = norm.y.clamp(0.0, h);
        let x1 = (norm.x + norm.width).clamp(0.0, w);
        let y1 = (norm.y + norm.height).clamp(0.0, h);
        Self::from_corners(x0, y0, x1, y1)
    }
}

/// Selection as fractions of the capture raster, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    /// The whole page.
    pub const FULL: Region = Region {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Normalize a device rectangle drawn on a raster of `dims`.
    ///
    /// The rectangle is clipped to the raster first; what remains must be at
    /// least [`MIN_SELECTION_PX`] on both axes. NaN or infinite input is
    /// rejected outright since clamping would hide it.
    pub fn capture(rect: &DeviceRect, dims: Dimensions) -> Result<Region, RegionError> {
        let coords = [rect.x, rect.y, rect.width, rect.height];
        if !coords.iter().all(|v| v.is_finite()) {
            return Err(RegionError::NonFiniteSelection);
        }
        let clipped = rect.clamp_to(dims);
        if clipped.width < MIN_SELECTION_PX || clipped.height < MIN_SELECTION_PX {
            return Err(RegionError::SelectionTooSmall {
                width: clipped.width,
                height: clipped.height,
            });
        }

        let (w, h) = (dims.width as f64, dims.height as f64);
        Ok(Region {
            x: clipped.x / w,
            y: clipped.y / h,
            width: clipped.width / w,
            height: clipped.height / h,
        })
    }

    /// Map back onto a raster of `dims`.
    pub fn to_device(&self, dims: Dimensions) -> DeviceRect {
        let (w, h) = (dims.width as f64, dims.height as f64);
        DeviceRect {
            x: self.x * w,
            y: self.y * h,
            width: self.width * w,
            height: self.height * h,
        }
    }
}

/// User rotation and zoom applied on top of the cover fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Clockwise degrees. Wrapped into `[-180, 180)` only when rendered.
    pub rotation_degrees: f64,
    /// Zoom in percent, `[50, 200]`.
    pub scale_percent: f64,
}

impl Default for Adjustment {
    fn default() -> Self {
        Self {
            rotation_degrees: 0.0,
            scale_percent: 100.0,
        }
    }
}

/// Regions and adjustments keyed by 1-based page number, iterated in
/// ascending page order.
#[derive(Debug, Clone, Default)]
pub struct RegionModel {
    total_pages: u32,
    regions: BTreeMap<u32, Region>,
    adjustments: BTreeMap<u32, Adjustment>,
}

impl RegionModel {
    pub fn new(total_pages: u32) -> Self {
        Self {
            total_pages,
            ..Default::default()
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Store the selection for `page`. A too-small selection leaves any
    /// previous region untouched. An existing adjustment is kept.
    pub fn set_region(
        &mut self,
        page: u32,
        rect: &DeviceRect,
        capture: Dimensions,
    ) -> Result<Region, RegionError> {
        self.check_page(page)?;
        let region = Region::capture(rect, capture)?;
        self.regions.insert(page, region);
        self.adjustments.entry(page).or_default();
        Ok(region)
    }

    /// Remove the region and its adjustment. Returns whether one existed.
    pub fn clear_region(&mut self, page: u32) -> bool {
        self.adjustments.remove(&page);
        self.regions.remove(&page).is_some()
    }

    /// Update the supplied fields only. Scale is clamped into `[50, 200]`.
    pub fn set_adjustment(
        &mut self,
        page: u32,
        rotation_degrees: Option<f64>,
        scale_percent: Option<f64>,
    ) -> Result<Adjustment, RegionError> {
        let adjustment = self
            .adjustments
            .get_mut(&page)
            .ok_or(RegionError::NoRegion(page))?;
        if let Some(rotation) = rotation_degrees {
            adjustment.rotation_degrees = rotation;
        }
        if let Some(scale) = scale_percent {
            adjustment.scale_percent = clamp_scale(scale);
        }
        Ok(*adjustment)
    }

    pub fn region(&self, page: u32) -> Option<&Region> {
        self.regions.get(&page)
    }

    pub fn adjustment(&self, page: u32) -> Option<&Adjustment> {
        self.adjustments.get(&page)
    }

    /// Pages with a region, ascending.
    pub fn selected_pages(&self) -> Vec<u32> {
        self.regions.keys().copied().collect()
    }

    /// `(page, region, adjustment)` in ascending page order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Region, Adjustment)> + '_ {
        self.regions.iter().map(|(&page, region)| {
            let adjustment = self.adjustments.get(&page).copied().unwrap_or_default();
            (page, region, adjustment)
        })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Drop all selections, e.g. when a new document is opened.
    pub fn reset(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
        self.regions.clear();
        self.adjustments.clear();
    }

    fn check_page(&self, page: u32) -> Result<(), RegionError> {
        if page == 0 || page > self.total_pages {
            return Err(RegionError::PageOutOfRange {
                page,
                total: self.total_pages,
            });
        }
        Ok(())
    }
}
