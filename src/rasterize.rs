//! Page rasterization boundary and the retry driver around it.
//!
//! The crate never renders documents itself. A [`PageRasterizer`] hands back
//! an RGBA raster for a page at a scale factor; [`PageDirectory`] is the
//! shipped implementation over a folder of pre-rendered page images.
//!
//! Rendering is the only operation that retries. [`RenderDriver`] runs the
//! state machine:
//!
//! ```text
//! Idle → Rendering ─┬─ ok ──────────────────────→ Success
//!                   ├─ err, retries left → RetryPending(n) → Rendering
//!                   └─ err, none left ───────────→ Failed
//! ```

use crate::imaging::{BackendError, load_image, rust_backend::supported_input_extensions};
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("page {page} could not be rendered: {reason}")]
    PageRender { page: u32, reason: String },
    #[error("page {page} is outside 1..={total}")]
    PageOutOfRange { page: u32, total: u32 },
    #[error("no page images found in {0}")]
    NoPages(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces source rasters for 1-based page numbers.
pub trait PageRasterizer {
    fn page_count(&self) -> u32;

    /// Render `page` at `scale` times its nominal size.
    fn render(&self, page: u32, scale: f64) -> Result<RgbaImage, RenderError>;
}

/// How often and how patiently a failed render is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Rendering,
    /// Waiting before retry number `n` (1-based).
    RetryPending(u32),
    Success,
    Failed,
}

/// Outcome of one [`RenderDriver::step`].
#[derive(Debug)]
pub enum Step {
    Done(RgbaImage),
    /// Wait this long, then step again.
    Retry(Duration),
    Failed(RenderError),
}

/// Explicit retry state machine around a [`PageRasterizer`].
pub struct RenderDriver<'a, R: PageRasterizer + ?Sized> {
    rasterizer: &'a R,
    policy: RetryPolicy,
    state: RenderState,
    attempts: u32,
}

impl<'a, R: PageRasterizer + ?Sized> RenderDriver<'a, R> {
    pub fn new(rasterizer: &'a R, policy: RetryPolicy) -> Self {
        Self {
            rasterizer,
            policy,
            state: RenderState::Idle,
            attempts: 0,
        }
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Render calls made since the last [`RenderDriver::reset`].
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.state = RenderState::Idle;
        self.attempts = 0;
    }

    /// Make one render attempt and advance the state.
    pub fn step(&mut self, page: u32, scale: f64) -> Step {
        self.state = RenderState::Rendering;
        self.attempts += 1;

        match self.rasterizer.render(page, scale) {
            Ok(raster) => {
                debug!(page, scale, attempts = self.attempts, "page rendered");
                self.state = RenderState::Success;
                Step::Done(raster)
            }
            Err(e) if self.attempts <= self.policy.max_retries => {
                let retry = self.attempts;
                warn!(page, retry, max = self.policy.max_retries, error = %e, "render failed, retrying");
                self.state = RenderState::RetryPending(retry);
                Step::Retry(self.policy.delay)
            }
            Err(e) => {
                self.state = RenderState::Failed;
                Step::Failed(e)
            }
        }
    }

    /// Drive [`RenderDriver::step`] to a terminal state, sleeping between
    /// retries.
    pub fn render(&mut self, page: u32, scale: f64) -> Result<RgbaImage, RenderError> {
        self.reset();
        loop {
            match self.step(page, scale) {
                Step::Done(raster) => return Ok(raster),
                Step::Failed(e) => return Err(e),
                Step::Retry(delay) => {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
}

/// Pages stored as image files in one directory, ordered by file name.
///
/// Files are assumed to be rendered at `native_scale`. Requests at another
/// scale are resampled with Lanczos3.
#[derive(Debug, Clone)]
pub struct PageDirectory {
    pages: Vec<PathBuf>,
    native_scale: f64,
}

impl PageDirectory {
    pub fn open(dir: &Path, native_scale: f64) -> Result<Self, RenderError> {
        let pages = collect_page_files(dir)?;
        if pages.is_empty() {
            return Err(RenderError::NoPages(dir.to_path_buf()));
        }
        debug!(dir = %dir.display(), pages = pages.len(), "opened page directory");
        Ok(Self {
            pages,
            native_scale,
        })
    }

    pub fn path(&self, page: u32) -> Option<&Path> {
        let index = page.checked_sub(1)? as usize;
        self.pages.get(index).map(PathBuf::as_path)
    }
}

impl PageRasterizer for PageDirectory {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn render(&self, page: u32, scale: f64) -> Result<RgbaImage, RenderError> {
        let path = self.path(page).ok_or(RenderError::PageOutOfRange {
            page,
            total: self.page_count(),
        })?;
        let raster = load_image(path).map_err(|e| match e {
            BackendError::Io(io) => RenderError::Io(io),
            other => RenderError::PageRender {
                page,
                reason: other.to_string(),
            },
        })?;

        let factor = scale / self.native_scale;
        if (factor - 1.0).abs() < f64::EPSILON {
            return Ok(raster);
        }
        let width = ((raster.width() as f64 * factor).round() as u32).max(1);
        let height = ((raster.height() as f64 * factor).round() as u32).max(1);
        Ok(imageops::resize(&raster, width, height, FilterType::Lanczos3))
    }
}

fn collect_page_files(dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_page_image(p))
        .collect();

    entries.sort();
    Ok(entries)
}

fn is_page_image(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let hidden = path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'));
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    !hidden && supported_input_extensions().contains(&ext.as_str())
}
