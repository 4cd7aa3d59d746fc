//! Batch extraction and encoding.
//!
//! Two passes, both in ascending page order:
//!
//! 1. **Extract**: for every page with a region, render the page at the
//!    export scale (with retries), composite the region into the fixed
//!    frame, validate it and give it a name. The result is an
//!    [`OutputImage`] that can still be renamed, rotated and rescaled.
//! 2. **Encode**: encode every output under the byte budget with the
//!    density embedded, producing `{name}.{ext}` files for an archive
//!    writer.
//!
//! Only one page raster is alive at a time. The first fatal error stops the
//! batch; everything finished before it is returned in [`BatchResult`]
//! alongside the failure.

use crate::archive::{NamedFile, sanitize_file_name};
use crate::config::ExportConfig;
use crate::imaging::{
    CompositeError, Dimensions, EncodeError, EncodeSettings, ImageBackend, OutputFormat, Quality,
    Validation, composite, encode_bounded, render_frame, validate,
};
use crate::naming::{NameAssigner, Named};
use crate::rasterize::{PageRasterizer, RenderDriver, RenderError, RetryPolicy, Step};
use crate::region::{Adjustment, RegionModel};
use image::RgbaImage;
use serde::Serialize;
use std::fmt;
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// What stopped a page, one variant per [`Stage`].
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Pipeline step a page failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Render,
    Composite,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Render => write!(f, "render"),
            Stage::Composite => write!(f, "composite"),
            Stage::Encode => write!(f, "encode"),
        }
    }
}

/// The fatal error that stopped a batch.
#[derive(Error, Debug)]
#[error("page {page} failed during {stage}: {source}")]
pub struct PageFailure {
    pub page: u32,
    pub stage: Stage,
    pub source: ExportError,
}

/// Completed items plus the failure that ended the batch early, if any.
#[derive(Debug)]
pub struct BatchResult<T> {
    pub completed: Vec<T>,
    pub failure: Option<PageFailure>,
}

impl<T> BatchResult<T> {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Drop the partial results on failure.
    pub fn into_result(self) -> Result<Vec<T>, PageFailure> {
        match self.failure {
            Some(failure) => Err(failure),
            None => Ok(self.completed),
        }
    }
}

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportEvent {
    PageStarted {
        /// 1-based position in the batch.
        position: usize,
        total: usize,
        page: u32,
    },
    RenderRetry {
        page: u32,
        retry: u32,
        delay: Duration,
    },
    PageExtracted {
        position: usize,
        page: u32,
        name: String,
        warnings: Vec<String>,
    },
    FileEncoded {
        position: usize,
        file_name: String,
        size: usize,
        format: OutputFormat,
        quality: Quality,
        downgraded: bool,
        budget_exceeded: bool,
    },
}

/// Parameters for one export run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    pub frame: Dimensions,
    pub export_scale: f64,
    pub retry: RetryPolicy,
    pub encode: EncodeSettings,
}

impl ExportSettings {
    /// Build settings from the user-facing configuration.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            frame: Dimensions::new(config.output.width, config.output.height),
            export_scale: config.render.export_scale,
            retry: RetryPolicy {
                max_retries: config.render.max_retries,
                delay: Duration::from_millis(config.render.retry_delay_ms),
            },
            encode: EncodeSettings {
                format: config.output.format,
                quality: Quality::from_fraction(config.output.quality as f32),
                dpi: config.output.dpi,
                max_bytes: config.output.max_file_bytes,
            },
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// One extracted image. The raster is always exactly the frame size.
#[derive(Debug, Clone)]
pub struct OutputImage {
    pub raster: RgbaImage,
    /// Frame as extracted; post-extraction adjustments re-render from this.
    base: RgbaImage,
    pub source_page: u32,
    pub name: String,
    pub custom_name: Option<String>,
    pub validation: Validation,
    pub rotation_degrees: f64,
    pub scale_percent: f64,
}

impl OutputImage {
    pub fn new(raster: RgbaImage, source_page: u32, name: String, target: Dimensions) -> Self {
        let validation = validate(raster.width(), raster.height(), target.width, target.height);
        Self {
            base: raster.clone(),
            raster,
            source_page,
            name,
            custom_name: None,
            validation,
            rotation_degrees: 0.0,
            scale_percent: 100.0,
        }
    }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn adjustment(&self) -> Adjustment {
        Adjustment {
            rotation_degrees: self.rotation_degrees,
            scale_percent: self.scale_percent,
        }
    }

    /// Set an absolute rotation and re-render. Zero resets.
    pub fn set_rotation(&mut self, degrees: f64) -> Result<(), CompositeError> {
        self.rerender(Adjustment {
            rotation_degrees: degrees,
            ..self.adjustment()
        })
    }

    /// Rotate relative to the current rotation.
    pub fn rotate_by(&mut self, delta: f64) -> Result<(), CompositeError> {
        self.set_rotation(self.rotation_degrees + delta)
    }

    pub fn set_scale(&mut self, percent: f64) -> Result<(), CompositeError> {
        self.rerender(Adjustment {
            scale_percent: percent,
            ..self.adjustment()
        })
    }

    /// Render `adjustment` from the extraction-time frame. The stored
    /// adjustment only changes when rendering succeeds.
    fn rerender(&mut self, adjustment: Adjustment) -> Result<(), CompositeError> {
        let frame = Dimensions::new(self.base.width(), self.base.height());
        let rotation = crate::imaging::normalize_rotation(adjustment.rotation_degrees);
        let scale = crate::imaging::clamp_scale(adjustment.scale_percent);
        self.raster = render_frame(
            &self.base,
            &Adjustment {
                rotation_degrees: rotation,
                scale_percent: scale,
            },
            frame,
        )?;
        self.rotation_degrees = rotation;
        self.scale_percent = scale;
        Ok(())
    }
}

impl Named for OutputImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn set_custom_name(&mut self, custom: Option<String>) {
        self.custom_name = custom;
    }
}

/// An encoded output ready for the archive writer.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file: NamedFile,
    pub source_page: u32,
    pub format: OutputFormat,
    pub quality: Quality,
    pub downgraded: bool,
    pub budget_exceeded: bool,
}

/// Runs extraction and encoding with one encode backend and fixed settings.
pub struct BatchExporter<'a, B: ImageBackend> {
    backend: &'a B,
    settings: ExportSettings,
    events: Option<Sender<ExportEvent>>,
}

impl<'a, B: ImageBackend> BatchExporter<'a, B> {
    pub fn new(backend: &'a B, settings: ExportSettings) -> Self {
        Self {
            backend,
            settings,
            events: None,
        }
    }

    /// Report progress on `tx`. A dropped receiver is ignored.
    pub fn with_events(mut self, tx: Sender<ExportEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn emit(&self, event: ExportEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }

    /// Extract every selected region, in ascending page order.
    pub fn extract<R: PageRasterizer + ?Sized>(
        &self,
        rasterizer: &R,
        regions: &RegionModel,
        names: &mut NameAssigner,
    ) -> BatchResult<OutputImage> {
        let total = regions.len();
        let mut completed = Vec::with_capacity(total);

        for (index, (page, region, adjustment)) in regions.iter().enumerate() {
            let position = index + 1;
            self.emit(ExportEvent::PageStarted {
                position,
                total,
                page,
            });

            let source = match self.render_page(rasterizer, page) {
                Ok(raster) => raster,
                Err(e) => return failed(completed, page, Stage::Render, e.into()),
            };

            let raster = match composite(&source, region, &adjustment, self.settings.frame) {
                Ok(raster) => raster,
                Err(e) => return failed(completed, page, Stage::Composite, e.into()),
            };
            drop(source);

            let name = names.name_for(index);
            let output = OutputImage::new(raster, page, name, self.settings.frame);
            debug!(page, name = %output.name, valid = output.validation.is_valid, "extracted");
            self.emit(ExportEvent::PageExtracted {
                position,
                page,
                name: output.name.clone(),
                warnings: output.validation.warnings.clone(),
            });
            completed.push(output);
        }

        BatchResult {
            completed,
            failure: None,
        }
    }

    /// Encode outputs into `{name}.{ext}` files. Names are sanitized into a
    /// single path component.
    pub fn encode<'o>(
        &self,
        outputs: impl IntoIterator<Item = &'o OutputImage>,
    ) -> BatchResult<ExportedFile> {
        let mut completed = Vec::new();

        for (index, output) in outputs.into_iter().enumerate() {
            let encoded = match encode_bounded(self.backend, &output.raster, &self.settings.encode)
            {
                Ok(encoded) => encoded,
                Err(e) => return failed(completed, output.source_page, Stage::Encode, e.into()),
            };

            let file_name = format!(
                "{}.{}",
                sanitize_file_name(&output.name),
                encoded.format.extension()
            );
            self.emit(ExportEvent::FileEncoded {
                position: index + 1,
                file_name: file_name.clone(),
                size: encoded.bytes.len(),
                format: encoded.format,
                quality: encoded.quality,
                downgraded: encoded.downgraded,
                budget_exceeded: encoded.budget_exceeded,
            });
            completed.push(ExportedFile {
                file: NamedFile {
                    name: file_name,
                    bytes: encoded.bytes,
                },
                source_page: output.source_page,
                format: encoded.format,
                quality: encoded.quality,
                downgraded: encoded.downgraded,
                budget_exceeded: encoded.budget_exceeded,
            });
        }

        BatchResult {
            completed,
            failure: None,
        }
    }

    /// Render through the retry state machine, sleeping between attempts.
    fn render_page<R: PageRasterizer + ?Sized>(
        &self,
        rasterizer: &R,
        page: u32,
    ) -> Result<RgbaImage, RenderError> {
        let mut driver = RenderDriver::new(rasterizer, self.settings.retry);
        loop {
            match driver.step(page, self.settings.export_scale) {
                Step::Done(raster) => return Ok(raster),
                Step::Failed(e) => return Err(e),
                Step::Retry(delay) => {
                    self.emit(ExportEvent::RenderRetry {
                        page,
                        retry: driver.attempts(),
                        delay,
                    });
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
}

fn failed<T>(completed: Vec<T>, page: u32, stage: Stage, source: ExportError) -> BatchResult<T> {
    BatchResult {
        completed,
        failure: Some(PageFailure {
            page,
            stage,
            source,
        }),
    }
}

/// One line of the machine-readable export report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub page: u32,
    pub name: String,
    pub file: String,
    pub bytes: usize,
    pub format: OutputFormat,
    pub quality: f32,
    pub downgraded: bool,
    pub budget_exceeded: bool,
    pub validation: Validation,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub width: u32,
    pub height: u32,
    pub dpi: u16,
    pub max_file_bytes: usize,
    pub files: Vec<ReportEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub page: u32,
    pub stage: Stage,
    pub error: String,
}

impl ExportReport {
    /// `outputs` pairs up with `files` in order.
    pub fn new<'o>(
        settings: &ExportSettings,
        outputs: impl IntoIterator<Item = &'o OutputImage>,
        files: &[ExportedFile],
        failure: Option<&PageFailure>,
    ) -> Self {
        let files = outputs
            .into_iter()
            .zip(files)
            .map(|(output, exported)| ReportEntry {
                page: exported.source_page,
                name: output.name.clone(),
                file: exported.file.name.clone(),
                bytes: exported.file.bytes.len(),
                format: exported.format,
                quality: exported.quality.as_fraction(),
                downgraded: exported.downgraded,
                budget_exceeded: exported.budget_exceeded,
                validation: output.validation.clone(),
            })
            .collect();
        Self {
            width: settings.frame.width,
            height: settings.frame.height,
            dpi: settings.encode.dpi,
            max_file_bytes: settings.encode.max_bytes,
            files,
            failure: failure.map(|f| FailureReport {
                page: f.page,
                stage: f.stage,
                error: f.source.to_string(),
            }),
        }
    }
}
