//! The working state of one extraction job.
//!
//! A [`Session`] owns everything that changes while a user works through a
//! document: the configuration, the per-page regions and adjustments, the
//! naming state and the extracted images with their selection. Nothing is
//! global; every operation goes through the session that owns the data.
//!
//! A session can also be described in a TOML file ([`SessionFile`]) so the
//! CLI can replay it:
//!
//! ```toml
//! pages = "pages"          # directory of page images, relative to this file
//! native_scale = 1.0       # scale the page images were rendered at
//! names = "names.txt"      # optional name list (.txt or .csv)
//!
//! [[region]]
//! page = 1
//! capture = [918, 1188]    # raster size the rectangle was drawn on
//! rect = [90, 120, 300, 380]
//! rotation = 0.0           # optional
//! scale = 100.0            # optional
//!
//! [[rename]]
//! page = 1
//! name = "Chen Wei"
//! ```

use crate::config::ExportConfig;
use crate::export::{
    BatchExporter, BatchResult, ExportSettings, ExportedFile, OutputImage, PageFailure,
};
use crate::imaging::{CompositeError, Dimensions, ImageBackend, preview};
use crate::name_list::{ListError, NameSource, load_pool};
use crate::naming::{NameAssigner, NamingError, NamingMode};
use crate::rasterize::{PageRasterizer, RenderDriver, RenderError, RetryPolicy};
use crate::region::{DeviceRect, Region, RegionError, RegionModel};
use image::RgbaImage;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Width of the preview frame in pixels.
pub const PREVIEW_WIDTH: u32 = 200;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Naming(#[from] NamingError),
    #[error(transparent)]
    List(#[from] ListError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error(transparent)]
    Batch(#[from] PageFailure),
    #[error("no output image at index {0}")]
    NoOutput(usize),
    #[error("no output image from page {0}")]
    NoOutputForPage(u32),
    #[error("no output images selected")]
    NothingSelected,
}

pub struct Session {
    config: ExportConfig,
    regions: RegionModel,
    names: NameAssigner,
    outputs: Vec<OutputImage>,
    selected: BTreeSet<usize>,
}

impl Session {
    pub fn new(config: ExportConfig, total_pages: u32) -> Self {
        let names = NameAssigner::new(config.naming.mode);
        Self {
            config,
            regions: RegionModel::new(total_pages),
            names,
            outputs: Vec::new(),
            selected: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn regions(&self) -> &RegionModel {
        &self.regions
    }

    pub fn names(&self) -> &NameAssigner {
        &self.names
    }

    pub fn outputs(&self) -> &[OutputImage] {
        &self.outputs
    }

    pub fn frame(&self) -> Dimensions {
        Dimensions::new(self.config.output.width, self.config.output.height)
    }

    /// Exporter configured from this session's settings.
    pub fn exporter<'a, B: ImageBackend>(&self, backend: &'a B) -> BatchExporter<'a, B> {
        BatchExporter::new(backend, ExportSettings::from_config(&self.config))
    }

    // -------------------------------------------------------------------------
    // Regions
    // -------------------------------------------------------------------------

    pub fn set_region(
        &mut self,
        page: u32,
        rect: &DeviceRect,
        capture: Dimensions,
    ) -> Result<Region, RegionError> {
        self.regions.set_region(page, rect, capture)
    }

    pub fn clear_region(&mut self, page: u32) -> bool {
        self.regions.clear_region(page)
    }

    pub fn set_adjustment(
        &mut self,
        page: u32,
        rotation_degrees: Option<f64>,
        scale_percent: Option<f64>,
    ) -> Result<(), RegionError> {
        self.regions
            .set_adjustment(page, rotation_degrees, scale_percent)
            .map(|_| ())
    }

    /// Small render of how `page` will export with its current adjustment.
    pub fn preview<R: PageRasterizer + ?Sized>(
        &self,
        rasterizer: &R,
        page: u32,
    ) -> Result<RgbaImage, SessionError> {
        let region = *self.regions.region(page).ok_or(RegionError::NoRegion(page))?;
        let adjustment = self
            .regions
            .adjustment(page)
            .copied()
            .unwrap_or_default();

        let mut driver = RenderDriver::new(rasterizer, self.retry_policy());
        let source = driver.render(page, self.config.render.preview_scale)?;
        Ok(preview(
            &source,
            &region,
            &adjustment,
            self.frame(),
            PREVIEW_WIDTH,
        )?)
    }

    // -------------------------------------------------------------------------
    // Naming
    // -------------------------------------------------------------------------

    pub fn load_names(&mut self, source: &impl NameSource, path: &Path) -> Result<usize, ListError> {
        let pool = load_pool(source, path)?;
        let count = pool.len();
        info!(count, path = %path.display(), "loaded name list");
        self.names.load_pool(pool, &mut self.outputs);
        Ok(count)
    }

    pub fn clear_names(&mut self) {
        self.names.clear_pool(&mut self.outputs);
    }

    pub fn set_naming_mode(&mut self, mode: NamingMode) {
        self.config.naming.mode = mode;
        self.names.set_mode(mode, &mut self.outputs);
    }

    pub fn assign_name(&mut self, index: usize, name: &str) -> Result<String, NamingError> {
        self.names.assign(&mut self.outputs, index, name)
    }

    pub fn set_custom_name(&mut self, index: usize, text: &str) -> Result<String, NamingError> {
        self.names.set_custom(&mut self.outputs, index, text)
    }

    /// Rename the output extracted from `page`, honouring the naming mode.
    pub fn rename_page(&mut self, page: u32, name: &str) -> Result<String, SessionError> {
        let index = self
            .outputs
            .iter()
            .position(|o| o.source_page == page)
            .ok_or(SessionError::NoOutputForPage(page))?;
        let bound = match self.names.mode() {
            NamingMode::Custom => self.set_custom_name(index, name)?,
            NamingMode::Sequential | NamingMode::Manual => self.assign_name(index, name)?,
        };
        Ok(bound)
    }

    // -------------------------------------------------------------------------
    // Extraction and post-extraction edits
    // -------------------------------------------------------------------------

    /// Extract every selected region, replacing previous outputs.
    ///
    /// On failure the images extracted before the failing page are kept.
    /// The selection is cleared either way.
    pub fn extract<R: PageRasterizer + ?Sized, B: ImageBackend>(
        &mut self,
        exporter: &BatchExporter<'_, B>,
        rasterizer: &R,
    ) -> Result<usize, PageFailure> {
        if let Some(pool) = self.names.pool() {
            debug!(names = pool.len(), "extracting with name list");
        }
        let BatchResult { completed, failure } =
            exporter.extract(rasterizer, &self.regions, &mut self.names);
        self.outputs = completed;
        self.selected.clear();
        match failure {
            Some(failure) => Err(failure),
            None => Ok(self.outputs.len()),
        }
    }

    fn output_mut(&mut self, index: usize) -> Result<&mut OutputImage, SessionError> {
        self.outputs
            .get_mut(index)
            .ok_or(SessionError::NoOutput(index))
    }

    pub fn rotate_output(&mut self, index: usize, delta: f64) -> Result<(), SessionError> {
        Ok(self.output_mut(index)?.rotate_by(delta)?)
    }

    pub fn set_output_rotation(&mut self, index: usize, degrees: f64) -> Result<(), SessionError> {
        Ok(self.output_mut(index)?.set_rotation(degrees)?)
    }

    pub fn set_output_scale(&mut self, index: usize, percent: f64) -> Result<(), SessionError> {
        Ok(self.output_mut(index)?.set_scale(percent)?)
    }

    // -------------------------------------------------------------------------
    // Selection and export
    // -------------------------------------------------------------------------

    /// Flip selection of one output. Returns whether it is now selected.
    pub fn toggle_selected(&mut self, index: usize) -> Result<bool, SessionError> {
        if index >= self.outputs.len() {
            return Err(SessionError::NoOutput(index));
        }
        if self.selected.remove(&index) {
            Ok(false)
        } else {
            self.selected.insert(index);
            Ok(true)
        }
    }

    /// Select everything, or nothing if everything was already selected.
    pub fn toggle_all(&mut self) {
        if !self.outputs.is_empty() && self.selected.len() == self.outputs.len() {
            self.selected.clear();
        } else {
            self.selected = (0..self.outputs.len()).collect();
        }
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    /// Encode the selected outputs in index order.
    pub fn export_selected<B: ImageBackend>(
        &self,
        exporter: &BatchExporter<'_, B>,
    ) -> Result<BatchResult<ExportedFile>, SessionError> {
        if self.selected.is_empty() {
            return Err(SessionError::NothingSelected);
        }
        Ok(exporter.encode(self.selected.iter().map(|&i| &self.outputs[i])))
    }

    /// Selected outputs, for pairing with exported files.
    pub fn selected_outputs(&self) -> Vec<&OutputImage> {
        self.selected.iter().map(|&i| &self.outputs[i]).collect()
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.render.max_retries,
            delay: Duration::from_millis(self.config.render.retry_delay_ms),
        }
    }
}

// =============================================================================
// Session file
// =============================================================================

/// A session described on disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionFile {
    /// Directory of page images.
    pub pages: PathBuf,
    #[serde(default = "default_native_scale")]
    pub native_scale: f64,
    /// Optional name list.
    #[serde(default)]
    pub names: Option<PathBuf>,
    #[serde(default, rename = "region")]
    pub regions: Vec<RegionEntry>,
    #[serde(default, rename = "rename")]
    pub renames: Vec<RenameEntry>,
}

fn default_native_scale() -> f64 {
    1.0
}

fn default_scale() -> f64 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionEntry {
    pub page: u32,
    /// `[width, height]` of the raster the rectangle was drawn on.
    pub capture: [u32; 2],
    /// `[x, y, width, height]` in capture pixels.
    pub rect: [f64; 4],
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameEntry {
    pub page: u32,
    pub name: String,
}

impl SessionFile {
    /// Parse a session file. Relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = fs::read_to_string(path)?;
        let mut file: SessionFile = toml::from_str(&content)?;
        let base = path.parent().unwrap_or(Path::new("."));
        file.pages = base.join(&file.pages);
        file.names = file.names.map(|n| base.join(n));
        Ok(file)
    }

    /// Record every region and its adjustment in `session`.
    pub fn apply_regions(&self, session: &mut Session) -> Result<(), RegionError> {
        for entry in &self.regions {
            let [x, y, w, h] = entry.rect;
            let capture = Dimensions::new(entry.capture[0], entry.capture[1]);
            session.set_region(entry.page, &DeviceRect::new(x, y, w, h), capture)?;
            session.set_adjustment(entry.page, Some(entry.rotation), Some(entry.scale))?;
        }
        Ok(())
    }

    /// Apply the renames to an extracted session.
    pub fn apply_renames(&self, session: &mut Session) -> Result<(), SessionError> {
        for entry in &self.renames {
            session.rename_page(entry.page, &entry.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use crate::name_list::ListFile;
    use crate::test_helpers::FakeRasterizer;
    use tempfile::TempDir;

    fn test_config() -> ExportConfig {
        let mut config = ExportConfig::default();
        config.output.width = 41;
        config.output.height = 53;
        config.render.export_scale = 1.0;
        config.render.preview_scale = 0.5;
        config.render.retry_delay_ms = 0;
        config
    }

    fn session_with(pages: &[u32]) -> Session {
        let mut session = Session::new(test_config(), 10);
        for &page in pages {
            session
                .set_region(page, &DeviceRect::new(0.0, 0.0, 100.0, 100.0), Dimensions::new(200, 300))
                .unwrap();
        }
        session
    }

    fn extracted(pages: &[u32]) -> Session {
        let mut session = session_with(pages);
        let fake = FakeRasterizer::new(10, 200, 300);
        let backend = MockBackend::new();
        let exporter = session.exporter(&backend);
        session.extract(&exporter, &fake).unwrap();
        session
    }

    fn output_names(session: &Session) -> Vec<&str> {
        session.outputs().iter().map(|o| o.name.as_str()).collect()
    }

    #[test]
    fn extract_produces_named_outputs() {
        let session = extracted(&[3, 1]);
        assert_eq!(output_names(&session), vec!["001", "002"]);
        assert_eq!(session.outputs()[0].source_page, 1);
        assert!(session.selected_indices().is_empty());
    }

    #[test]
    fn extract_failure_keeps_partial_outputs() {
        let mut session = session_with(&[1, 2, 3]);
        let fake = FakeRasterizer::new(10, 200, 300).fail_times(2, 50);
        let backend = MockBackend::new();

        let exporter = session.exporter(&backend);
        let failure = session.extract(&exporter, &fake).unwrap_err();
        assert_eq!(failure.page, 2);
        assert_eq!(session.outputs().len(), 1);
    }

    #[test]
    fn preview_has_reduced_frame() {
        let session = session_with(&[1]);
        let fake = FakeRasterizer::new(10, 200, 300);
        let img = session.preview(&fake, 1).unwrap();
        // 200 * 53 / 41 = 258.5 → 259
        assert_eq!(img.dimensions(), (200, 259));
    }

    #[test]
    fn preview_without_region_fails() {
        let session = session_with(&[]);
        let fake = FakeRasterizer::new(10, 200, 300);
        assert!(matches!(
            session.preview(&fake, 4),
            Err(SessionError::Region(RegionError::NoRegion(4)))
        ));
    }

    #[test]
    fn names_loaded_after_extraction_rename_outputs() {
        let tmp = TempDir::new().unwrap();
        let list = tmp.path().join("names.txt");
        fs::write(&list, "Alice\nBob\n").unwrap();

        let mut session = extracted(&[1, 2, 3]);
        assert_eq!(session.load_names(&ListFile, &list).unwrap(), 2);
        assert_eq!(output_names(&session), vec!["Alice", "Bob", "003"]);

        session.clear_names();
        assert_eq!(output_names(&session), vec!["001", "002", "003"]);
    }

    #[test]
    fn rename_page_follows_mode() {
        let mut session = extracted(&[4, 6]);
        session.set_naming_mode(NamingMode::Custom);
        assert_eq!(session.rename_page(6, "  back  ").unwrap(), "back");
        assert_eq!(session.outputs()[1].custom_name.as_deref(), Some("back"));

        assert!(matches!(
            session.rename_page(9, "x"),
            Err(SessionError::NoOutputForPage(9))
        ));
    }

    #[test]
    fn output_adjustments_keep_frame() {
        let mut session = extracted(&[1]);
        session.rotate_output(0, 45.0).unwrap();
        session.set_output_scale(0, 150.0).unwrap();
        let out = &session.outputs()[0];
        assert_eq!(out.raster.dimensions(), (41, 53));
        assert_eq!(out.rotation_degrees, 45.0);
        assert!(matches!(session.rotate_output(5, 1.0), Err(SessionError::NoOutput(5))));
    }

    #[test]
    fn selection_toggles() {
        let mut session = extracted(&[1, 2, 3]);
        assert!(session.toggle_selected(2).unwrap());
        assert!(session.toggle_selected(0).unwrap());
        assert_eq!(session.selected_indices(), vec![0, 2]);
        assert!(!session.toggle_selected(2).unwrap());

        session.toggle_all();
        assert_eq!(session.selected_indices(), vec![0, 1, 2]);
        session.toggle_all();
        assert!(session.selected_indices().is_empty());
    }

    #[test]
    fn export_requires_selection() {
        let session = extracted(&[1]);
        let backend = MockBackend::new();
        assert!(matches!(
            session.export_selected(&session.exporter(&backend)),
            Err(SessionError::NothingSelected)
        ));
    }

    #[test]
    fn export_selected_in_index_order() {
        let mut session = extracted(&[1, 2, 3]);
        session.toggle_selected(2).unwrap();
        session.toggle_selected(0).unwrap();
        let backend = MockBackend::new();

        let files = session
            .export_selected(&session.exporter(&backend))
            .unwrap()
            .into_result()
            .unwrap();
        let got: Vec<&str> = files.iter().map(|f| f.file.name.as_str()).collect();
        assert_eq!(got, vec!["001.jpg", "003.jpg"]);
    }

    // =========================================================================
    // Session file
    // =========================================================================

    #[test]
    fn session_file_parses_and_resolves_paths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("job.toml");
        fs::write(
            &path,
            r#"
pages = "pages"
names = "names.csv"

[[region]]
page = 2
capture = [200, 300]
rect = [10, 20, 100, 120]
rotation = 15

[[rename]]
page = 2
name = "Alice"
"#,
        )
        .unwrap();

        let file = SessionFile::load(&path).unwrap();
        assert_eq!(file.pages, tmp.path().join("pages"));
        assert_eq!(file.names, Some(tmp.path().join("names.csv")));
        assert_eq!(file.native_scale, 1.0);
        assert_eq!(file.regions[0].scale, 100.0);
        assert_eq!(file.regions[0].rotation, 15.0);

        let mut session = Session::new(test_config(), 3);
        file.apply_regions(&mut session).unwrap();
        assert_eq!(session.regions().selected_pages(), vec![2]);
        assert_eq!(
            session.regions().adjustment(2).unwrap().rotation_degrees,
            15.0
        );
    }

    #[test]
    fn session_file_nan_rect_rejected_before_extraction() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("job.toml");
        fs::write(
            &path,
            "pages = \"p\"\n[[region]]\npage = 1\ncapture = [200, 300]\nrect = [nan, 0.0, 100.0, 100.0]\n",
        )
        .unwrap();

        let file = SessionFile::load(&path).unwrap();
        let mut session = Session::new(test_config(), 3);
        assert_eq!(
            file.apply_regions(&mut session),
            Err(RegionError::NonFiniteSelection)
        );
        assert!(session.regions().is_empty());
    }

    #[test]
    fn session_file_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("job.toml");
        fs::write(&path, "pages = \"p\"\nzoom = 2\n").unwrap();
        assert!(matches!(SessionFile::load(&path), Err(SessionError::Toml(_))));
    }
}
