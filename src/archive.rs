//! Writing exported files: one ZIP stream or a plain directory.
//!
//! Files arrive in export order as `{name, bytes}` pairs. Names come from
//! user input, so every name is reduced to a single path component first
//! (see [`sanitize_file_name`]). A repeated name gets a ` (2)`, ` (3)`, …
//! suffix before the extension, since image names are not required to be
//! unique.

use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// One exported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFile {
    /// File name including extension.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Destination for a finished export.
pub trait ArchiveWriter {
    /// Write every file; returns the paths written.
    fn write_files(&self, files: &[NamedFile]) -> Result<Vec<PathBuf>, ArchiveError>;
}

/// Everything packed into a single ZIP file.
#[derive(Debug, Clone)]
pub struct ZipFileWriter {
    pub path: PathBuf,
}

/// Loose files in a directory, created if missing.
#[derive(Debug, Clone)]
pub struct DirectoryWriter {
    pub path: PathBuf,
}

impl ArchiveWriter for ZipFileWriter {
    fn write_files(&self, files: &[NamedFile]) -> Result<Vec<PathBuf>, ArchiveError> {
        let bytes = zip_archive(files)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, bytes)?;
        Ok(vec![self.path.clone()])
    }
}

impl ArchiveWriter for DirectoryWriter {
    fn write_files(&self, files: &[NamedFile]) -> Result<Vec<PathBuf>, ArchiveError> {
        write_directory(&self.path, files)
    }
}

/// Pick the writer from the output path: `*.zip` is an archive, anything
/// else a directory.
pub fn writer_for(path: &Path) -> Box<dyn ArchiveWriter> {
    let is_zip = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if is_zip {
        Box::new(ZipFileWriter {
            path: path.to_path_buf(),
        })
    } else {
        Box::new(DirectoryWriter {
            path: path.to_path_buf(),
        })
    }
}

/// Pack `files` into an in-memory ZIP (deflate).
pub fn zip_archive(files: &[NamedFile]) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (file, name) in files.iter().zip(unique_names(files)) {
        debug!(name = %name, size = file.bytes.len(), "adding to archive");
        zip.start_file(name, options)?;
        zip.write_all(&file.bytes)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Write `files` into `dir`.
pub fn write_directory(dir: &Path, files: &[NamedFile]) -> Result<Vec<PathBuf>, ArchiveError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(files.len());
    for (file, name) in files.iter().zip(unique_names(files)) {
        let path = dir.join(name);
        fs::write(&path, &file.bytes)?;
        written.push(path);
    }
    Ok(written)
}

/// Reduce `name` to one file name that stays inside its directory.
///
/// Path separators and control characters become `_`; surrounding
/// whitespace and leading dots are dropped. Nothing left becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_start_matches('.').trim_start();
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitized file names with repeats disambiguated, in input order.
pub fn unique_names(files: &[NamedFile]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    files
        .iter()
        .map(|file| {
            let base = sanitize_file_name(&file.name);
            let mut candidate = base.clone();
            let mut n = 2;
            while seen.contains(&candidate) {
                candidate = with_suffix(&base, n);
                n += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

fn with_suffix(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}
