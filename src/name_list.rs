//! Name list loading.
//!
//! Plain text lists hold one name per line. CSV lists take the first column
//! of every record, so quoted names may contain commas. Anything else,
//! spreadsheets included, is rejected.

use crate::naming::NamePool;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("unsupported name list format: {0} (use .txt or .csv)")]
    UnsupportedListFormat(String),
}

/// Where names come from.
pub trait NameSource {
    fn load(&self, path: &Path) -> Result<Vec<String>, ListError>;
}

/// The `.txt` / `.csv` loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFile;

impl NameSource for ListFile {
    fn load(&self, path: &Path) -> Result<Vec<String>, ListError> {
        load_names(path)
    }
}

/// Read a name list from disk. Names are trimmed and blanks dropped.
pub fn load_names(path: &Path) -> Result<Vec<String>, ListError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let parse: fn(&str) -> Result<Vec<String>, ListError> = match ext.as_str() {
        "txt" => parse_text,
        "csv" => parse_csv,
        _ => return Err(ListError::UnsupportedListFormat(path.display().to_string())),
    };

    let content = fs::read_to_string(path)?;
    parse(content.trim_start_matches('\u{feff}'))
}

/// Load straight into a [`NamePool`].
pub fn load_pool(source: &impl NameSource, path: &Path) -> Result<NamePool, ListError> {
    Ok(NamePool::new(source.load(path)?))
}

fn parse_text(content: &str) -> Result<Vec<String>, ListError> {
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn parse_csv(content: &str) -> Result<Vec<String>, ListError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(content.as_bytes());

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(first) = record.get(0) else {
            continue;
        };
        // Single quotes are not CSV quoting but show up in hand-made lists.
        let name = first
            .trim()
            .trim_start_matches('\'')
            .trim_end_matches('\'')
            .trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn text_one_name_per_line() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "names.txt", "Alice\n\n  Bob  \r\nCarol\n");
        assert_eq!(load_names(&path).unwrap(), vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn csv_first_column_unquoted() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "names.CSV",
            "\"Alice\",10\n'Bob',20\n  Carol ,30\n,40\n\"\"\n",
        );
        assert_eq!(load_names(&path).unwrap(), vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn csv_quoted_name_keeps_comma() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "names.csv", "\"Chen, Wei\",A01\r\n\"Lin Mei\",A02\n");
        assert_eq!(load_names(&path).unwrap(), vec!["Chen, Wei", "Lin Mei"]);
    }

    #[test]
    fn csv_ragged_rows_accepted() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "names.csv", "Alice\nBob,20,extra\n\"Carol \"\"CJ\"\"\"\n");
        assert_eq!(
            load_names(&path).unwrap(),
            vec!["Alice", "Bob", "Carol \"CJ\""]
        );
    }

    #[test]
    fn bom_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "names.txt", "\u{feff}Alice\nBob\n");
        assert_eq!(load_names(&path).unwrap(), vec!["Alice", "Bob"]);
    }

    #[test]
    fn spreadsheet_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "names.xlsx", "PK");
        assert!(matches!(
            load_names(&path),
            Err(ListError::UnsupportedListFormat(_))
        ));
    }

    #[test]
    fn missing_extension_rejected() {
        assert!(matches!(
            load_names(Path::new("names")),
            Err(ListError::UnsupportedListFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            load_names(Path::new("/nonexistent/names.txt")),
            Err(ListError::Io(_))
        ));
    }

    #[test]
    fn load_pool_builds_pool() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "names.txt", "A\nB\n");
        let pool = load_pool(&ListFile, &path).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(1), Some("B"));
    }
}
