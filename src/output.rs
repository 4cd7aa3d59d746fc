//! CLI output formatting.
//!
//! Output leads with what the user cares about: which page became which
//! image, and whether it fits the upload limits. Paths and encoder details
//! are indented context lines under each entry.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Pages: 12
//! Regions (2)
//! 001 Page 1
//!     Region: x 0.100 y 0.120 w 0.300 h 0.380
//! 002 Page 4
//!     Region: x 0.050 y 0.500 w 0.400 h 0.450
//!     Rotation: 15.0°  Scale: 120%
//! Names
//!     sequential, 25 names loaded
//! Output
//!     413×531 at 300 dpi, jpeg q0.92, max 1.00 MB
//! ```
//!
//! ## Extract
//!
//! ```text
//! [1/2] Page 1
//!     → Chen Wei
//! [2/2] Page 4
//!     render failed, retry 1 in 300ms
//!     → Li Na
//!         Warning: Aspect ratio deviates from target by more than 5%
//! 001 Chen Wei.jpg (184.2 KB, jpeg q0.92)
//! 002 Li Na.jpg (1.01 MB, jpeg q0.10)
//!     Over size limit at minimum quality
//!
//! Exported 2 files, 1.19 MB
//!     → photos.zip
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::export::{ExportEvent, ExportedFile, PageFailure};
use crate::region::{Adjustment, Region};
use crate::session::Session;
use std::path::PathBuf;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count: `B`, then `KB` with one decimal, then `MB`
/// with two.
pub fn format_file_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.2} MB", b / MB)
    }
}

fn region_line(region: &Region) -> String {
    format!(
        "Region: x {:.3} y {:.3} w {:.3} h {:.3}",
        region.x, region.y, region.width, region.height
    )
}

/// Only shown when the adjustment differs from identity.
fn adjustment_line(adjustment: &Adjustment) -> Option<String> {
    (*adjustment != Adjustment::default()).then(|| {
        format!(
            "Rotation: {:.1}°  Scale: {:.0}%",
            adjustment.rotation_degrees, adjustment.scale_percent
        )
    })
}

// ============================================================================
// Check output
// ============================================================================

/// Format the state of a session before anything is rendered.
pub fn format_check_output(session: &Session) -> Vec<String> {
    let mut lines = Vec::new();
    let regions = session.regions();

    lines.push(format!("Pages: {}", regions.total_pages()));

    lines.push(format!("Regions ({})", regions.len()));
    for (i, (page, region, adjustment)) in regions.iter().enumerate() {
        lines.push(format!("{} Page {}", format_index(i + 1), page));
        lines.push(format!("{}{}", indent(1), region_line(region)));
        if let Some(line) = adjustment_line(&adjustment) {
            lines.push(format!("{}{}", indent(1), line));
        }
    }

    lines.push("Names".to_string());
    let mode = session.names().mode();
    match session.names().pool() {
        Some(pool) => lines.push(format!("{}{}, {} names loaded", indent(1), mode, pool.len())),
        None => lines.push(format!("{}{}, no name list", indent(1), mode)),
    }

    let output = &session.config().output;
    lines.push("Output".to_string());
    lines.push(format!(
        "{}{} at {} dpi, {} q{:.2}, max {}",
        indent(1),
        session.frame(),
        output.dpi,
        output.format,
        output.quality,
        format_file_size(output.max_file_bytes)
    ));

    lines
}

pub fn print_check_output(session: &Session) {
    for line in format_check_output(session) {
        println!("{}", line);
    }
}

// ============================================================================
// Extract progress
// ============================================================================

/// Format a single export progress event as display lines.
pub fn format_export_event(event: &ExportEvent) -> Vec<String> {
    match event {
        ExportEvent::PageStarted {
            position,
            total,
            page,
        } => vec![format!("[{}/{}] Page {}", position, total, page)],
        ExportEvent::RenderRetry { retry, delay, .. } => vec![format!(
            "{}render failed, retry {} in {}ms",
            indent(1),
            retry,
            delay.as_millis()
        )],
        ExportEvent::PageExtracted { name, warnings, .. } => {
            let mut lines = vec![format!("{}→ {}", indent(1), name)];
            for warning in warnings {
                lines.push(format!("{}Warning: {}", indent(2), warning));
            }
            lines
        }
        ExportEvent::FileEncoded {
            position,
            file_name,
            size,
            format,
            quality,
            downgraded,
            budget_exceeded,
        } => {
            let mut lines = vec![format!(
                "{} {} ({}, {} q{})",
                format_index(*position),
                file_name,
                format_file_size(*size),
                format,
                quality
            )];
            if *downgraded {
                lines.push(format!("{}Switched to JPEG to fit size limit", indent(1)));
            }
            if *budget_exceeded {
                lines.push(format!("{}Over size limit at minimum quality", indent(1)));
            }
            lines
        }
    }
}

// ============================================================================
// Export summary
// ============================================================================

/// Format the closing summary of an export run.
pub fn format_export_summary(
    files: &[ExportedFile],
    written: &[PathBuf],
    failure: Option<&PageFailure>,
) -> Vec<String> {
    let total: usize = files.iter().map(|f| f.file.bytes.len()).sum();
    let noun = if files.len() == 1 { "file" } else { "files" };

    let mut lines = vec![format!(
        "Exported {} {}, {}",
        files.len(),
        noun,
        format_file_size(total)
    )];
    for path in written {
        lines.push(format!("{}→ {}", indent(1), path.display()));
    }
    if let Some(failure) = failure {
        lines.push(format!("Stopped: {}", failure));
    }
    lines
}

pub fn print_export_summary(
    files: &[ExportedFile],
    written: &[PathBuf],
    failure: Option<&PageFailure>,
) {
    for line in format_export_summary(files, written, failure) {
        println!("{}", line);
    }
}
