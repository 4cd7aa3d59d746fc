use clap::{Parser, Subcommand};
use pageshot::archive::{NamedFile, writer_for};
use pageshot::export::ExportReport;
use pageshot::imaging::RustBackend;
use pageshot::name_list::ListFile;
use pageshot::rasterize::{PageDirectory, PageRasterizer};
use pageshot::session::{Session, SessionFile};
use pageshot::{config, output};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "pageshot")]
#[command(about = "Extract fixed-size ID photos from scanned document pages")]
#[command(long_about = "\
Extract fixed-size ID photos from scanned document pages

A session file lists the rendered page images, one rectangle per page and
optional rotation and zoom. Every region is fitted into the output frame,
named from a list or by sequence number, encoded under the file size limit
with the print density embedded, and written to a ZIP or a directory.

Session file:

  pages = \"pages\"            # page-001.png, page-002.png, ...
  native_scale = 1.0         # scale the page images were rendered at
  names = \"names.txt\"        # optional, .txt or .csv

  [[region]]
  page = 1
  capture = [918, 1188]      # raster size the rectangle was drawn on
  rect = [90, 120, 300, 380] # x, y, width, height
  rotation = 0.0
  scale = 100.0

  [[rename]]
  page = 1
  name = \"Chen Wei\"

Run 'pageshot gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every region and write the encoded images
    Extract {
        /// Session file
        #[arg(long)]
        session: PathBuf,
        /// Output: a .zip file, or a directory for loose files
        #[arg(long, default_value = "photos.zip")]
        output: PathBuf,
        /// Write a JSON report of every exported file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Render the preview of one page's region to a PNG
    Preview {
        #[arg(long)]
        session: PathBuf,
        #[arg(long)]
        page: u32,
        #[arg(long, default_value = "preview.png")]
        output: PathBuf,
    },
    /// Validate a session file without rendering
    Check {
        #[arg(long)]
        session: PathBuf,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Extract {
            session,
            output: out_path,
            report,
        } => {
            let (file, pages, mut session) = open_session(cli.config.as_deref(), &session)?;
            let backend = RustBackend::new();

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_export_event(&event) {
                        println!("{}", line);
                    }
                }
            });

            let exporter = session.exporter(&backend).with_events(tx);
            let extract_failure = session.extract(&exporter, &pages).err();
            if extract_failure.is_none() {
                file.apply_renames(&mut session)?;
            } else if !file.renames.is_empty() {
                warn!("extraction stopped early; renames skipped");
            }

            session.toggle_all();
            let batch = session.export_selected(&exporter)?;
            let settings = *exporter.settings();
            drop(exporter);
            if printer.join().is_err() {
                warn!("progress printer panicked");
            }

            let named: Vec<NamedFile> = batch.completed.iter().map(|f| f.file.clone()).collect();
            let written = writer_for(&out_path).write_files(&named)?;

            let failure = extract_failure.or(batch.failure);
            if let Some(path) = report {
                let report = ExportReport::new(
                    &settings,
                    session.selected_outputs(),
                    &batch.completed,
                    failure.as_ref(),
                );
                std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
            }

            println!();
            output::print_export_summary(&batch.completed, &written, failure.as_ref());
            if let Some(failure) = failure {
                return Err(failure.into());
            }
        }
        Command::Preview {
            session,
            page,
            output: out_path,
        } => {
            let (_, pages, session) = open_session(cli.config.as_deref(), &session)?;
            let image = session.preview(&pages, page)?;
            image.save(&out_path)?;
            println!("Preview of page {} → {}", page, out_path.display());
        }
        Command::Check { session } => {
            println!("==> Checking {}", session.display());
            let (_, _, session) = open_session(cli.config.as_deref(), &session)?;
            output::print_check_output(&session);
            println!("==> Session is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config and session file, open the page images and record regions
/// and the name list.
fn open_session(
    config_path: Option<&Path>,
    session_path: &Path,
) -> Result<(SessionFile, PageDirectory, Session), Box<dyn std::error::Error>> {
    let config = config::load_config(config_path)?;
    let file = SessionFile::load(session_path)?;
    let pages = PageDirectory::open(&file.pages, file.native_scale)?;

    let mut session = Session::new(config, pages.page_count());
    file.apply_regions(&mut session)?;
    if let Some(names) = &file.names {
        session.load_names(&ListFile, names)?;
    }
    Ok((file, pages, session))
}
