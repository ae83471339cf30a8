//! CLI binary for djvupress.
//!
//! A thin shim over the library crate that maps CLI flags to book specs and
//! prints per-book results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use djvupress::{
    build_plan, BookOutcome, BookProgressCallback, BookSpec, Manifest, ProgressCallback,
    RunOptions, Settings, Toolset,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across all books, with per-stage log
/// lines printed above it. Books may complete out of order when `--jobs`
/// exceeds one.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:36.green/238}] {pos}/{len} books  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BookProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_books: usize) {
        self.bar.set_length(total_books as u64);
    }

    fn on_book_start(&self, book: &str) {
        self.bar.set_message(book.to_string());
    }

    fn on_stage_start(&self, book: &str, stage: &'static str) {
        self.bar
            .println(format!("  {} {}: {}", dim("·"), book, stage));
    }

    fn on_book_complete(&self, book: &str, pages: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            book,
            dim(&format!("{pages} pages"))
        ));
        self.bar.inc(1);
    }

    fn on_book_skipped(&self, book: &str, reason: &str) {
        let first_line = reason.lines().next().unwrap_or(reason);
        self.bar.println(format!(
            "  {} {}  {}",
            yellow("–"),
            book,
            dim(first_line)
        ));
        self.bar.inc(1);
    }

    fn on_book_failed(&self, book: &str, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar
            .println(format!("  {} {}  {}", red("✗"), book, red(first_line)));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _converted: usize, _total_books: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every book in a manifest
  djvupress convert books.json

  # Convert a single PDF without a manifest
  djvupress convert --name atlas --source books/atlas.pdf

  # A directory of scanned pages, with bookmarks and a clean re-run
  djvupress convert --name scans --source scans/ \
      --bookmarks outline.txt --force-clean-up

  # Show what would run, without running anything
  djvupress plan books.json

  # Convert the JPEGs of an images directory to PNG before hand-editing
  djvupress transcode tmp/atlas

MANIFEST FORMAT (JSON):
  {
    "settings": { "work_dir": "tmp", "out_dir": "out" },
    "books": [
      { "name": "atlas", "source": "books/atlas.pdf",
        "bookmarks": "books/atlas-outline.txt",
        "force_clean_up": true, "keep_intermediates": false }
    ]
  }

EXTERNAL TOOLS (must be on PATH):
  ebook-convert   Calibre     PDF → paginated EPUB
  c44             DjVuLibre   page image → single-page DjVu
  djvm            DjVuLibre   multipage assembly
  djvused         DjVuLibre   bookmarks
"#;

/// Convert books (PDFs or page-image directories) into DjVu documents.
#[derive(Parser, Debug)]
#[command(
    name = "djvupress",
    version,
    about = "Convert books (PDFs or page-image directories) into DjVu documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DJVUPRESS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DJVUPRESS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert the books of a manifest, or one book given by flags.
    Convert {
        #[command(flatten)]
        selection: BookSelection,

        /// Number of books processed concurrently.
        #[arg(short, long, env = "DJVUPRESS_JOBS", default_value_t = 1)]
        jobs: usize,

        /// Disable the progress bar.
        #[arg(long, env = "DJVUPRESS_NO_PROGRESS")]
        no_progress: bool,
    },
    /// Print each book's pipeline plan without running anything.
    Plan {
        #[command(flatten)]
        selection: BookSelection,
    },
    /// Convert every JPEG in an images directory to PNG (deletes the JPEGs).
    Transcode {
        /// Directory holding the images.
        dir: PathBuf,
    },
}

/// Either a manifest path, or the flags describing a single ad-hoc book.
#[derive(clap::Args, Debug)]
struct BookSelection {
    /// JSON manifest of settings and books.
    manifest: Option<PathBuf>,

    /// Single-book mode: book name.
    #[arg(long, requires = "source", conflicts_with = "manifest")]
    name: Option<String>,

    /// Single-book mode: source PDF, image directory, or URL.
    #[arg(long, requires = "name", conflicts_with = "manifest")]
    source: Option<String>,

    /// Single-book mode: bookmarks file for djvused.
    #[arg(long, requires = "name")]
    bookmarks: Option<PathBuf>,

    /// Single-book mode: output directory override.
    #[arg(long, requires = "name")]
    out_dir: Option<PathBuf>,

    /// Single-book mode: wipe a dirty working directory and an existing
    /// destination before converting.
    #[arg(long, requires = "name")]
    force_clean_up: bool,

    /// Single-book mode: keep intermediate files (except portable maps).
    #[arg(long, requires = "name")]
    keep_intermediates: bool,

    /// Working directory for intermediate files.
    #[arg(long, env = "DJVUPRESS_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Output directory for finished documents.
    #[arg(long, env = "DJVUPRESS_OUT_DIR")]
    global_out_dir: Option<PathBuf>,
}

impl BookSelection {
    /// Resolve to settings plus the books to operate on.
    fn resolve(&self) -> Result<(Settings, Vec<BookSpec>)> {
        let (mut settings, books) = if let Some(manifest_path) = &self.manifest {
            let manifest = Manifest::load(manifest_path)
                .with_context(|| format!("Failed to load manifest {}", manifest_path.display()))?;
            if manifest.books.is_empty() {
                bail!("Manifest lists no books");
            }
            (manifest.settings, manifest.books)
        } else if let (Some(name), Some(source)) = (&self.name, &self.source) {
            let mut book = BookSpec::new(name, source)
                .force_clean_up(self.force_clean_up)
                .keep_intermediates(self.keep_intermediates);
            if let Some(bookmarks) = &self.bookmarks {
                book = book.bookmarks(bookmarks);
            }
            if let Some(out_dir) = &self.out_dir {
                book = book.out_dir(out_dir);
            }
            (Settings::default(), vec![book])
        } else {
            bail!("Give a manifest path, or --name and --source for a single book");
        };

        if let Some(work_dir) = &self.work_dir {
            settings.work_dir = work_dir.clone();
        }
        if let Some(out_dir) = &self.global_out_dir {
            settings.out_dir = out_dir.clone();
        }
        Ok((settings, books))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides the feedback that matters; suppress
    // INFO-level library logs while it is active unless --verbose asks for
    // everything.
    let show_progress = matches!(
        &cli.command,
        Command::Convert {
            no_progress: false,
            ..
        }
    ) && !cli.quiet
        && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Convert {
            selection, jobs, ..
        } => run_convert(selection, *jobs, show_progress, cli.quiet).await,
        Command::Plan { selection } => run_plan(selection).await,
        Command::Transcode { dir } => {
            let converted = djvupress::pipeline::transcode::run(dir)
                .await
                .context("Transcode failed")?;
            if !cli.quiet {
                eprintln!("{} {} files converted", green("✔"), bold(&converted.to_string()));
            }
            Ok(())
        }
    }
}

async fn run_convert(
    selection: &BookSelection,
    jobs: usize,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let (settings, books) = selection.resolve()?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as ProgressCallback)
    } else {
        None
    };
    let mut options = RunOptions::default().jobs(jobs);
    if let Some(cb) = progress {
        options = options.progress(cb);
    }

    let report = djvupress::convert_books(&books, &settings, &options)
        .await
        .context("Conversion run aborted")?;

    // ── Summary ──────────────────────────────────────────────────────────
    if !quiet {
        for outcome in &report.outcomes {
            match outcome {
                BookOutcome::Converted(output) => eprintln!(
                    "{} {}  →  {}  {}",
                    green("✔"),
                    bold(&output.name),
                    output.document.display(),
                    dim(&format!("{} pages, {}ms", output.pages, output.stats.total_ms)),
                ),
                BookOutcome::Skipped { name, reason } => {
                    eprintln!("{} {}  {}", yellow("–"), bold(name), reason)
                }
                BookOutcome::Failed { name, error } => {
                    eprintln!("{} {}  {}", red("✘"), bold(name), error)
                }
            }
        }
    }

    if report.converted() == 0 && report.failed() > 0 {
        bail!("No book converted successfully");
    }
    Ok(())
}

async fn run_plan(selection: &BookSelection) -> Result<()> {
    let (settings, books) = selection.resolve()?;
    let tools = Toolset::discover();

    for book in &books {
        if book.skip {
            println!("{}  skipped by configuration", yellow(&book.name));
            continue;
        }
        let resolved =
            djvupress::pipeline::input::resolve_source(&book.source, settings.download_timeout_secs)
                .await;
        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                println!("{}  {}", red(&book.name), e);
                continue;
            }
        };

        match build_plan(book, resolved.path(), &settings, &tools) {
            Ok(plan) => {
                println!("{}  ({:?})", bold(&book.name), plan.source_kind);
                for stage in &plan.stages {
                    println!("    {}", stage.name());
                }
                if let Some(destination) = plan.destination() {
                    println!("    {} {}", dim("→"), destination.display());
                }
            }
            Err(reason) => println!("{}  {}", yellow(&book.name), reason),
        }
    }
    Ok(())
}
