//! # djvupress
//!
//! Convert books — PDF files or directories of page images — into multi-page
//! DjVu documents, optionally with bookmarks.
//!
//! ## Why this crate?
//!
//! DjVuLibre ships excellent single-purpose tools but no "take this book and
//! make a DjVu of it" command: `c44` compresses exactly one portable map,
//! `djvm` appends exactly one page, and neither reads JPEG, PNG or PDF.
//! This crate orchestrates the whole chain — Calibre for pagination,
//! pixel-exact PNM encoding in-process, DjVuLibre for compression and
//! assembly — with the safety rails (clean-destination checks, canonical
//! page ordering, intermediate cleanup) that make re-runs predictable.
//!
//! ## Pipeline Overview
//!
//! ```text
//! book source (PDF / image dir / URL)
//!  │
//!  ├─ 1. Input     resolve local path or download
//!  ├─ 2. Extract   PDF → EPUB via ebook-convert, unpack + rename pages
//!  ├─ 3. Compress  page image → PPM/PGM → single-page DjVu via c44
//!  ├─ 4. Assemble  djvm -c / djvm -i, pages in canonical order
//!  └─ 5. Outline   djvused set-outline (optional)
//! ```
//!
//! Stages 2–5 are planned per book ([`plan::build_plan`]): image-set books
//! skip extraction, books without bookmarks skip the outline, and missing
//! external tools demote a book to a diagnosed skip before anything runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use djvupress::{convert_book, BookOutcome, BookSpec, Settings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::default();
//!     let book = BookSpec::new("atlas", "books/atlas.pdf")
//!         .bookmarks("books/atlas-outline.txt");
//!     match convert_book(&book, &settings).await {
//!         BookOutcome::Converted(output) => {
//!             println!("{} pages → {}", output.pages, output.document.display())
//!         }
//!         BookOutcome::Skipped { reason, .. } => eprintln!("skipped: {reason}"),
//!         BookOutcome::Failed { error, .. } => eprintln!("failed: {error}"),
//!     }
//! }
//! ```
//!
//! ## External tools
//!
//! | Tool | Package | Used for |
//! |------|---------|----------|
//! | `ebook-convert` | Calibre | PDF → paginated EPUB |
//! | `c44` | DjVuLibre | page image → single-page DjVu |
//! | `djvm` | DjVuLibre | multipage assembly |
//! | `djvused` | DjVuLibre | bookmarks |
//!
//! All four are located by name on `PATH` once per run; a missing tool
//! produces a diagnostic naming the package to install, never a silent skip.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `djvupress` binary (clap + anyhow + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod tools;
mod util;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BookSpec, Manifest, Settings};
pub use convert::{convert_book, convert_book_with, convert_books, RunOptions};
pub use error::DjvuPressError;
pub use output::{BookOutcome, BookOutput, BookStats, RunReport};
pub use pipeline::encode::PortableMapFormat;
pub use plan::{build_plan, PipelinePlan, SkipReason, SourceKind, Stage};
pub use progress::{BookProgressCallback, NoopProgressCallback, ProgressCallback};
pub use tools::{LogChannel, Toolset};
