//! Conversion entry points: run one book, or a whole manifest of books.
//!
//! ## Execution model
//!
//! Within a book everything is strictly sequential: each stage — and every
//! external process a stage spawns — completes before the next begins.
//! Across books there is no shared mutable state (each book owns
//! `<work_dir>/<name>`), so [`convert_books`] may run several books
//! concurrently, bounded by [`RunOptions::jobs`].
//!
//! ## Failure containment
//!
//! A book that cannot be planned is *skipped* with a diagnostic; a book
//! whose stage fails is *failed* with the stage's error; neither touches
//! the other books. The one exception is a bug-class
//! [`crate::error::DjvuPressError::Internal`] — a violated
//! working-directory contract — which aborts the whole run immediately.

use crate::config::{BookSpec, Settings};
use crate::error::DjvuPressError;
use crate::output::{BookOutcome, BookOutput, BookStats, RunReport};
use crate::pipeline::{assemble, compress, extract, input, outline};
use crate::plan::{self, PipelinePlan, SkipReason, Stage};
use crate::progress::ProgressCallback;
use crate::tools::Toolset;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{error, info};

/// Knobs for a multi-book run.
#[derive(Default)]
pub struct RunOptions {
    /// Maximum number of books processed concurrently. `0` and `1` both
    /// mean sequential.
    pub jobs: usize,
    /// Optional progress event sink.
    pub progress: Option<ProgressCallback>,
}

impl RunOptions {
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Convert every book in the list, reporting one outcome per book.
///
/// Tool discovery happens exactly once, up front. Returns `Err` only for
/// bug-class internal errors; every ordinary failure lands in the report.
pub async fn convert_books(
    books: &[BookSpec],
    settings: &Settings,
    options: &RunOptions,
) -> Result<RunReport, DjvuPressError> {
    let tools = Toolset::discover();
    if let Some(cb) = &options.progress {
        cb.on_run_start(books.len());
    }

    let jobs = options.jobs.max(1);
    let mut outcomes = Vec::with_capacity(books.len());
    {
        let mut stream = stream::iter(
            books
                .iter()
                .map(|book| convert_book_with(book, settings, &tools, options.progress.as_ref())),
        )
        .buffer_unordered(jobs);

        while let Some(outcome) = stream.next().await {
            match outcome {
                // The working-directory contract is broken; nothing this run
                // does can be trusted any more. In-flight books are dropped.
                BookOutcome::Failed { name, error } if error.is_internal() => {
                    error!("'{}' hit a bug-class error; aborting run", name);
                    return Err(error);
                }
                outcome => outcomes.push(outcome),
            }
        }
    }

    // Stable report order regardless of completion order.
    let order: std::collections::HashMap<&str, usize> = books
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();
    outcomes.sort_by_key(|o| order.get(o.name()).copied().unwrap_or(usize::MAX));

    let report = RunReport { outcomes };
    if let Some(cb) = &options.progress {
        cb.on_run_complete(report.converted(), books.len());
    }
    Ok(report)
}

/// Convert a single book with a freshly discovered toolset.
///
/// This is the convenience path for one-off conversions; multi-book runs
/// should use [`convert_books`] so tools are discovered once.
pub async fn convert_book(book: &BookSpec, settings: &Settings) -> BookOutcome {
    let tools = Toolset::discover();
    convert_book_with(book, settings, &tools, None).await
}

/// Convert a single book against an existing toolset.
pub async fn convert_book_with(
    book: &BookSpec,
    settings: &Settings,
    tools: &Toolset,
    progress: Option<&ProgressCallback>,
) -> BookOutcome {
    // ── Step 1: Honour the skip flag before touching anything ────────────
    // A skipped book must not require its source to exist, let alone be
    // downloaded.
    if book.skip {
        info!("'{}' skipped", book.name);
        if let Some(cb) = progress {
            cb.on_book_skipped(&book.name, &SkipReason::Requested.to_string());
        }
        return BookOutcome::Skipped {
            name: book.name.clone(),
            reason: SkipReason::Requested,
        };
    }

    // ── Step 2: Resolve the source ───────────────────────────────────────
    let resolved = match input::resolve_source(&book.source, settings.download_timeout_secs).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("'{}': {}", book.name, e);
            if let Some(cb) = progress {
                cb.on_book_failed(&book.name, &e.to_string());
            }
            return BookOutcome::Failed {
                name: book.name.clone(),
                error: e,
            };
        }
    };

    // ── Step 3: Build the plan ───────────────────────────────────────────
    let plan = match plan::build_plan(book, resolved.path(), settings, tools) {
        Ok(plan) => plan,
        Err(reason) => {
            info!("'{}' {}", book.name, reason);
            if let Some(cb) = progress {
                cb.on_book_skipped(&book.name, &reason.to_string());
            }
            return BookOutcome::Skipped {
                name: book.name.clone(),
                reason,
            };
        }
    };

    // ── Step 4: Execute the stages ───────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_book_start(&book.name);
    }
    match run_pipeline(book, &plan, tools, progress).await {
        Ok(output) => {
            info!(
                "'{}' converted: {} ({} pages, {}ms)",
                book.name,
                output.document.display(),
                output.pages,
                output.stats.total_ms
            );
            if let Some(cb) = progress {
                cb.on_book_complete(&book.name, output.pages);
            }
            BookOutcome::Converted(output)
        }
        Err(e) => {
            error!("'{}' failed: {}", book.name, e);
            if let Some(cb) = progress {
                cb.on_book_failed(&book.name, &e.to_string());
            }
            BookOutcome::Failed {
                name: book.name.clone(),
                error: e,
            }
        }
    }
}

/// Run every stage of a built plan, in order.
async fn run_pipeline(
    book: &BookSpec,
    plan: &PipelinePlan,
    tools: &Toolset,
    progress: Option<&ProgressCallback>,
) -> Result<BookOutput, DjvuPressError> {
    let total_start = Instant::now();
    let mut stats = BookStats::default();

    // The destination precondition runs before any stage writes, so a
    // stopped book leaves the filesystem exactly as it found it.
    let destination = plan
        .destination()
        .ok_or_else(|| DjvuPressError::Internal("plan has no assembly stage".into()))?
        .to_path_buf();
    assemble::check_destination(book, &destination)?;

    let mut pages = Vec::new();
    let mut page_count = 0usize;
    let mut bookmarks_attached = false;

    for stage in &plan.stages {
        if let Some(cb) = progress {
            cb.on_stage_start(&book.name, stage.name());
        }
        let stage_start = Instant::now();

        match stage {
            Stage::ExtractPages { source, pages_dir } => {
                extract::run(book, source, pages_dir, tools).await?;
                stats.extract_ms = stage_start.elapsed().as_millis() as u64;
            }
            Stage::CompressPages {
                pages_dir,
                work_dir,
                owned_pages,
            } => {
                pages = compress::run(book, pages_dir, work_dir, *owned_pages, tools).await?;
                page_count = pages.len();
                stats.compress_ms = stage_start.elapsed().as_millis() as u64;
            }
            Stage::AssembleDocument { destination } => {
                assemble::run(book, std::mem::take(&mut pages), destination, tools).await?;
                stats.assemble_ms = stage_start.elapsed().as_millis() as u64;
            }
            Stage::AttachOutline {
                bookmarks,
                destination,
            } => {
                outline::run(book, bookmarks, destination, tools).await?;
                bookmarks_attached = true;
            }
        }
    }

    stats.total_ms = total_start.elapsed().as_millis() as u64;
    Ok(BookOutput {
        name: book.name.clone(),
        document: destination,
        pages: page_count,
        bookmarks_attached,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn all_tools() -> Toolset {
        Toolset {
            ebook_convert: Some("/opt/calibre/ebook-convert".into()),
            c44: Some("/usr/bin/c44".into()),
            djvm: Some("/usr/bin/djvm".into()),
            djvused: Some("/usr/bin/djvused".into()),
        }
    }

    #[tokio::test]
    async fn missing_source_fails_the_book_only() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default().relative_to(dir.path());
        let book = BookSpec::new("ghost", dir.path().join("ghost.pdf").to_string_lossy());

        let outcome = convert_book_with(&book, &settings, &all_tools(), None).await;
        match outcome {
            BookOutcome::Failed { name, error } => {
                assert_eq!(name, "ghost");
                assert!(matches!(error, DjvuPressError::SourceNotFound { .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn skip_flag_yields_skipped_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("atlas.pdf");
        fs::write(&pdf, b"%PDF-1.4").unwrap();
        let settings = Settings::default().relative_to(dir.path());
        let book = BookSpec::new("atlas", pdf.to_string_lossy()).skip(true);

        let outcome = convert_book_with(&book, &settings, &all_tools(), None).await;
        assert!(matches!(outcome, BookOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn existing_destination_stops_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default().relative_to(dir.path());

        let scans = dir.path().join("scans");
        fs::create_dir(&scans).unwrap();
        fs::write(scans.join("page-1.png"), b"x").unwrap();

        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        let destination = out_dir.join("scans.djvu");
        fs::write(&destination, b"previous run").unwrap();

        let book = BookSpec::new("scans", scans.to_string_lossy());
        let outcome = convert_book_with(&book, &settings, &all_tools(), None).await;

        match outcome {
            BookOutcome::Failed { error, .. } => {
                assert!(matches!(error, DjvuPressError::DestinationExists { .. }));
            }
            other => panic!("expected destination conflict, got {other:?}"),
        }
        // No writes anywhere: destination intact, no book work dir created.
        assert_eq!(fs::read(&destination).unwrap(), b"previous run");
        assert!(!settings.book_work_dir("scans").exists());
    }

    #[tokio::test]
    async fn run_report_keeps_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default().relative_to(dir.path());

        // Outcomes must come back in manifest order even when completion
        // order differs.
        let books = vec![
            BookSpec::new("first", dir.path().join("first.pdf").to_string_lossy()).skip(true),
            BookSpec::new("second", dir.path().join("second.pdf").to_string_lossy()).skip(true),
        ];

        let report = convert_books(&books, &settings, &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].name(), "first");
        assert_eq!(report.outcomes[1].name(), "second");
        assert_eq!(report.skipped(), 2);
    }

    #[tokio::test]
    async fn work_dir_collision_fails_the_book_not_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default().relative_to(dir.path());

        let scans = dir.path().join("scans");
        fs::create_dir(&scans).unwrap();
        fs::write(scans.join("page-1.png"), b"x").unwrap();

        // `<work_dir>/<book>` exists as a *file*, so creating the book work
        // dir fails at the compression stage.
        fs::create_dir_all(settings.work_dir.as_path()).unwrap();
        fs::write(settings.book_work_dir("scans"), b"not a dir").unwrap();

        let books = vec![
            BookSpec::new("scans", scans.to_string_lossy()),
            BookSpec::new("other", dir.path().join("none.pdf").to_string_lossy()).skip(true),
        ];
        let report = convert_books(&books, &settings, &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
    }
}
