//! Progress-callback trait for per-book conversion events.
//!
//! Inject an [`Arc<dyn BookProgressCallback>`] via
//! [`crate::convert::RunOptions::progress`] to receive events as the run
//! moves through books and stages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a database record, or a terminal
//! progress bar without the library knowing anything about how the host
//! application communicates. The trait is `Send + Sync` because books may
//! be processed concurrently.

use std::sync::Arc;

/// Called by the orchestrator as it processes each book.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. When books run concurrently, callbacks for
/// different books may arrive interleaved from different tasks; protect
/// shared mutable state accordingly.
pub trait BookProgressCallback: Send + Sync {
    /// Called once before any book is processed.
    fn on_run_start(&self, total_books: usize) {
        let _ = total_books;
    }

    /// Called when a book's pipeline begins executing.
    fn on_book_start(&self, book: &str) {
        let _ = book;
    }

    /// Called when a stage of a book begins.
    fn on_stage_start(&self, book: &str, stage: &'static str) {
        let _ = (book, stage);
    }

    /// Called when a book converts successfully.
    fn on_book_complete(&self, book: &str, pages: usize) {
        let _ = (book, pages);
    }

    /// Called when a book is excluded at plan time.
    fn on_book_skipped(&self, book: &str, reason: &str) {
        let _ = (book, reason);
    }

    /// Called when a book fails mid-pipeline.
    fn on_book_failed(&self, book: &str, error: &str) {
        let _ = (book, error);
    }

    /// Called once after every book has an outcome.
    fn on_run_complete(&self, converted: usize, total_books: usize) {
        let _ = (converted, total_books);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BookProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::convert::RunOptions`].
pub type ProgressCallback = Arc<dyn BookProgressCallback>;
