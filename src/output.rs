//! Result types returned by the conversion entry points.

use crate::error::DjvuPressError;
use crate::plan::SkipReason;
use serde::Serialize;
use std::path::PathBuf;

/// The outcome of one successfully converted book.
#[derive(Debug, Clone, Serialize)]
pub struct BookOutput {
    /// Book name from the spec.
    pub name: String,
    /// Path of the assembled DjVu document.
    pub document: PathBuf,
    /// Number of pages in the document.
    pub pages: usize,
    /// Whether an outline was attached.
    pub bookmarks_attached: bool,
    /// Timing breakdown.
    pub stats: BookStats,
}

/// Per-book timing statistics, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BookStats {
    pub extract_ms: u64,
    pub compress_ms: u64,
    pub assemble_ms: u64,
    pub total_ms: u64,
}

/// What happened to one book of a run.
///
/// A run never turns one book's failure into another book's failure; each
/// book gets exactly one outcome. The exception is a bug-class
/// [`DjvuPressError::Internal`], which aborts the whole run (see
/// [`crate::convert::convert_books`]).
#[derive(Debug)]
pub enum BookOutcome {
    /// The book converted end to end.
    Converted(BookOutput),
    /// The book was excluded at plan time, with a diagnostic.
    Skipped { name: String, reason: SkipReason },
    /// A stage failed; earlier stages' effects may persist.
    Failed {
        name: String,
        error: DjvuPressError,
    },
}

impl BookOutcome {
    /// The name of the book this outcome belongs to.
    pub fn name(&self) -> &str {
        match self {
            BookOutcome::Converted(output) => &output.name,
            BookOutcome::Skipped { name, .. } | BookOutcome::Failed { name, .. } => name,
        }
    }

    /// True only for a full conversion.
    pub fn is_converted(&self) -> bool {
        matches!(self, BookOutcome::Converted(_))
    }
}

/// The outcomes of a whole run, one entry per configured book.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<BookOutcome>,
}

impl RunReport {
    pub fn converted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_converted()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BookOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BookOutcome::Failed { .. }))
            .count()
    }
}
