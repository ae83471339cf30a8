//! Error types for the djvupress library.
//!
//! A single fatal error type covers three distinct failure classes:
//!
//! * **Precondition failures** — a missing source, a missing external tool, a
//!   non-empty destination without `force_clean_up`. These carry a concrete
//!   remediation in their message and stop only the owning book.
//!
//! * **External-process failures** — a tool exited non-zero or could not be
//!   spawned. These name the tool and the input file and stop the owning
//!   stage (and therefore the book).
//!
//! * **Invariant failures** — [`DjvuPressError::Internal`]. These indicate
//!   the working-directory contract was violated (e.g. a directory the plan
//!   classified turns out to be a file) and abort the whole run; see
//!   [`DjvuPressError::is_internal`].
//!
//! Stage-local errors are never retried, and there is no partial-success
//! continuation within a stage: one failed page compression aborts the whole
//! pages→DjVu stage rather than skipping that page.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// All fatal errors returned by the djvupress library.
#[derive(Debug, Error)]
pub enum DjvuPressError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// The book source path does not exist.
    #[error("Book source not found: '{path}'\nCheck the path exists and is readable.")]
    SourceNotFound { path: PathBuf },

    /// The source resolved, but is neither a PDF file nor an image directory.
    #[error("'{book}' has a broken source: '{path}'\nA source must be a .pdf file or a directory holding at least one .jpg/.png page.")]
    BrokenSource { book: String, path: PathBuf },

    /// A downloaded source was not a PDF.
    #[error("Downloaded file is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Tool errors ───────────────────────────────────────────────────────
    /// A required external executable is not on PATH.
    #[error("{tool} not found on PATH.\n{hint}")]
    ToolNotFound {
        tool: &'static str,
        hint: &'static str,
    },

    /// A tool process could not be spawned or its output could not be read.
    #[error("Failed to run {tool} on '{input}': {source}")]
    ToolSpawn {
        tool: &'static str,
        input: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tool process exited with a non-zero status.
    #[error("{tool} failed on '{input}' ({status})")]
    ToolFailed {
        tool: &'static str,
        input: PathBuf,
        status: ExitStatus,
    },

    // ── Precondition errors ───────────────────────────────────────────────
    /// The book working directory holds files from a previous run.
    #[error(
        "Found files inside the '{book}' working directory: '{path}'\n\
         Re-running could overwrite changes you made to extracted pages.\n\
         Set 'force_clean_up = true' for '{book}' or delete the directory contents manually."
    )]
    DirtyWorkDir { book: String, path: PathBuf },

    /// The destination document already exists and `force_clean_up` is unset.
    #[error(
        "Found destination DjVu: '{path}'\n\
         Re-running could overwrite it. Set 'force_clean_up = true' for '{book}'\n\
         or delete the file manually. The book will not be processed."
    )]
    DestinationExists { book: String, path: PathBuf },

    /// The bookmarks file named by the book spec does not exist.
    #[error("Bookmarks file not found for '{book}': '{path}'")]
    BookmarksNotFound { book: String, path: PathBuf },

    /// The outline stage ran against a document that does not exist.
    #[error("DjVu document not found: '{path}'")]
    DocumentNotFound { path: PathBuf },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// A page image uses a pixel layout the portable-map encoder rejects.
    #[error("Unsupported pixel format in '{path}'\nOnly 8-bit RGB, RGBA and grayscale images can be encoded.")]
    UnsupportedImage { path: PathBuf },

    /// A page image could not be decoded at all.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    /// The document converter produced a container with no page entries.
    #[error("No page images were extracted for '{book}'\nThe PDF may hold no raster pages, or the converter changed its page naming.")]
    NoPagesExtracted { book: String },

    /// An external tool reported success but its output file is missing.
    #[error("'{path}' does not exist after the conversion process")]
    MissingOutput { path: PathBuf },

    /// JPEG→PNG transcoding would overwrite an existing PNG.
    #[error("'{path}' already exists. Aborting operation.")]
    PngCollision { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The book manifest could not be parsed or is inconsistent.
    #[error("Invalid manifest '{path}': {detail}")]
    InvalidManifest { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A filesystem operation failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Bug-class error: the working-directory contract was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DjvuPressError {
    /// Attach a path to a bare `io::Error`.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for bug-class errors that must abort the whole run rather than
    /// just the owning book.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
