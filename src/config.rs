//! Configuration types: global settings and per-book specifications.
//!
//! Behaviour is controlled by one immutable [`Settings`] value plus one
//! [`BookSpec`] per book. Keeping both as plain data makes it trivial to
//! share them across concurrently processed books, serialise them for
//! logging, and diff two runs to understand why their outputs differ.
//!
//! Many books are usually described at once, so the whole surface is also
//! deserialisable from a JSON manifest:
//!
//! ```json
//! {
//!   "settings": { "work_dir": "tmp", "out_dir": "out" },
//!   "books": [
//!     { "name": "atlas", "source": "books/atlas.pdf",
//!       "bookmarks": "books/atlas-outline.txt", "force_clean_up": true }
//!   ]
//! }
//! ```

use crate::error::DjvuPressError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global settings shared by every book in a run.
///
/// Immutable once constructed; passed by reference into plan construction
/// and stage execution. Both directories default relative to the process
/// working directory and are created on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory for intermediate files. Each book gets a private
    /// subdirectory `<work_dir>/<book name>`. Default: `tmp`.
    pub work_dir: PathBuf,

    /// Output directory for finished DjVu documents, unless a book carries
    /// its own override. Default: `out`.
    pub out_dir: PathBuf,

    /// Download timeout for URL book sources, in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("tmp"),
            out_dir: PathBuf::from("out"),
            download_timeout_secs: 120,
        }
    }
}

impl Settings {
    /// Re-root both directories under `root` when they are relative.
    pub fn relative_to(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        if self.work_dir.is_relative() {
            self.work_dir = root.join(&self.work_dir);
        }
        if self.out_dir.is_relative() {
            self.out_dir = root.join(&self.out_dir);
        }
        self
    }

    /// The private working directory for one book.
    pub fn book_work_dir(&self, book_name: &str) -> PathBuf {
        self.work_dir.join(book_name)
    }
}

/// One book to convert.
///
/// Built either from a manifest entry or programmatically via
/// [`BookSpec::new`] and its chainable setters:
///
/// ```rust
/// use djvupress::BookSpec;
///
/// let book = BookSpec::new("atlas", "books/atlas.pdf")
///     .bookmarks("books/atlas-outline.txt")
///     .force_clean_up(true);
/// assert_eq!(book.name, "atlas");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSpec {
    /// Unique book name; doubles as the working-subdirectory name.
    pub name: String,

    /// Book source: a path to a PDF file, a directory of page images, or an
    /// HTTP/HTTPS URL to a PDF.
    pub source: String,

    /// Optional file holding a djvused outline description.
    #[serde(default)]
    pub bookmarks: Option<PathBuf>,

    /// Optional per-book output directory override. Used only when it points
    /// at an existing directory.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// Exclude this book from the run.
    #[serde(default)]
    pub skip: bool,

    /// Wipe a non-empty book working directory and an existing destination
    /// document before converting. Without it, either condition stops the
    /// book so user edits are never overwritten silently.
    #[serde(default)]
    pub force_clean_up: bool,

    /// Keep intermediate files (the EPUB container, extracted pages,
    /// single-page DjVus). Portable maps are huge and deleted regardless.
    #[serde(default)]
    pub keep_intermediates: bool,
}

impl BookSpec {
    /// Create a book spec with defaulted flags.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            bookmarks: None,
            out_dir: None,
            skip: false,
            force_clean_up: false,
            keep_intermediates: false,
        }
    }

    pub fn bookmarks(mut self, path: impl Into<PathBuf>) -> Self {
        self.bookmarks = Some(path.into());
        self
    }

    pub fn out_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(path.into());
        self
    }

    pub fn skip(mut self, v: bool) -> Self {
        self.skip = v;
        self
    }

    pub fn force_clean_up(mut self, v: bool) -> Self {
        self.force_clean_up = v;
        self
    }

    pub fn keep_intermediates(mut self, v: bool) -> Self {
        self.keep_intermediates = v;
        self
    }

    /// True when a bookmarks file is configured and exists.
    pub fn bookmarks_found(&self) -> bool {
        self.bookmarks.as_deref().is_some_and(|p| p.is_file())
    }

    /// True when the per-book output override points at an existing
    /// directory.
    pub fn out_dir_valid(&self) -> bool {
        self.out_dir.as_deref().is_some_and(|p| p.is_dir())
    }
}

/// A run description: global settings plus the books to convert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub books: Vec<BookSpec>,
}

impl Manifest {
    /// Load and validate a JSON manifest.
    ///
    /// Book names must be unique: they double as working-subdirectory names,
    /// so a duplicate would let two books race on the same directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DjvuPressError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| DjvuPressError::io(path, e))?;
        let manifest: Manifest =
            serde_json::from_str(&text).map_err(|e| DjvuPressError::InvalidManifest {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let mut seen = std::collections::HashSet::new();
        for book in &manifest.books {
            if book.name.is_empty() {
                return Err(DjvuPressError::InvalidManifest {
                    path: path.to_path_buf(),
                    detail: "a book has an empty name".into(),
                });
            }
            if !seen.insert(book.name.as_str()) {
                return Err(DjvuPressError::InvalidManifest {
                    path: path.to_path_buf(),
                    detail: format!("duplicate book name '{}'", book.name),
                });
            }
        }

        Ok(manifest)
    }
}
