//! Pipeline planning: decide, per book, which stages run and on what paths.
//!
//! The plan is an explicit value — a plain ordered list of stage descriptors
//! with their input/output directories already bound — built once before any
//! stage executes. The builder returns either a [`PipelinePlan`] or a
//! structured [`SkipReason`], so the orchestrator inspects one result instead
//! of threading boolean flags through control flow.
//!
//! Planning also performs the tool-availability gate: a stage family is only
//! registered when its executables were found, and a missing family demotes
//! the book to a skip with a diagnostic naming the missing dependency —
//! never a silent skip. A PDF book whose converter is unavailable is skipped
//! entirely; there is no partial fallback that would feed a raw PDF to the
//! image stages.

use crate::config::{BookSpec, Settings};
use crate::tools::{Toolset, DJVUSED, EBOOK_CONVERT};
use crate::util::{filename_without_extension, has_extension, is_supported_image};
use std::fmt;
use std::path::{Path, PathBuf};

/// What kind of source a book resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A single PDF file; pages must be extracted first.
    Document,
    /// A directory holding at least one JPEG/PNG page.
    ImageSet,
}

/// Why a book was excluded from the run.
///
/// Every variant renders a user-actionable diagnostic; the orchestrator logs
/// it and moves on to the next book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The book spec sets `skip = true`.
    Requested,
    /// The source is neither a PDF nor an image set.
    Broken { path: PathBuf },
    /// The source is a PDF but Calibre's converter is not installed.
    MissingDocumentConverter,
    /// DjVuLibre's build tools are not installed.
    MissingDjvuTools { tool: &'static str },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Requested => write!(f, "skipped by configuration"),
            SkipReason::Broken { path } => write!(
                f,
                "source '{}' has wrong settings/data or is unsupported",
                path.display()
            ),
            SkipReason::MissingDocumentConverter => write!(
                f,
                "book is a PDF, but cannot be processed: {} not found.\n\
                 Install Calibre and add its installation directory to the PATH environment variable.",
                EBOOK_CONVERT
            ),
            SkipReason::MissingDjvuTools { tool } => write!(
                f,
                "cannot process images: {} not found.\n\
                 Install DjVuLibre and add its installation directory to the PATH environment variable.",
                tool
            ),
        }
    }
}

/// One stage of a book's pipeline, with its paths already bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Convert the PDF into a paginated container and unpack canonical page
    /// images into `pages_dir`.
    ExtractPages { source: PathBuf, pages_dir: PathBuf },
    /// Encode and compress every page in `pages_dir` into single-page DjVus
    /// under `work_dir`. `owned_pages` marks pages produced by extraction —
    /// only those may be deleted after consumption.
    CompressPages {
        pages_dir: PathBuf,
        work_dir: PathBuf,
        owned_pages: bool,
    },
    /// Assemble single-page DjVus into the destination document.
    AssembleDocument { destination: PathBuf },
    /// Set the document outline from a bookmarks file.
    AttachOutline {
        bookmarks: PathBuf,
        destination: PathBuf,
    },
}

impl Stage {
    /// Short stage name for logs and progress reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ExtractPages { .. } => "extract pages",
            Stage::CompressPages { .. } => "compress pages",
            Stage::AssembleDocument { .. } => "assemble document",
            Stage::AttachOutline { .. } => "attach bookmarks",
        }
    }
}

/// The ordered stages for one book.
#[derive(Debug, Clone)]
pub struct PipelinePlan {
    pub source_kind: SourceKind,
    pub stages: Vec<Stage>,
}

impl PipelinePlan {
    /// The destination document path this plan assembles.
    pub fn destination(&self) -> Option<&Path> {
        self.stages.iter().find_map(|s| match s {
            Stage::AssembleDocument { destination } => Some(destination.as_path()),
            _ => None,
        })
    }
}

/// Classify a resolved source path.
///
/// `None` means broken: the path is neither a single PDF file nor a
/// directory holding at least one supported page image.
pub fn classify_source(path: &Path) -> Option<SourceKind> {
    if has_extension(path, "pdf") {
        return Some(SourceKind::Document);
    }
    if path.is_dir() {
        let mut entries = match std::fs::read_dir(path) {
            Ok(entries) => entries,
            Err(_) => return None,
        };
        let has_image = entries.any(|e| e.map(|e| is_supported_image(&e.path())).unwrap_or(false));
        if has_image {
            return Some(SourceKind::ImageSet);
        }
    }
    None
}

/// Build the pipeline plan for one book, or explain why it cannot run.
///
/// `source` is the already-resolved local source path (a download has
/// happened by now, if the book named a URL). The returned plan wires
/// extract (document only) → compress → assemble → outline (if bookmarks
/// exist), with each stage's output directory feeding the next stage.
pub fn build_plan(
    book: &BookSpec,
    source: &Path,
    settings: &Settings,
    tools: &Toolset,
) -> Result<PipelinePlan, SkipReason> {
    if book.skip {
        return Err(SkipReason::Requested);
    }

    let source_kind = classify_source(source).ok_or(SkipReason::Broken {
        path: source.to_path_buf(),
    })?;

    if let Some(tool) = tools.missing_djvu_tool() {
        return Err(SkipReason::MissingDjvuTools { tool });
    }
    if source_kind == SourceKind::Document && !tools.can_convert_documents() {
        return Err(SkipReason::MissingDocumentConverter);
    }

    let work_dir = settings.book_work_dir(&book.name);

    // The destination is named after the source file (or image directory),
    // landing in the per-book override when that points at a real directory.
    let source_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| book.name.clone());
    let djvu_name = format!("{}.djvu", filename_without_extension(&source_name));
    let destination = if book.out_dir_valid() {
        book.out_dir.as_deref().unwrap_or(settings.out_dir.as_path())
    } else {
        settings.out_dir.as_path()
    }
    .join(djvu_name);

    let mut stages = Vec::with_capacity(4);

    let (pages_dir, owned_pages) = match source_kind {
        SourceKind::Document => {
            stages.push(Stage::ExtractPages {
                source: source.to_path_buf(),
                pages_dir: work_dir.clone(),
            });
            (work_dir.clone(), true)
        }
        SourceKind::ImageSet => (source.to_path_buf(), false),
    };

    stages.push(Stage::CompressPages {
        pages_dir,
        work_dir,
        owned_pages,
    });
    stages.push(Stage::AssembleDocument {
        destination: destination.clone(),
    });

    match &book.bookmarks {
        Some(bookmarks) if book.bookmarks_found() => {
            // djvused is only required when an outline stage is registered.
            if tools.djvused.is_none() {
                return Err(SkipReason::MissingDjvuTools { tool: DJVUSED });
            }
            stages.push(Stage::AttachOutline {
                bookmarks: bookmarks.clone(),
                destination,
            });
        }
        Some(bookmarks) => tracing::warn!(
            "'{}' names a bookmarks file that does not exist: {}",
            book.name,
            bookmarks.display()
        ),
        None => {}
    }

    Ok(PipelinePlan {
        source_kind,
        stages,
    })
}
