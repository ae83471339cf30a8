//! Page extraction: PDF → paginated EPUB → canonical page images.
//!
//! Calibre's `ebook-convert` cannot emit loose page images, but its EPUB
//! output is a zip container holding one raster entry per page, named
//! `index-<N>_<M>.<ext>`. This stage runs the converter, unpacks exactly
//! those entries byte-for-byte into the book working directory, renames
//! them to canonical `page-NNN.ext` names, and finally discards the EPUB.
//!
//! Failure policy: any unpack I/O error aborts the whole stage. Partially
//! extracted pages are *not* cleaned up automatically — the next run's
//! non-empty-directory check will catch them (a documented limitation, not
//! a bug).

use crate::config::BookSpec;
use crate::error::DjvuPressError;
use crate::pipeline::rename;
use crate::tools::{self, LogChannel, Toolset, EBOOK_CONVERT};
use crate::util::filename_without_extension;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Extract canonical page images from a PDF into `pages_dir`.
///
/// Returns the number of pages extracted. Zero pages is fatal: a book with
/// no raster pages has nothing to compress.
pub async fn run(
    book: &BookSpec,
    source: &Path,
    pages_dir: &Path,
    tools: &Toolset,
) -> Result<usize, DjvuPressError> {
    info!(
        "Beginning '{}' conversion from PDF to image set.",
        book.name
    );

    prepare_pages_dir(book, pages_dir)?;
    info!("Output dir: {}", pages_dir.display());

    // ── Step 1: PDF → EPUB ───────────────────────────────────────────────
    let source_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| book.name.clone());
    let epub = pages_dir.join(format!("{}.epub", filename_without_extension(&source_name)));

    info!("Generating EPUB from {}...", source_name);
    let args: Vec<&OsStr> = vec![
        source.as_os_str(),
        epub.as_os_str(),
        OsStr::new("--input-profile"),
        OsStr::new("default"),
        OsStr::new("--output-profile"),
        OsStr::new("tablet"),
    ];
    tools::run(
        EBOOK_CONVERT,
        tools.ebook_convert()?,
        &args,
        LogChannel::Stdout,
        source,
    )
    .await?;
    info!("EPUB successfully generated: {}", epub.display());

    // ── Step 2: unpack page entries ──────────────────────────────────────
    let extracted = {
        let epub = epub.clone();
        let pages_dir = pages_dir.to_path_buf();
        tokio::task::spawn_blocking(move || unpack_pages(&epub, &pages_dir))
            .await
            .map_err(|e| DjvuPressError::Internal(format!("extraction task panicked: {e}")))??
    };
    info!("Extracted {} images", extracted);

    // ── Step 3: drop the intermediate container ──────────────────────────
    if !book.keep_intermediates {
        fs::remove_file(&epub).map_err(|e| DjvuPressError::io(&epub, e))?;
        info!("Deleted {}", epub.display());
    }

    // ── Step 4: canonical renaming ───────────────────────────────────────
    info!("Renaming image files...");
    let renamed = rename::canonicalize_pages(pages_dir)?;
    if renamed == 0 {
        return Err(DjvuPressError::NoPagesExtracted {
            book: book.name.clone(),
        });
    }

    Ok(renamed)
}

/// Ensure the pages directory exists and is empty.
///
/// Leftovers from a previous run are wiped only under `force_clean_up`;
/// otherwise the stage stops so user edits to extracted pages are never
/// overwritten.
fn prepare_pages_dir(book: &BookSpec, pages_dir: &Path) -> Result<(), DjvuPressError> {
    fs::create_dir_all(pages_dir).map_err(|e| DjvuPressError::io(pages_dir, e))?;

    let entries: Vec<PathBuf> = fs::read_dir(pages_dir)
        .map_err(|e| DjvuPressError::Internal(format!("work dir points to file: {e}")))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    if entries.is_empty() {
        return Ok(());
    }

    if !book.force_clean_up {
        return Err(DjvuPressError::DirtyWorkDir {
            book: book.name.clone(),
            path: pages_dir.to_path_buf(),
        });
    }

    info!("Cleaning up book working directory...");
    for entry in entries {
        let result = if entry.is_dir() {
            fs::remove_dir_all(&entry)
        } else {
            fs::remove_file(&entry)
        };
        result.map_err(|e| DjvuPressError::io(&entry, e))?;
    }
    info!("Clean up completed");
    Ok(())
}

/// Unpack every page entry of the EPUB container into `pages_dir`,
/// preserving entry bytes unchanged.
///
/// Entry paths inside the container are flattened: the rename pass and the
/// compression stage both work on a flat directory listing.
fn unpack_pages(epub: &Path, pages_dir: &Path) -> Result<usize, DjvuPressError> {
    info!("Extracting image files...");

    let file = fs::File::open(epub).map_err(|e| DjvuPressError::io(epub, e))?;
    let mut archive =
        zip::ZipArchive::new(io::BufReader::new(file)).map_err(|e| DjvuPressError::Io {
            path: epub.to_path_buf(),
            source: io::Error::other(e),
        })?;

    let mut extracted = 0;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| DjvuPressError::Io {
            path: epub.to_path_buf(),
            source: io::Error::other(e),
        })?;
        if entry.is_dir() || !rename::is_page_entry(entry.name()) {
            continue;
        }

        let entry_file_name = Path::new(entry.name())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.name().to_string());
        let target = pages_dir.join(&entry_file_name);

        let mut out = fs::File::create(&target).map_err(|e| DjvuPressError::io(&target, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| DjvuPressError::io(&target, e))?;

        info!("Extracted file: {}", entry_file_name);
        extracted += 1;
    }

    Ok(extracted)
}
