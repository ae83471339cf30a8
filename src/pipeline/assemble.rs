//! Document assembly: single-page DjVus → one multipage document via `djvm`.
//!
//! The first page, in canonical order, creates the document (`djvm -c`);
//! every further page is appended (`djvm -i`), one process per page. The
//! only mutation primitive the container supports is "append next page", so
//! pages are sorted by canonical name *here*, regardless of the order the
//! compression stage produced them in — reordering after creation is not
//! possible.
//!
//! The destination precondition (exists → `force_clean_up` or stop) runs
//! before any pipeline stage writes, via [`check_destination`], so a stopped
//! book leaves the filesystem exactly as it found it.

use crate::config::BookSpec;
use crate::error::DjvuPressError;
use crate::tools::{self, LogChannel, Toolset, DJVM};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Enforce the destination precondition.
///
/// An existing destination is deleted under `force_clean_up`; without the
/// flag it is reported as a conflict and the book performs no writes at all.
pub fn check_destination(book: &BookSpec, destination: &Path) -> Result<(), DjvuPressError> {
    if !destination.exists() {
        return Ok(());
    }

    if !book.force_clean_up {
        return Err(DjvuPressError::DestinationExists {
            book: book.name.clone(),
            path: destination.to_path_buf(),
        });
    }

    fs::remove_file(destination).map_err(|e| DjvuPressError::io(destination, e))?;
    info!("Deleted DJVU: {}", destination.display());
    Ok(())
}

/// Sort single-page DjVus into canonical (reading) order.
///
/// Canonical page names are zero-padded to one width per book, so a plain
/// lexicographic filename sort *is* reading order.
pub fn canonical_order(mut pages: Vec<PathBuf>) -> Vec<PathBuf> {
    pages.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    pages
}

/// Assemble `pages` into `destination`, consuming each page as it is
/// appended.
pub async fn run(
    book: &BookSpec,
    pages: Vec<PathBuf>,
    destination: &Path,
    tools: &Toolset,
) -> Result<(), DjvuPressError> {
    let pages = canonical_order(pages);
    let Some((first, rest)) = pages.split_first() else {
        warn!("'{}' produced no pages; nothing to assemble", book.name);
        return Ok(());
    };

    info!("Creating multipage DJVU from single DJVU pages...");
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| DjvuPressError::io(parent, e))?;
    }

    // Create the book from its first page.
    let djvm = tools.djvm()?;
    tools::run(
        DJVM,
        djvm,
        &[
            std::ffi::OsStr::new("-c"),
            destination.as_os_str(),
            first.as_os_str(),
        ],
        LogChannel::Quiet,
        first,
    )
    .await?;
    info!("Created book with first page");
    consume_page(book, first)?;

    // Append the remaining pages, in order.
    for page in rest {
        tools::run(
            DJVM,
            djvm,
            &[
                std::ffi::OsStr::new("-i"),
                destination.as_os_str(),
                page.as_os_str(),
            ],
            LogChannel::Quiet,
            page,
        )
        .await?;
        info!(
            "{} appended to {}",
            page.display(),
            destination.display()
        );
        consume_page(book, page)?;
    }

    Ok(())
}

/// Delete a consumed single-page DjVu unless intermediates are kept.
fn consume_page(book: &BookSpec, page: &Path) -> Result<(), DjvuPressError> {
    if book.keep_intermediates {
        return Ok(());
    }
    fs::remove_file(page).map_err(|e| DjvuPressError::io(page, e))?;
    info!("Deleted {}", page.display());
    Ok(())
}
