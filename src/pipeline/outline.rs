//! Outline attachment: set a document's bookmarks via `djvused`.
//!
//! `djvused` rewrites the document in place: the outline command is executed
//! against the assembled DjVu and saved back to the same file. A failure
//! here is fatal for this stage only — the document produced by assembly
//! remains intact and readable, just without bookmarks.
//!
//! `djvused` reports on stderr, so that is the channel streamed to the log.

use crate::config::BookSpec;
use crate::error::DjvuPressError;
use crate::tools::{self, LogChannel, Toolset, DJVUSED};
use crate::util::has_extension;
use std::ffi::OsString;
use std::path::Path;
use tracing::info;

/// Set `destination`'s outline from `bookmarks`.
pub async fn run(
    book: &BookSpec,
    bookmarks: &Path,
    destination: &Path,
    tools: &Toolset,
) -> Result<(), DjvuPressError> {
    info!("Trying to add/replace bookmarks for '{}'", book.name);

    if !has_extension(destination, "djvu") {
        return Err(DjvuPressError::DocumentNotFound {
            path: destination.to_path_buf(),
        });
    }
    info!("DJVU file found: {}", destination.display());

    if !bookmarks.is_file() {
        return Err(DjvuPressError::BookmarksNotFound {
            book: book.name.clone(),
            path: bookmarks.to_path_buf(),
        });
    }
    info!("Bookmarks file found: {}", bookmarks.display());

    // -e executes the outline command, -s saves the result in place.
    let set_outline = {
        let mut cmd = OsString::from("set-outline ");
        cmd.push(bookmarks.as_os_str());
        cmd
    };
    let args = [
        OsString::from("-e"),
        set_outline,
        OsString::from("-s"),
        destination.as_os_str().to_os_string(),
    ];
    let args: Vec<&std::ffi::OsStr> = args.iter().map(OsString::as_os_str).collect();
    tools::run(
        DJVUSED,
        tools.djvused()?,
        &args,
        LogChannel::Stderr,
        destination,
    )
    .await?;

    info!("Completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn missing_document_is_a_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let book = BookSpec::new("atlas", "atlas.pdf");
        let bookmarks = dir.path().join("outline.txt");
        fs::write(&bookmarks, "(bookmarks)").unwrap();

        let err = run(
            &book,
            &bookmarks,
            &dir.path().join("missing.djvu"),
            &Toolset::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DjvuPressError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn missing_bookmarks_is_a_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let book = BookSpec::new("atlas", "atlas.pdf");
        let djvu = dir.path().join("atlas.djvu");
        fs::write(&djvu, b"AT&TFORM").unwrap();

        let err = run(
            &book,
            &dir.path().join("missing.txt"),
            &djvu,
            &Toolset::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DjvuPressError::BookmarksNotFound { .. }));
    }
}
