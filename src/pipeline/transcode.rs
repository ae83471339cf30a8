//! JPEG → PNG normalisation of an images directory.
//!
//! Useful before hand-editing extracted pages: PNG round-trips edits
//! losslessly where repeated JPEG saves degrade. Each converted JPEG is
//! deleted afterwards, so the directory never holds the same page twice —
//! and the operation refuses to run at all when a target PNG already
//! exists, rather than clobbering it.

use crate::error::DjvuPressError;
use crate::util::{filename_without_extension, has_extension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Convert every `.jpg` in `images_dir` to a sibling `.png`, deleting the
/// JPEG after a verified conversion.
///
/// Returns the number of files converted. Any collision or I/O failure
/// aborts the whole operation.
pub async fn run(images_dir: &Path) -> Result<usize, DjvuPressError> {
    let images_dir = images_dir.to_path_buf();
    tokio::task::spawn_blocking(move || transcode_blocking(&images_dir))
        .await
        .map_err(|e| DjvuPressError::Internal(format!("transcode task panicked: {e}")))?
}

fn transcode_blocking(images_dir: &Path) -> Result<usize, DjvuPressError> {
    info!("Converting JPG files to PNG");

    let entries = fs::read_dir(images_dir).map_err(|e| {
        DjvuPressError::Internal(format!(
            "images dir '{}' could not be listed: {e}",
            images_dir.display()
        ))
    })?;

    let mut converted = 0;
    for entry in entries {
        let entry = entry.map_err(|e| DjvuPressError::io(images_dir, e))?;
        let jpg = entry.path();
        if !has_extension(&jpg, "jpg") {
            continue;
        }

        let png = png_sibling(&jpg);
        if png.is_file() {
            return Err(DjvuPressError::PngCollision { path: png });
        }

        let image = image::open(&jpg).map_err(|e| DjvuPressError::ImageDecode {
            path: jpg.clone(),
            detail: e.to_string(),
        })?;
        image
            .save_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| DjvuPressError::ImageDecode {
                path: png.clone(),
                detail: e.to_string(),
            })?;

        if !png.is_file() {
            return Err(DjvuPressError::MissingOutput { path: png });
        }

        info!("{} converted to {}", jpg.display(), png.display());
        fs::remove_file(&jpg).map_err(|e| DjvuPressError::io(&jpg, e))?;
        converted += 1;
    }

    info!("{} files converted", converted);
    Ok(converted)
}

fn png_sibling(jpg: &Path) -> PathBuf {
    let name = jpg
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    jpg.with_file_name(format!("{}.png", filename_without_extension(&name)))
}
