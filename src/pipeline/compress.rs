//! Page compression: every page image → one single-page DjVu via `c44`.
//!
//! Pages are processed in plain directory-listing order. No ordering
//! guarantee is needed here — reading order is imposed later, by the
//! assembly stage, which iterates canonical names sorted. What *is*
//! guaranteed: the portable-map intermediate is deleted the moment `c44`
//! finishes, successful or not retained — those files are raw pixels and
//! dwarf everything else on disk, so `keep_intermediates` does not apply to
//! them.
//!
//! One failed page aborts the whole stage; there is no skip-and-continue.

use crate::config::BookSpec;
use crate::error::DjvuPressError;
use crate::pipeline::encode::{self, PortableMapFormat};
use crate::tools::{self, LogChannel, Toolset, C44};
use crate::util::{filename_without_extension, is_supported_image};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// The `c44` quality arguments for a portable-map variant.
///
/// Both variants currently compress with the same near-lossless decibel
/// target; the dispatch point exists because the variant decides the input
/// the compressor sees.
fn c44_args(format: PortableMapFormat) -> &'static [&'static str] {
    match format {
        // 48 dB is c44's maximum quality setting.
        PortableMapFormat::Color | PortableMapFormat::Gray => &["-decibel", "48"],
    }
}

/// Compress every supported page image in `pages_dir` into a single-page
/// DjVu under `work_dir`.
///
/// `owned_pages` marks pages produced by the extraction stage; only those
/// are deleted after consumption (and only without `keep_intermediates`).
/// A user-supplied image set is never touched.
///
/// Returns the produced single-page DjVu paths, in no particular order.
pub async fn run(
    book: &BookSpec,
    pages_dir: &Path,
    work_dir: &Path,
    owned_pages: bool,
    tools: &Toolset,
) -> Result<Vec<PathBuf>, DjvuPressError> {
    info!("Converting each image into single page DJVU...");
    fs::create_dir_all(work_dir).map_err(|e| DjvuPressError::io(work_dir, e))?;

    let entries = fs::read_dir(pages_dir).map_err(|e| {
        DjvuPressError::Internal(format!(
            "images dir '{}' could not be listed: {e}",
            pages_dir.display()
        ))
    })?;

    let mut djvu_pages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DjvuPressError::io(pages_dir, e))?;
        let page = entry.path();
        if !is_supported_image(&page) {
            continue;
        }

        let djvu_page = compress_page(&page, work_dir, tools).await?;
        info!(
            "{} converted to {}",
            page.display(),
            djvu_page
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );

        if owned_pages && !book.keep_intermediates {
            fs::remove_file(&page).map_err(|e| DjvuPressError::io(&page, e))?;
            info!("Deleted consumed page {}", page.display());
        }

        djvu_pages.push(djvu_page);
    }

    info!("{} images converted", djvu_pages.len());
    Ok(djvu_pages)
}

/// Encode one page to a portable map and compress it to a DjVu page.
async fn compress_page(
    page: &Path,
    work_dir: &Path,
    tools: &Toolset,
) -> Result<PathBuf, DjvuPressError> {
    let page_name = page
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = filename_without_extension(&page_name).to_string();

    let djvu_page = work_dir.join(format!("{stem}.djvu"));
    let tmp_map = work_dir.join(format!("{stem}.pm"));

    // Encode first under a neutral name; the right extension is only known
    // once the pixel layout has been inspected.
    let format = encode::encode_file(page, &tmp_map, "djvupress")?;
    let portable_map = work_dir.join(format!("{stem}.{}", format.extension()));
    fs::rename(&tmp_map, &portable_map).map_err(|e| DjvuPressError::io(&tmp_map, e))?;

    let mut args: Vec<&OsStr> = c44_args(format).iter().map(OsStr::new).collect();
    args.push(portable_map.as_os_str());
    args.push(djvu_page.as_os_str());

    let compressed = tools::run(C44, tools.c44()?, &args, LogChannel::Quiet, &portable_map).await;

    // Portable maps are huge and unnecessary; drop before error handling so
    // a failed compression never strands one on disk.
    fs::remove_file(&portable_map).map_err(|e| DjvuPressError::io(&portable_map, e))?;
    compressed?;

    if !djvu_page.is_file() {
        return Err(DjvuPressError::MissingOutput { path: djvu_page });
    }

    Ok(djvu_page)
}
