//! Canonical page numbering: derive sortable page names from raw extraction
//! names.
//!
//! ## Why two passes?
//!
//! The converter names page entries `index-<N>_<M>.<ext>` with a
//! variable-width `N`. Zero-padding must use the maximum width observed
//! across *all* pages of the book — `page-7` and `page-23` sort wrong as
//! strings, `page-07` and `page-23` sort right — so every file is scanned
//! for the maximum digit-run length before any file is renamed. Renaming
//! from a partial listing could bake in an inconsistent width.
//!
//! The match is deliberately unanchored: any filename merely containing the
//! `index-N_M` token is treated as a page, exactly like the upstream
//! converter's own naming. Tightening the pattern could change which entries
//! count as pages.

use crate::error::DjvuPressError;
use crate::util::file_extension;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info};

static PAGE_ENTRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"index-([0-9]+)_[0-9]+").unwrap());

/// True when `name` contains a page-entry index token.
pub fn is_page_entry(name: &str) -> bool {
    PAGE_ENTRY.is_match(name)
}

/// The raw index substring of a page entry: the first digit run after the
/// `index-` prefix.
pub fn raw_index(name: &str) -> Option<&str> {
    PAGE_ENTRY
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// The canonical filename for a raw index, zero-padded to `width`.
pub fn canonical_name(raw: &str, width: usize, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("page-{raw:0>width$}.{ext}"),
        None => format!("page-{raw:0>width$}"),
    }
}

/// Rename every page entry in `dir` to its canonical `page-NNN.ext` name.
///
/// Returns the number of files renamed. Files without an index token are
/// left untouched; an empty directory yields zero renames, which is a valid
/// (if degenerate) outcome — callers decide whether zero pages is a failure.
pub fn canonicalize_pages(dir: &Path) -> Result<usize, DjvuPressError> {
    let names = list_file_names(dir)?;

    // Pass 1: the maximum index width across the whole set.
    let max_width = names
        .iter()
        .filter_map(|n| raw_index(n))
        .map(str::len)
        .max();
    let Some(max_width) = max_width else {
        debug!("No page entries found in {}", dir.display());
        return Ok(0);
    };
    info!("Maximum index length of files: {}", max_width);

    // Pass 2: rename in place.
    let mut renamed = 0;
    for name in &names {
        let Some(raw) = raw_index(name) else {
            continue;
        };
        let canonical = canonical_name(raw, max_width, file_extension(name));
        let from = dir.join(name);
        let to = dir.join(&canonical);
        std::fs::rename(&from, &to).map_err(|e| DjvuPressError::io(&from, e))?;
        info!("Renamed {} to {}", name, canonical);
        renamed += 1;
    }

    info!("Files renamed: {}", renamed);
    Ok(renamed)
}

/// File names (not paths) of every plain file in `dir`.
///
/// A listing failure here means the directory the pipeline just wrote to is
/// gone or is not a directory — a violated working-directory contract.
fn list_file_names(dir: &Path) -> Result<Vec<String>, DjvuPressError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        DjvuPressError::Internal(format!("failed to list pages in '{}': {e}", dir.display()))
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DjvuPressError::io(dir, e))?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn index_token_matches_anywhere_in_the_name() {
        assert!(is_page_entry("index-12_3.png"));
        assert!(is_page_entry("images/index-12_3.png"));
        // Unanchored on purpose: a mere substring hit counts.
        assert!(is_page_entry("old-index-12_3-copy.png"));
        assert!(!is_page_entry("index-12.png"));
        assert!(!is_page_entry("cover.png"));
    }

    #[test]
    fn raw_index_is_first_digit_run_only() {
        assert_eq!(raw_index("index-12_345.png"), Some("12"));
        assert_eq!(raw_index("index-004_9.jpg"), Some("004"));
        assert_eq!(raw_index("cover.png"), None);
    }

    #[test]
    fn canonical_names_sort_in_reading_order() {
        // Raw widths 1, 2 and 3 → everything padded to 3.
        let raws = ["7", "23", "004"];
        let width = raws.iter().map(|r| r.len()).max().unwrap();
        assert_eq!(width, 3);

        let mut names: Vec<String> = raws
            .iter()
            .map(|r| canonical_name(r, width, Some("png")))
            .collect();
        assert_eq!(names, ["page-007.png", "page-023.png", "page-004.png"]);

        names.sort();
        assert_eq!(names, ["page-004.png", "page-007.png", "page-023.png"]);
    }

    #[test]
    fn renames_matching_files_and_leaves_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["index-7_1.png", "index-23_1.png", "index-004_1.jpg", "toc.html"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let renamed = canonicalize_pages(dir.path()).unwrap();
        assert_eq!(renamed, 3);

        assert!(dir.path().join("page-007.png").is_file());
        assert!(dir.path().join("page-023.png").is_file());
        assert!(dir.path().join("page-004.jpg").is_file());
        assert!(dir.path().join("toc.html").is_file());
        assert!(!dir.path().join("index-7_1.png").exists());
    }

    #[test]
    fn empty_set_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("cover.png"), b"x").unwrap();
        assert_eq!(canonicalize_pages(dir.path()).unwrap(), 0);
        assert!(dir.path().join("cover.png").is_file());
    }

    #[test]
    fn listing_a_file_is_bug_class() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();
        let err = canonicalize_pages(&file).unwrap_err();
        assert!(err.is_internal());
    }
}
