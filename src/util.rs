//! Small filename helpers shared by every stage.
//!
//! Extensions are compared case-insensitively: page scans must treat
//! `IMG_001.JPG` and `img_001.jpg` identically.

use std::path::Path;

/// Returns the filename without its extension.
///
/// A name with no dot (or only a leading dot, like `.hidden`) is returned
/// unchanged.
pub(crate) fn filename_without_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// Returns the file extension, or `None` if the name has no extension.
pub(crate) fn file_extension(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(dot) if dot > 0 => Some(&name[dot + 1..]),
        _ => None,
    }
}

/// True if `path` is an existing file whose extension matches `ext`
/// (case-insensitive).
pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false)
}

/// True if `path` is a JPEG or PNG file — the page formats the compression
/// stage accepts.
pub(crate) fn is_supported_image(path: &Path) -> bool {
    has_extension(path, "jpg") || has_extension(path, "png")
}
