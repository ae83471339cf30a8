//! Source resolution: normalise a book's configured source to a local path.
//!
//! ## Why download to a temp file?
//!
//! Every downstream tool wants a file-system path — none of them can stream
//! from a byte buffer. A URL source is therefore downloaded into a `TempDir`
//! whose lifetime is tied to the [`ResolvedSource`], so cleanup happens
//! automatically when the book finishes, even if the process panics. The
//! downloaded bytes are validated against the `%PDF` magic before anything
//! else runs, so a bad link fails with a clear message rather than a
//! converter crash.
//!
//! Local paths are returned as-is; whether they are a PDF, an image
//! directory, or garbage is the planner's call.

use crate::error::DjvuPressError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved source — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedSource {
    /// Source was already a local file or directory.
    Local(PathBuf),
    /// Source was a URL; the PDF sits in a temp directory kept alive until
    /// the book has been processed.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedSource {
    /// The local path regardless of how the source was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedSource::Local(p) => p,
            ResolvedSource::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the configured source looks like a URL.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Resolve a book source string to a local path, downloading if needed.
pub async fn resolve_source(
    source: &str,
    timeout_secs: u64,
) -> Result<ResolvedSource, DjvuPressError> {
    if is_url(source) {
        download_url(source, timeout_secs).await
    } else {
        let path = PathBuf::from(source);
        if !path.exists() {
            return Err(DjvuPressError::SourceNotFound { path });
        }
        debug!("Resolved local source: {}", path.display());
        Ok(ResolvedSource::Local(path))
    }
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedSource, DjvuPressError> {
    info!("Downloading book from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DjvuPressError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DjvuPressError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DjvuPressError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DjvuPressError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| DjvuPressError::io("tempdir", e))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DjvuPressError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    // Verify PDF magic bytes before handing the file to the converter.
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(DjvuPressError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| DjvuPressError::io(&file_path, e))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedSource::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable PDF filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.to_lowercase().ends_with(".pdf") {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}
