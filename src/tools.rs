//! External tool discovery and invocation.
//!
//! Four executables do the heavy lifting: Calibre's `ebook-convert` turns a
//! PDF into a paginated EPUB, and DjVuLibre's `c44`/`djvm`/`djvused`
//! compress, assemble and annotate the DjVu output. This module resolves
//! them on PATH once per run and wraps process execution behind a single
//! [`run`] function.
//!
//! ## Output streaming
//!
//! Each tool has its own logging convention: `ebook-convert` reports
//! progress on stdout, `djvused` talks on stderr, and `c44`/`djvm` say
//! nothing worth keeping. [`LogChannel`] selects which stream is forwarded,
//! line by line as it arrives, to `tracing` — the user sees converter
//! progress live rather than after the fact. The unread stream is attached
//! to `/dev/null` so a chatty tool can never fill a pipe and deadlock.
//!
//! Execution is blocking from the issuing stage's perspective: [`run`]
//! returns only after the process has exited, and a non-zero exit is always
//! an error, never silently ignored.

use crate::error::DjvuPressError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Calibre's PDF→EPUB converter.
pub const EBOOK_CONVERT: &str = "ebook-convert";
/// DjVuLibre's single-page IW44 compressor.
pub const C44: &str = "c44";
/// DjVuLibre's multipage document assembler.
pub const DJVM: &str = "djvm";
/// DjVuLibre's document editor, used for outlines.
pub const DJVUSED: &str = "djvused";

const CALIBRE_HINT: &str =
    "Install Calibre and add its installation directory to the PATH environment variable.";
const DJVULIBRE_HINT: &str =
    "Install DjVuLibre and add its installation directory to the PATH environment variable.";

/// Which output stream of a spawned tool is forwarded to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannel {
    /// Forward stdout line by line (`ebook-convert`).
    Stdout,
    /// Forward stderr line by line (`djvused`).
    Stderr,
    /// Discard both streams (`c44`, `djvm`).
    Quiet,
}

/// Resolved paths of every external tool found on PATH.
///
/// Discovery happens once per run; stages receive the toolset by reference.
/// Tests construct one directly to exercise planning without any tools
/// installed.
#[derive(Debug, Clone, Default)]
pub struct Toolset {
    pub ebook_convert: Option<PathBuf>,
    pub c44: Option<PathBuf>,
    pub djvm: Option<PathBuf>,
    pub djvused: Option<PathBuf>,
}

impl Toolset {
    /// Search PATH for all four tools, logging what was found where.
    pub fn discover() -> Self {
        let find = |name: &str| -> Option<PathBuf> {
            match which::which(name) {
                Ok(path) => {
                    info!("{} found at: {}", name, path.display());
                    Some(path)
                }
                Err(_) => {
                    debug!("{} not found on PATH", name);
                    None
                }
            }
        };
        Self {
            ebook_convert: find(EBOOK_CONVERT),
            c44: find(C44),
            djvm: find(DJVM),
            djvused: find(DJVUSED),
        }
    }

    /// True when PDF sources can be paginated at all.
    pub fn can_convert_documents(&self) -> bool {
        self.ebook_convert.is_some()
    }

    /// True when pages can be compressed and assembled into a DjVu.
    pub fn can_build_djvu(&self) -> bool {
        self.c44.is_some() && self.djvm.is_some()
    }

    /// Name of the first missing DjVuLibre build tool, if any.
    pub fn missing_djvu_tool(&self) -> Option<&'static str> {
        if self.c44.is_none() {
            Some(C44)
        } else if self.djvm.is_none() {
            Some(DJVM)
        } else {
            None
        }
    }

    pub fn ebook_convert(&self) -> Result<&Path, DjvuPressError> {
        Self::require(self.ebook_convert.as_deref(), EBOOK_CONVERT, CALIBRE_HINT)
    }

    pub fn c44(&self) -> Result<&Path, DjvuPressError> {
        Self::require(self.c44.as_deref(), C44, DJVULIBRE_HINT)
    }

    pub fn djvm(&self) -> Result<&Path, DjvuPressError> {
        Self::require(self.djvm.as_deref(), DJVM, DJVULIBRE_HINT)
    }

    pub fn djvused(&self) -> Result<&Path, DjvuPressError> {
        Self::require(self.djvused.as_deref(), DJVUSED, DJVULIBRE_HINT)
    }

    fn require<'a>(
        path: Option<&'a Path>,
        tool: &'static str,
        hint: &'static str,
    ) -> Result<&'a Path, DjvuPressError> {
        path.ok_or(DjvuPressError::ToolNotFound { tool, hint })
    }
}

/// Spawn `program` with `args`, stream the chosen output channel to the log,
/// and wait for exit.
///
/// `tool` is the short executable name used in diagnostics; `input` is the
/// primary input file the invocation works on, so failures can name the
/// offending file, not just the tool.
pub async fn run(
    tool: &'static str,
    program: &Path,
    args: &[&OsStr],
    channel: LogChannel,
    input: &Path,
) -> Result<(), DjvuPressError> {
    debug!("Spawning {}: {:?}", tool, args);

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    match channel {
        LogChannel::Stdout => command.stdout(Stdio::piped()).stderr(Stdio::null()),
        LogChannel::Stderr => command.stdout(Stdio::null()).stderr(Stdio::piped()),
        LogChannel::Quiet => command.stdout(Stdio::null()).stderr(Stdio::null()),
    };

    let mut child = command.spawn().map_err(|e| DjvuPressError::ToolSpawn {
        tool,
        input: input.to_path_buf(),
        source: e,
    })?;

    // Drain the log stream before waiting so lines appear as they are
    // produced, interleaved with process execution.
    let drained = match channel {
        LogChannel::Stdout => match child.stdout.take() {
            Some(out) => drain_lines(out, tool).await,
            None => Ok(()),
        },
        LogChannel::Stderr => match child.stderr.take() {
            Some(err) => drain_lines(err, tool).await,
            None => Ok(()),
        },
        LogChannel::Quiet => Ok(()),
    };
    drained.map_err(|e| DjvuPressError::ToolSpawn {
        tool,
        input: input.to_path_buf(),
        source: e,
    })?;

    let status = child.wait().await.map_err(|e| DjvuPressError::ToolSpawn {
        tool,
        input: input.to_path_buf(),
        source: e,
    })?;

    if !status.success() {
        return Err(DjvuPressError::ToolFailed {
            tool,
            input: input.to_path_buf(),
            status,
        });
    }

    Ok(())
}

/// Forward every line of one output stream to the log until EOF.
async fn drain_lines<R>(reader: R, tool: &str) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        info!("{}: {}", tool, line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn fake_toolset() -> Toolset {
        Toolset {
            ebook_convert: Some(PathBuf::from("/opt/calibre/ebook-convert")),
            c44: Some(PathBuf::from("/usr/bin/c44")),
            djvm: Some(PathBuf::from("/usr/bin/djvm")),
            djvused: None,
        }
    }

    #[test]
    fn capability_checks() {
        let tools = fake_toolset();
        assert!(tools.can_convert_documents());
        assert!(tools.can_build_djvu());
        assert!(tools.missing_djvu_tool().is_none());

        let none = Toolset::default();
        assert!(!none.can_convert_documents());
        assert!(!none.can_build_djvu());
        assert_eq!(none.missing_djvu_tool(), Some(C44));

        let no_djvm = Toolset {
            djvm: None,
            ..fake_toolset()
        };
        assert_eq!(no_djvm.missing_djvu_tool(), Some(DJVM));
    }

    #[test]
    fn missing_tool_error_carries_install_hint() {
        let tools = fake_toolset();
        let err = tools.djvused().unwrap_err();
        assert!(err.to_string().contains("djvused"));
        assert!(err.to_string().contains("DjVuLibre"));
    }

    #[tokio::test]
    async fn run_streams_stdout_and_reports_exit() {
        // `sh` is a reasonable stand-in for a conversion tool in tests.
        let sh = which::which("sh").expect("sh available in test environment");

        let args: Vec<OsString> = ["-c", "echo line-one; echo line-two"]
            .iter()
            .map(OsString::from)
            .collect();
        let args: Vec<&OsStr> = args.iter().map(OsString::as_os_str).collect();
        run("sh", &sh, &args, LogChannel::Stdout, Path::new("input"))
            .await
            .expect("zero exit is success");

        let args: Vec<OsString> = ["-c", "exit 3"].iter().map(OsString::from).collect();
        let args: Vec<&OsStr> = args.iter().map(OsString::as_os_str).collect();
        let err = run("sh", &sh, &args, LogChannel::Quiet, Path::new("input"))
            .await
            .unwrap_err();
        match err {
            DjvuPressError::ToolFailed { tool, status, .. } => {
                assert_eq!(tool, "sh");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("expected ToolFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_reports_spawn_failure() {
        let err = run(
            "missing",
            Path::new("/nonexistent/never-a-tool"),
            &[],
            LogChannel::Quiet,
            Path::new("input"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DjvuPressError::ToolSpawn { .. }));
    }
}
