//! Domain errors raised while deploying and supervising the engine.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint. Every error raised after the
//! engine started carries the lines it wrote to stderr so the rendered message
//! is actionable on its own.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors arising while expanding a bundle archive onto disk.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The archive file could not be opened.
    #[error("failed to open bundle archive '{}': {source}", .path.display())]
    OpenArchive {
        /// Archive that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The archive is not a readable zip file.
    #[error("bundle archive is malformed: {source}")]
    MalformedArchive {
        /// Underlying archive error.
        #[source]
        source: Arc<zip::result::ZipError>,
    },

    /// An entry would be written outside the deployment directory.
    #[error("bundle entry '{entry}' resolves outside the deployment directory")]
    PathTraversal {
        /// Raw entry name as stored in the archive.
        entry: String,
    },

    /// Writing an extracted entry failed.
    #[error("failed to write '{}' while deploying bundle: {source}", .path.display())]
    Write {
        /// Destination path being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

/// Errors arising while launching or supervising an engine run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The bundle could not be deployed.
    #[error(transparent)]
    Deployment(#[from] DeployError),

    /// The configured entry point does not exist inside the bundle.
    #[error("engine entry '{}' not found in bundle", .path.display())]
    EntryNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The child process could not be started.
    #[error("failed to launch engine '{program}': {source}")]
    Launch {
        /// Program that was executed.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The analysis request could not be serialised.
    #[error("failed to serialise analysis request: {0}")]
    SerializeRequest(#[source] serde_json::Error),

    /// The engine wrote a record that does not conform to the protocol.
    #[error(
        "engine produced a malformed diagnostic on line {line}: {message}{}",
        render_stderr(.stderr)
    )]
    ProtocolDecode {
        /// 1-based line of the engine's stdout holding the bad record.
        line: usize,
        /// Description of the decode failure.
        message: String,
        /// Lines the engine wrote to stderr.
        stderr: Vec<String>,
    },

    /// The engine exited with a non-zero status.
    #[error("engine exited with non-zero status {status}{}", render_stderr(.stderr))]
    NonZeroExit {
        /// Process exit status, `-1` when terminated by a signal.
        status: i32,
        /// Lines the engine wrote to stderr.
        stderr: Vec<String>,
    },

    /// The engine did not finish within its time budget and was killed.
    #[error("engine timed out after {}ms and was killed{}", .timeout.as_millis(), render_stderr(.stderr))]
    Timeout {
        /// Configured budget.
        timeout: Duration,
        /// Lines the engine wrote to stderr before it was killed.
        stderr: Vec<String>,
    },

    /// The run was cancelled by the caller and the engine was killed.
    #[error("engine run was cancelled{}", render_stderr(.stderr))]
    Cancelled {
        /// Lines the engine wrote to stderr before it was killed.
        stderr: Vec<String>,
    },

    /// Supervising the child process failed.
    #[error("I/O error while supervising engine: {message}{}", render_stderr(.stderr))]
    Supervision {
        /// Description of the failure.
        message: String,
        /// Lines the engine wrote to stderr.
        stderr: Vec<String>,
    },
}

impl EngineError {
    /// Lines the engine wrote to stderr, when the error occurred after launch.
    #[must_use]
    pub fn stderr(&self) -> &[String] {
        match self {
            Self::ProtocolDecode { stderr, .. }
            | Self::NonZeroExit { stderr, .. }
            | Self::Timeout { stderr, .. }
            | Self::Cancelled { stderr }
            | Self::Supervision { stderr, .. } => stderr,
            Self::Deployment(_)
            | Self::EntryNotFound { .. }
            | Self::Launch { .. }
            | Self::SerializeRequest(_) => &[],
        }
    }
}

fn render_stderr(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    format!("\nengine stderr:\n{}", lines.join("\n"))
}
