//! Diagnostic stream protocol spoken by the engine on stdout.
//!
//! The engine writes one JSON object per line (JSON Lines). Each object is a
//! [`DiagnosticRecord`]. Blank lines are ignored. A final line that is not
//! terminated by a newline is a truncated record and a decode failure, as is
//! any line that does not parse as a record. Positions are 0-based.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a finding within a file, 0-based and end-exclusive on columns.
///
/// # Example
///
/// ```
/// use lintbridge_engine::protocol::TextSpan;
///
/// let span = TextSpan::new(0, 13, 0, 21);
/// assert_eq!(span.line(), 0);
/// assert_eq!(span.end_column(), 21);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    line: u32,
    column: u32,
    end_line: u32,
    end_column: u32,
}

impl TextSpan {
    /// Creates a span from start and end positions.
    #[must_use]
    pub const fn new(line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Start line.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Start column.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// End line.
    #[must_use]
    pub const fn end_line(&self) -> u32 {
        self.end_line
    }

    /// End column.
    #[must_use]
    pub const fn end_column(&self) -> u32 {
        self.end_column
    }
}

/// Severity the engine attached to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The finding indicates a defect.
    Error,
    /// The finding is a non-blocking concern.
    Warning,
    /// The finding is informational.
    Info,
}

/// One finding decoded from the engine's stdout.
///
/// # Example
///
/// ```
/// use lintbridge_engine::protocol::{DiagnosticRecord, TextSpan};
/// use std::path::PathBuf;
///
/// let record: DiagnosticRecord = serde_json::from_str(
///     r#"{"ruleKey":"S4275","filePath":"src/a.ts","line":0,"column":13,
///        "endLine":0,"endColumn":21,"message":"Refactor this getter"}"#,
/// ).unwrap();
/// assert_eq!(record.rule_key(), "S4275");
/// assert_eq!(record.span(), TextSpan::new(0, 13, 0, 21));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    rule_key: String,
    file_path: PathBuf,
    #[serde(flatten)]
    span: TextSpan,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity: Option<Severity>,
}

impl DiagnosticRecord {
    /// Creates a record without a severity.
    #[must_use]
    pub fn new(
        rule_key: impl Into<String>,
        file_path: impl Into<PathBuf>,
        span: TextSpan,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            file_path: file_path.into(),
            span,
            message: message.into(),
            severity: None,
        }
    }

    /// Attaches a severity.
    #[must_use]
    pub const fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Rule that produced the finding.
    #[must_use]
    pub const fn rule_key(&self) -> &str {
        self.rule_key.as_str()
    }

    /// File the finding refers to, absolute or relative to the working
    /// directory of the run.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Location of the finding.
    #[must_use]
    pub const fn span(&self) -> TextSpan {
        self.span
    }

    /// Human-readable message.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Severity, when the engine supplied one.
    #[must_use]
    pub const fn severity(&self) -> Option<Severity> {
        self.severity
    }
}

/// Reasons a line of engine output could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line is not a valid record.
    #[error("malformed record: {source}")]
    Malformed {
        /// 1-based line number on stdout.
        line: usize,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The stream ended in the middle of a record.
    #[error("truncated record at end of stream")]
    Truncated {
        /// 1-based line number on stdout.
        line: usize,
    },

    /// Reading the stream failed.
    #[error("failed to read engine output: {source}")]
    Io {
        /// 1-based line number on stdout.
        line: usize,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl DecodeError {
    /// 1-based stdout line the failure occurred on.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::Malformed { line, .. } | Self::Truncated { line } | Self::Io { line, .. } => {
                *line
            }
        }
    }
}

/// Incremental decoder turning a byte stream into [`DiagnosticRecord`]s.
///
/// The decoder holds at most one line in memory at a time.
///
/// # Example
///
/// ```
/// use lintbridge_engine::protocol::RecordDecoder;
///
/// let stream = concat!(
///     r#"{"ruleKey":"S1","filePath":"a.ts","line":1,"column":0,"endLine":1,"endColumn":4,"message":"m"}"#,
///     "\n",
/// );
/// let mut decoder = RecordDecoder::new(stream.as_bytes());
/// assert!(decoder.next_record().unwrap().is_some());
/// assert!(decoder.next_record().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct RecordDecoder<R> {
    reader: R,
    buffer: Vec<u8>,
    line: usize,
}

impl<R: BufRead> RecordDecoder<R> {
    /// Wraps a buffered reader.
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            line: 0,
        }
    }

    /// Decodes the next record, returning `Ok(None)` at a clean end of stream.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when a line is malformed, the final line is
    /// unterminated, or the underlying read fails.
    pub fn next_record(&mut self) -> Result<Option<DiagnosticRecord>, DecodeError> {
        loop {
            self.buffer.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut self.buffer)
                .map_err(|source| DecodeError::Io {
                    line: self.line + 1,
                    source,
                })?;
            if read == 0 {
                return Ok(None);
            }
            self.line += 1;
            if self.buffer.last() != Some(&b'\n') {
                return Err(DecodeError::Truncated { line: self.line });
            }
            let payload = self.buffer.trim_ascii();
            if payload.is_empty() {
                continue;
            }
            return serde_json::from_slice(payload)
                .map(Some)
                .map_err(|source| DecodeError::Malformed {
                    line: self.line,
                    source,
                });
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub const fn lines_read(&self) -> usize {
        self.line
    }

    /// Returns the underlying reader, for draining what remains.
    pub fn into_inner(self) -> R {
        self.reader
    }
}
