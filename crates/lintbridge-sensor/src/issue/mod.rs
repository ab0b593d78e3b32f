//! Domain issues and the sink they are reported to.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use lintbridge_engine::Severity;

/// A range within a file, 0-based, end-exclusive on columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

impl TextRange {
    /// Creates a range from start and end positions.
    #[must_use]
    pub const fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// First line.
    #[must_use]
    pub const fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Column on the first line.
    #[must_use]
    pub const fn start_column(&self) -> u32 {
        self.start_column
    }

    /// Last line.
    #[must_use]
    pub const fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Column on the last line.
    #[must_use]
    pub const fn end_column(&self) -> u32 {
        self.end_column
    }
}

/// A finding attached to an input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    rule_key: String,
    file: PathBuf,
    range: TextRange,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    severity: Option<Severity>,
}

impl Issue {
    /// Creates an issue on `file`, a path relative to the analysis base
    /// directory.
    #[must_use]
    pub fn new(
        rule_key: impl Into<String>,
        file: impl Into<PathBuf>,
        range: TextRange,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_key: rule_key.into(),
            file: file.into(),
            range,
            message: message.into(),
            severity: None,
        }
    }

    /// Attaches the severity reported by the engine.
    #[must_use]
    pub const fn with_severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }

    /// Rule that raised the issue.
    #[must_use]
    pub const fn rule_key(&self) -> &str {
        self.rule_key.as_str()
    }

    /// File relative to the analysis base directory.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Location within the file.
    #[must_use]
    pub const fn range(&self) -> TextRange {
        self.range
    }

    /// Message shown to the user.
    #[must_use]
    pub const fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Severity, when the engine reported one.
    #[must_use]
    pub const fn severity(&self) -> Option<Severity> {
        self.severity
    }
}

/// Receives issues in the order they are produced.
pub trait IssueSink {
    /// Accepts one issue.
    fn accept(&mut self, issue: Issue);
}

/// Sink keeping every issue in memory.
///
/// # Example
///
/// ```
/// use lintbridge_sensor::issue::{CollectingSink, Issue, IssueSink, TextRange};
///
/// let mut sink = CollectingSink::default();
/// sink.accept(Issue::new("S4275", "a.ts", TextRange::new(0, 13, 0, 21), "Refactor"));
/// assert_eq!(sink.issues().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    issues: Vec<Issue>,
}

impl CollectingSink {
    /// Issues received so far.
    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Consumes the sink, returning its issues.
    #[must_use]
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

impl IssueSink for CollectingSink {
    fn accept(&mut self, issue: Issue) {
        self.issues.push(issue);
    }
}
