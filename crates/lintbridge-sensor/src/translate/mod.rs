//! Conversion of engine diagnostics into issues.
//!
//! Only records for active rules become issues. Positions are clamped to the
//! file the record refers to: the start line into `[0, last_line]`, columns
//! into `[0, line_length]` in characters, and the end never before the start.

use lintbridge_engine::{DiagnosticRecord, TextSpan};

use crate::active::ActiveRuleSet;
use crate::error::TranslateError;
use crate::files::{FileResolver, InputFile};
use crate::issue::{Issue, TextRange};

/// Translates one record.
///
/// Returns `Ok(None)` when the record's rule is inactive or unknown.
///
/// # Errors
///
/// Returns [`TranslateError::UnknownFile`] when `resolver` does not know the
/// record's file.
///
/// # Example
///
/// ```
/// use lintbridge_engine::{DiagnosticRecord, TextSpan};
/// use lintbridge_sensor::active::{ActiveRule, ActiveRuleSet};
/// use lintbridge_sensor::files::{InputFile, InputFileSet};
/// use lintbridge_sensor::translate::translate;
///
/// let mut files = InputFileSet::new("/src/project");
/// files.insert(InputFile::new("a.ts", "short\n")).unwrap();
/// let rules = ActiveRuleSet::new().with_rule(ActiveRule::new("S4275"));
///
/// let record = DiagnosticRecord::new("S4275", "a.ts", TextSpan::new(0, 2, 0, 99), "m");
/// let issue = translate(&record, &rules, &files).unwrap().unwrap();
/// assert_eq!(issue.range().end_column(), 5);
///
/// let inactive = DiagnosticRecord::new("S3776", "a.ts", TextSpan::new(0, 0, 0, 1), "m");
/// assert!(translate(&inactive, &rules, &files).unwrap().is_none());
/// ```
pub fn translate<R>(
    record: &DiagnosticRecord,
    active_rules: &ActiveRuleSet,
    resolver: &R,
) -> Result<Option<Issue>, TranslateError>
where
    R: FileResolver + ?Sized,
{
    if !active_rules.is_active(record.rule_key()) {
        return Ok(None);
    }
    let file = resolver
        .resolve(record.file_path())
        .ok_or_else(|| TranslateError::UnknownFile {
            path: record.file_path().to_path_buf(),
        })?;
    let issue = Issue::new(
        record.rule_key(),
        file.relative_path(),
        clamp(record.span(), file),
        record.message(),
    )
    .with_severity(record.severity());
    Ok(Some(issue))
}

/// Clamps `span` so it lies within `file`.
#[must_use]
pub fn clamp(span: TextSpan, file: &InputFile) -> TextRange {
    let last_line = file.last_line();
    let start_line = span.line().min(last_line);
    let start_column = span.column().min(line_length(file, start_line));
    let end_line = span.end_line().clamp(start_line, last_line);
    let mut end_column = span.end_column().min(line_length(file, end_line));
    if end_line == start_line {
        end_column = end_column.max(start_column);
    }
    TextRange::new(start_line, start_column, end_line, end_column)
}

fn line_length(file: &InputFile, line: u32) -> u32 {
    file.line_length(line).unwrap_or_default()
}
