//! Configuration payload handed to the engine on stdin.
//!
//! The launcher serialises one [`AnalysisRequest`] as a single JSON line,
//! writes it to the engine's stdin, and closes the pipe to signal the end of
//! input. The request is immutable once sent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Activation entry for one rule, with optional rule-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    key: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, serde_json::Value>,
}

impl RuleConfig {
    /// Creates an entry without parameters.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Replaces the rule parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: BTreeMap<String, serde_json::Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Rule key.
    #[must_use]
    pub const fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Rule parameters.
    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.parameters
    }
}

/// Everything the engine needs to analyse one batch of files.
///
/// # Example
///
/// ```
/// use lintbridge_engine::request::{AnalysisRequest, RuleConfig};
/// use std::path::PathBuf;
///
/// let request = AnalysisRequest::new("/project")
///     .with_file("/project/src/a.ts")
///     .with_rule(RuleConfig::new("S4275"));
/// let line = request.to_json_line().unwrap();
/// assert!(line.ends_with('\n'));
/// assert!(line.contains("\"workingDirectory\":\"/project\""));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    working_directory: PathBuf,
    files: Vec<PathBuf>,
    rules: Vec<RuleConfig>,
}

impl AnalysisRequest {
    /// Creates a request with no files and no rules.
    #[must_use]
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            files: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Appends an input file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Appends several input files, preserving their order.
    #[must_use]
    pub fn with_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Appends an active rule.
    #[must_use]
    pub fn with_rule(mut self, rule: RuleConfig) -> Self {
        self.rules.push(rule);
        self
    }

    /// Directory the engine runs in and resolves relative paths against.
    #[must_use]
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Input files in submission order.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Active rules.
    #[must_use]
    pub fn rules(&self) -> &[RuleConfig] {
        &self.rules
    }

    /// Serialises the request as one newline-terminated JSON document.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error if a parameter value cannot be encoded.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_keeps_file_order() {
        let request = AnalysisRequest::new("/p").with_files(["/p/b.ts", "/p/a.ts"]);
        assert_eq!(
            request.files(),
            [PathBuf::from("/p/b.ts"), PathBuf::from("/p/a.ts")]
        );
    }

    #[test]
    fn request_serialises_as_flat_document() {
        let mut parameters = BTreeMap::new();
        parameters.insert(String::from("threshold"), json!(15));
        let request = AnalysisRequest::new("/p")
            .with_file("/p/a.ts")
            .with_rule(RuleConfig::new("S3776").with_parameters(parameters))
            .with_rule(RuleConfig::new("S4275"));

        let line = request.to_json_line().expect("serialise");
        assert_eq!(line.matches('\n').count(), 1, "exactly one line");

        let value: serde_json::Value = serde_json::from_str(&line).expect("parse back");
        assert_eq!(
            value,
            json!({
                "workingDirectory": "/p",
                "files": ["/p/a.ts"],
                "rules": [
                    {"key": "S3776", "parameters": {"threshold": 15}},
                    {"key": "S4275"}
                ]
            })
        );
    }
}
