//! Loading annotated fixtures from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::marker::{ExpectedIssue, expected_issues, expected_lines};

/// Tracing target for fixture loading.
const FIXTURE_TARGET: &str = "lintbridge_oracle::fixture";

/// Errors raised while loading a fixture.
#[derive(Debug, Clone, Error)]
pub enum FixtureError {
    /// The fixture could not be read as UTF-8 text.
    #[error("failed to read fixture '{}': {source}", .path.display())]
    Read {
        /// Fixture path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Annotated source text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    path: PathBuf,
    text: String,
}

impl Fixture {
    /// Wraps text that is already in memory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// Reads the fixture at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Read`] when the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let location = path.as_ref();
        let text = fs::read_to_string(location).map_err(|err| FixtureError::Read {
            path: location.to_path_buf(),
            source: Arc::new(err),
        })?;
        let fixture = Self::new(location, text);
        debug!(
            target: FIXTURE_TARGET,
            path = %location.display(),
            markers = fixture.expected_lines().len(),
            "loaded fixture"
        );
        Ok(fixture)
    }

    /// Where the fixture was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fixture text, markers included.
    #[must_use]
    pub const fn text(&self) -> &str {
        self.text.as_str()
    }

    /// Lines carrying an expected issue.
    #[must_use]
    pub fn expected_lines(&self) -> Vec<usize> {
        expected_lines(&self.text)
    }

    /// Expected issues with their columns and messages.
    #[must_use]
    pub fn expected_issues(&self) -> Vec<ExpectedIssue> {
        expected_issues(&self.text)
    }
}
