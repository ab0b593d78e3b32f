//! Errors raised while turning engine output into issues.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use lintbridge_engine::EngineError;

use crate::telemetry::TelemetryError;

/// Errors raised while building the rule registry or activating rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two definitions share a rule key.
    #[error("rule '{key}' is defined more than once")]
    DuplicateRule {
        /// Offending key.
        key: String,
    },

    /// A rule definition has an empty key.
    #[error("rule definition '{name}' has an empty key")]
    EmptyKey {
        /// Human-readable name of the definition.
        name: String,
    },

    /// Activation referred to a rule that is not registered.
    #[error("rule '{key}' is not registered")]
    UnknownRule {
        /// Requested key.
        key: String,
    },
}

/// Reasons a diagnostic record cannot become an issue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// The record names a file that is not part of the analysis.
    #[error("diagnostic refers to unknown file '{}'", .path.display())]
    UnknownFile {
        /// Path as reported by the engine.
        path: PathBuf,
    },
}

/// Errors raised while collecting input files.
#[derive(Debug, Error)]
pub enum InputFileError {
    /// A file could not be read.
    #[error("failed to read input file '{}': {source}", .path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A path leaves the base directory.
    #[error("input file '{}' is outside the base directory", .path.display())]
    OutsideBase {
        /// Offending path.
        path: PathBuf,
    },

    /// The same file was added twice.
    #[error("input file '{}' was added more than once", .path.display())]
    Duplicate {
        /// Offending path, relative to the base directory.
        path: PathBuf,
    },
}

/// Errors that abort an analysis.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The engine could not be deployed, started or completed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Input files could not be collected.
    #[error(transparent)]
    Input(#[from] InputFileError),

    /// Rules could not be activated.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Logging could not be configured.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}

impl SensorError {
    /// Lines the engine wrote to stderr, when the engine failed.
    #[must_use]
    pub fn engine_stderr(&self) -> &[String] {
        match self {
            Self::Engine(err) => err.stderr(),
            Self::Input(_) | Self::Registry(_) | Self::Telemetry(_) => &[],
        }
    }
}
