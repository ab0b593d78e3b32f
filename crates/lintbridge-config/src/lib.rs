//! Layered configuration shared by every `lintbridge` entry point.
//!
//! Values are merged by `ortho_config` from, in increasing precedence, the
//! built-in defaults, a TOML file (`--config-path` or
//! `LINTBRIDGE_CONFIG_PATH`), `LINTBRIDGE_*` environment variables, and
//! command-line flags.

mod defaults;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_ENGINE_ENTRY, DEFAULT_LOG_FILTER, DEFAULT_TIMEOUT_SECS, default_engine_entry,
    default_log_filter, default_log_filter_string, default_log_format, default_timeout_secs,
    default_work_dir,
};
pub use logging::LogFormat;
pub use ortho_config::OrthoError;

/// Resolved configuration for an analysis bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "LINTBRIDGE")]
pub struct Config {
    /// Packaged engine bundle (zip archive). When unset the caller supplies
    /// an already deployed bundle root.
    pub bundle_archive: Option<Utf8PathBuf>,
    /// Directory the bundle is deployed into.
    #[ortho_config(default = default_work_dir())]
    pub work_dir: Utf8PathBuf,
    /// Program used to interpret the engine entry (for example `node`).
    /// When unset the entry is executed directly.
    pub runtime_command: Option<String>,
    /// Engine entry point, relative to the bundle root.
    #[ortho_config(default = default_engine_entry())]
    pub engine_entry: Utf8PathBuf,
    /// Wall-clock budget for one engine run.
    #[ortho_config(default = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_archive: None,
            work_dir: default_work_dir(),
            runtime_command: None,
            engine_entry: default_engine_entry(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration from the process arguments,
    /// environment, and configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a layer fails to parse and
    /// [`ConfigError::Invalid`] when the merged values are inconsistent.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load().map_err(ConfigError::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that the individual layers cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the timeout is zero or the
    /// engine entry is not relative to the bundle root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                message: String::from("must be greater than zero"),
            });
        }
        if self.engine_entry.is_absolute() || self.engine_entry.as_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "engine_entry",
                message: format!(
                    "must be a non-empty path relative to the bundle root, got '{}'",
                    self.engine_entry
                ),
            });
        }
        Ok(())
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Bundle deployment directory.
    #[must_use]
    pub fn work_dir(&self) -> &Utf8Path {
        self.work_dir.as_path()
    }

    /// Engine entry point relative to the bundle root.
    #[must_use]
    pub fn engine_entry(&self) -> &Utf8Path {
        self.engine_entry.as_path()
    }

    /// Engine run budget as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Errors raised while resolving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One of the configuration layers could not be loaded.
    #[error("failed to load configuration: {0}")]
    Load(#[source] Arc<OrthoError>),
    /// The merged configuration violates an invariant.
    #[error("invalid configuration value for '{field}': {message}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the violation.
        message: String,
    },
}
