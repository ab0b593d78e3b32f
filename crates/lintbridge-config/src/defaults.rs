use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::cache_dir;

/// Default log filter expression used when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default wall-clock budget for a single engine run, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default location of the engine entry point inside the bundle root.
pub const DEFAULT_ENGINE_ENTRY: &str = "bin/engine";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default engine timeout in seconds.
#[must_use]
pub const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Default engine entry point relative to the bundle root.
#[must_use]
pub fn default_engine_entry() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ENGINE_ENTRY)
}

/// Computes the default directory bundles are deployed into.
#[must_use]
pub fn default_work_dir() -> Utf8PathBuf {
    let mut base = base_directory();
    base.push("lintbridge");
    base
}

#[cfg(unix)]
fn base_directory() -> Utf8PathBuf {
    cache_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(temp_directory)
}

#[cfg(not(unix))]
fn base_directory() -> Utf8PathBuf {
    temp_directory()
}

fn temp_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
