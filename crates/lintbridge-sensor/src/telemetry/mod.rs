//! Structured telemetry initialisation for analysis hosts.
//!
//! The configured `log_filter` governs the bridge's own targets. Engine
//! stderr lines arrive under [`ENGINE_STDERR_TARGET`] and are kept at `warn`
//! unless the filter names that target itself, so a quiet host filter such
//! as `error` still surfaces what the engine complained about.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt;

use lintbridge_config::{Config, LogFormat};
use lintbridge_engine::ENGINE_STDERR_TARGET;

/// Tracing target for telemetry setup.
const TELEMETRY_TARGET: &str = "lintbridge_sensor::telemetry";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter expression does not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The tracing subscriber could not be installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Every call validates the filter. Later calls then return a fresh
/// [`TelemetryHandle`] without touching global state, so hosts and tests may
/// call this freely.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable `log_filter` and
/// [`TelemetryError::Subscriber`] when another subscriber is already
/// installed.
///
/// # Examples
///
/// ```rust
/// use lintbridge_config::Config;
/// use lintbridge_sensor::telemetry;
///
/// # fn main() -> Result<(), lintbridge_sensor::telemetry::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// drop((first, second));
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter = build_filter(config)?;
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config, filter))
        .map(|()| TelemetryHandle)
}

/// Parses the configured filter and scopes engine stderr to `warn` unless
/// the filter already names [`ENGINE_STDERR_TARGET`].
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable `log_filter`.
pub fn build_filter(config: &Config) -> Result<EnvFilter, TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    if config.log_filter().contains(ENGINE_STDERR_TARGET) {
        return Ok(filter);
    }
    let directive = format!("{ENGINE_STDERR_TARGET}=warn")
        .parse::<Directive>()
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;
    Ok(filter.add_directive(directive))
}

fn install_subscriber(config: &Config, filter: EnvFilter) -> Result<(), TelemetryError> {
    let format = config.log_format();

    let builder = |env_filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_level(true)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(!format.is_structured() && io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    info!(
        target: TELEMETRY_TARGET,
        filter = config.log_filter(),
        %format,
        "telemetry initialised"
    );
    Ok(())
}
