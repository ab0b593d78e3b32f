//! Spawning the engine process for one analysis run.
//!
//! [`EngineLauncher`] resolves the engine entry inside a deployed bundle,
//! starts the child with all three standard streams piped, and hands the
//! pipes and the serialised [`AnalysisRequest`] to the [`EngineRun`] that
//! feeds, drains and supervises the child for the rest of the run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use lintbridge_config::Config;

use crate::bundle::BundleRoot;
use crate::cancel::CancellationToken;
use crate::consumer::ErrorLineSink;
use crate::error::EngineError;
use crate::protocol::DiagnosticRecord;
use crate::request::AnalysisRequest;
use crate::run::{EngineRun, RunReport};

/// Tracing target for engine launches.
const LAUNCHER_TARGET: &str = "lintbridge_engine::launcher";

/// Environment variable pointing the engine at its bundle root.
pub const BUNDLE_ROOT_ENV: &str = "LINTBRIDGE_BUNDLE_ROOT";

/// Interval at which a run checks for cancellation and its deadline.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How the engine is invoked.
///
/// The entry is a path relative to the bundle root. Without a runtime the
/// entry is executed directly; with one, the runtime program is executed and
/// receives the entry as its first argument.
///
/// # Example
///
/// ```
/// use lintbridge_engine::launcher::EngineCommand;
/// use std::path::Path;
///
/// let command = EngineCommand::new("bin/server.js")
///     .with_runtime("node")
///     .with_arg("--max-old-space-size=2048");
/// assert_eq!(command.runtime(), Some("node"));
/// assert_eq!(command.entry(), Path::new("bin/server.js"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    runtime: Option<String>,
    entry: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl EngineCommand {
    /// Creates a command executing `entry` directly.
    #[must_use]
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        Self {
            runtime: None,
            entry: entry.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Builds the command described by the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let command = Self::new(config.engine_entry().as_std_path());
        match config.runtime_command.as_deref() {
            Some(runtime) => command.with_runtime(runtime),
            None => command,
        }
    }

    /// Runs the entry through `runtime`.
    #[must_use]
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Appends an argument passed after the entry.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds an environment variable for the child.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Runtime program, when the entry is not executed directly.
    #[must_use]
    pub fn runtime(&self) -> Option<&str> {
        self.runtime.as_deref()
    }

    /// Bundle-relative entry path.
    #[must_use]
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Extra arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self, entry: &Path) -> String {
        self.runtime
            .clone()
            .unwrap_or_else(|| entry.display().to_string())
    }

    fn build(&self, entry: &Path, bundle: &BundleRoot) -> Command {
        let mut command = match self.runtime.as_deref() {
            Some(runtime) => {
                let mut with_runtime = Command::new(runtime);
                with_runtime.arg(entry);
                with_runtime
            }
            None => Command::new(entry),
        };
        command
            .args(&self.args)
            .env(BUNDLE_ROOT_ENV, bundle.path())
            .envs(self.env.iter().map(|(key, value)| (key, value)));
        command
    }
}

/// Limits applied to a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    timeout: Duration,
    cancellation: CancellationToken,
    poll_interval: Duration,
}

impl RunOptions {
    /// Creates options with the given time budget and a fresh cancellation
    /// token.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancellation: CancellationToken::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Uses `token` to cancel the run from elsewhere.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Overrides how often the run checks its deadline and cancellation.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Time budget for the whole run.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Token observed by the run.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Deadline and cancellation polling interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Starts engine runs from a deployed bundle.
///
/// # Example
///
/// ```no_run
/// use lintbridge_engine::bundle::BundleRoot;
/// use lintbridge_engine::launcher::{EngineCommand, EngineLauncher};
/// use lintbridge_engine::request::{AnalysisRequest, RuleConfig};
/// use std::time::Duration;
///
/// let launcher = EngineLauncher::new(EngineCommand::new("bin/engine"));
/// let bundle = BundleRoot::new("/var/cache/lintbridge/bundle");
/// let request = AnalysisRequest::new("/src/project")
///     .with_file("src/a.ts")
///     .with_rule(RuleConfig::new("S4275"));
/// let (records, result) = launcher.run(&bundle, &request, Duration::from_secs(60));
/// println!("{} records, {:?}", records.len(), result.map(|report| report.exit_code()));
/// ```
#[derive(Clone)]
pub struct EngineLauncher {
    command: EngineCommand,
    error_sink: Option<Arc<dyn ErrorLineSink>>,
}

impl EngineLauncher {
    /// Creates a launcher for `command`.
    #[must_use]
    pub const fn new(command: EngineCommand) -> Self {
        Self {
            command,
            error_sink: None,
        }
    }

    /// Forwards every stderr line of every run to `sink`.
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorLineSink>) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Command used for each run.
    #[must_use]
    pub const fn command(&self) -> &EngineCommand {
        &self.command
    }

    /// Starts the engine and hands `request` to a thread writing it to stdin.
    ///
    /// Both output streams are already being drained when this returns, and
    /// it never waits for the engine to read its input, so the run's timeout
    /// and cancellation also cover the request write. Failures to write the
    /// request do not abort the launch; they surface from
    /// [`EngineRun::finish`] together with the engine's stderr.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntryNotFound`] when the entry is missing from
    /// the bundle, [`EngineError::SerializeRequest`] when the request cannot
    /// be encoded, [`EngineError::Launch`] when the process cannot be
    /// started, and [`EngineError::Supervision`] when the reader threads
    /// cannot be started.
    pub fn launch(
        &self,
        bundle: &BundleRoot,
        request: &AnalysisRequest,
        options: RunOptions,
    ) -> Result<EngineRun, EngineError> {
        let entry = bundle
            .resolve(self.command.entry())
            .filter(|path| path.is_file())
            .ok_or_else(|| EngineError::EntryNotFound {
                path: bundle.path().join(self.command.entry()),
            })?;
        let payload = request
            .to_json_line()
            .map_err(EngineError::SerializeRequest)?;

        let mut command = self.command.build(&entry, bundle);
        command
            .current_dir(request.working_directory())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut command);

        let program = self.command.program_name(&entry);
        debug!(
            target: LAUNCHER_TARGET,
            program = %program,
            entry = %entry.display(),
            working_directory = %request.working_directory().display(),
            files = request.files().len(),
            rules = request.rules().len(),
            "spawning engine process"
        );
        let child = command.spawn().map_err(|err| EngineError::Launch {
            program,
            source: Arc::new(err),
        })?;

        EngineRun::start(child, options, self.error_sink.clone(), payload)
    }

    /// Runs the engine to completion, collecting every record.
    ///
    /// Records decoded before a failure are returned alongside the error.
    #[must_use]
    pub fn run(
        &self,
        bundle: &BundleRoot,
        request: &AnalysisRequest,
        timeout: Duration,
    ) -> (Vec<DiagnosticRecord>, Result<RunReport, EngineError>) {
        match self.launch(bundle, request, RunOptions::new(timeout)) {
            Ok(run) => run.finish().into_parts(),
            Err(err) => (Vec::new(), Err(err)),
        }
    }
}

impl fmt::Debug for EngineLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineLauncher")
            .field("command", &self.command)
            .field("error_sink", &self.error_sink.is_some())
            .finish()
    }
}

/// Places the child in a new process group so a kill reaches the whole tree.
#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
const fn isolate_process_group(_command: &mut Command) {}
