//! End-to-end analysis: request, engine run, translation and reporting.
//!
//! The [`Sensor`] builds an [`AnalysisRequest`] from the input files and
//! active rules, hands it to an [`EngineExecutor`], translates each record as
//! it arrives and forwards the resulting issues to an [`IssueSink`] in decode
//! order. Records for inactive rules are skipped in place; records naming
//! unknown files are logged and dropped.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use lintbridge_config::Config;
use lintbridge_engine::{
    AnalysisRequest, BundleRoot, CancellationToken, DiagnosticRecord, EngineCommand, EngineError,
    EngineLauncher, ErrorLineSink, ErrorLog, RunOptions, RunReport, bundle,
};

use crate::active::ActiveRuleSet;
use crate::error::{SensorError, TranslateError};
use crate::files::{InputFile, InputFileSet};
use crate::issue::IssueSink;
use crate::telemetry::{self, TelemetryError};
use crate::translate::translate;

/// Tracing target for sensor orchestration.
const SENSOR_TARGET: &str = "lintbridge_sensor::sensor";

/// Runs the engine for one request, handing records over as they are
/// decoded.
///
/// The production implementation is [`ProcessExecutor`]. Tests implement this
/// trait to replay canned records without spawning processes.
///
/// # Example
///
/// ```
/// use lintbridge_engine::{AnalysisRequest, DiagnosticRecord, EngineError, RunReport};
/// use lintbridge_sensor::sensor::EngineExecutor;
///
/// struct SilentEngine;
///
/// impl EngineExecutor for SilentEngine {
///     fn execute(
///         &self,
///         _request: &AnalysisRequest,
///         _on_record: &mut dyn FnMut(DiagnosticRecord),
///     ) -> Result<RunReport, EngineError> {
///         Err(EngineError::Cancelled { stderr: Vec::new() })
///     }
/// }
/// ```
pub trait EngineExecutor {
    /// Runs the engine for `request`, calling `on_record` for every record
    /// in the order the engine wrote them.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the engine cannot be started, fails,
    /// or is killed. Records delivered before the failure stay delivered.
    fn execute(
        &self,
        request: &AnalysisRequest,
        on_record: &mut dyn FnMut(DiagnosticRecord),
    ) -> Result<RunReport, EngineError>;
}

/// Executes the engine as a child process from a deployed bundle.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    launcher: EngineLauncher,
    bundle: BundleRoot,
    options: RunOptions,
}

impl ProcessExecutor {
    /// Creates an executor running `launcher` from `bundle` with a time
    /// budget of `timeout` per run.
    #[must_use]
    pub fn new(launcher: EngineLauncher, bundle: BundleRoot, timeout: Duration) -> Self {
        Self {
            launcher,
            bundle,
            options: RunOptions::new(timeout),
        }
    }

    /// Builds an executor from configuration, deploying the bundle archive
    /// into the work directory when one is configured. Without an archive
    /// the work directory is taken to hold an already deployed bundle.
    /// Engine stderr from every run is logged through one shared
    /// [`ErrorLog`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Deployment`] when the archive cannot be
    /// deployed, and [`EngineError::Supervision`] when the stderr log thread
    /// cannot be started.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let work_dir = config.work_dir().as_std_path();
        let root = match config.bundle_archive.as_deref() {
            Some(archive) => bundle::deploy_file(archive.as_std_path(), work_dir)?,
            None => BundleRoot::new(work_dir),
        };
        info!(
            target: SENSOR_TARGET,
            bundle = %root.path().display(),
            "engine bundle ready"
        );
        let errors = ErrorLog::start().map_err(|err| EngineError::Supervision {
            message: format!("failed to start engine stderr log: {err}"),
            stderr: Vec::new(),
        })?;
        let launcher =
            EngineLauncher::new(EngineCommand::from_config(config)).with_error_sink(errors);
        Ok(Self::new(launcher, root, config.timeout()))
    }

    /// Forwards engine stderr lines to `sink`.
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorLineSink>) -> Self {
        self.launcher = self.launcher.with_error_sink(sink);
        self
    }

    /// Token cancelling every run started by this executor.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        self.options.cancellation()
    }

    /// Bundle the engine runs from.
    #[must_use]
    pub const fn bundle(&self) -> &BundleRoot {
        &self.bundle
    }
}

impl EngineExecutor for ProcessExecutor {
    fn execute(
        &self,
        request: &AnalysisRequest,
        on_record: &mut dyn FnMut(DiagnosticRecord),
    ) -> Result<RunReport, EngineError> {
        let mut run = self
            .launcher
            .launch(&self.bundle, request, self.options.clone())?;
        for record in run.by_ref() {
            on_record(record);
        }
        let (remaining, result) = run.finish().into_parts();
        remaining.into_iter().for_each(on_record);
        result
    }
}

/// Counts describing one completed analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorReport {
    issues: usize,
    inactive_dropped: usize,
    unknown_file_dropped: usize,
    warnings: Vec<String>,
}

impl SensorReport {
    /// Issues handed to the sink.
    #[must_use]
    pub const fn issues(&self) -> usize {
        self.issues
    }

    /// Records skipped because their rule was not active.
    #[must_use]
    pub const fn inactive_dropped(&self) -> usize {
        self.inactive_dropped
    }

    /// Records dropped because they named a file outside the analysis.
    #[must_use]
    pub const fn unknown_file_dropped(&self) -> usize {
        self.unknown_file_dropped
    }

    /// Stderr lines written by the engine.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Drives analyses through an [`EngineExecutor`].
///
/// # Example
///
/// ```
/// use lintbridge_engine::{AnalysisRequest, DiagnosticRecord, EngineError, RunReport, TextSpan};
/// use lintbridge_sensor::active::{ActiveRule, ActiveRuleSet};
/// use lintbridge_sensor::files::{InputFile, InputFileSet};
/// use lintbridge_sensor::issue::CollectingSink;
/// use lintbridge_sensor::sensor::{EngineExecutor, Sensor};
///
/// struct Replay;
///
/// impl EngineExecutor for Replay {
///     fn execute(
///         &self,
///         _request: &AnalysisRequest,
///         on_record: &mut dyn FnMut(DiagnosticRecord),
///     ) -> Result<RunReport, EngineError> {
///         on_record(DiagnosticRecord::new("S4275", "a.ts", TextSpan::new(0, 0, 0, 3), "m"));
///         Err(EngineError::Cancelled { stderr: Vec::new() })
///     }
/// }
///
/// let mut files = InputFileSet::new("/src/project");
/// files.insert(InputFile::new("a.ts", "get();\n")).unwrap();
/// let rules = ActiveRuleSet::new().with_rule(ActiveRule::new("S4275"));
/// let mut sink = CollectingSink::default();
///
/// let result = Sensor::new(Replay).analyse(&files, &rules, &mut sink);
/// assert!(result.is_err());
/// assert_eq!(sink.issues().len(), 1);
/// ```
#[derive(Debug)]
pub struct Sensor<E> {
    executor: E,
}

impl Sensor<ProcessExecutor> {
    /// Creates a sensor running the engine described by `config`, installing
    /// the bridge's tracing subscriber unless the host already owns one.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Telemetry`] for an unparsable log filter and
    /// [`SensorError::Engine`] when the bundle cannot be deployed.
    pub fn from_config(config: &Config) -> Result<Self, SensorError> {
        match telemetry::initialise(config) {
            Ok(_) => {}
            Err(TelemetryError::Subscriber(_)) => debug!(
                target: SENSOR_TARGET,
                "host already installed a tracing subscriber"
            ),
            Err(err) => return Err(err.into()),
        }
        Ok(Self::new(ProcessExecutor::from_config(config)?))
    }
}

impl<E> Sensor<E> {
    /// Creates a sensor delegating engine runs to `executor`.
    #[must_use]
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Executor used for engine runs.
    #[must_use]
    pub const fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: EngineExecutor> Sensor<E> {
    /// Analyses `files` with `rules`, reporting issues to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Engine`] when the engine run fails. Issues
    /// produced before the failure have already been handed to `sink`.
    pub fn analyse(
        &self,
        files: &InputFileSet,
        rules: &ActiveRuleSet,
        sink: &mut dyn IssueSink,
    ) -> Result<SensorReport, SensorError> {
        let request = build_request(files, rules);
        let mut report = SensorReport::default();
        debug!(
            target: SENSOR_TARGET,
            files = files.len(),
            rules = rules.len(),
            "starting analysis"
        );

        let mut on_record = |record: DiagnosticRecord| match translate(&record, rules, files) {
            Ok(Some(issue)) => {
                report.issues += 1;
                sink.accept(issue);
            }
            Ok(None) => report.inactive_dropped += 1,
            Err(TranslateError::UnknownFile { path }) => {
                report.unknown_file_dropped += 1;
                warn!(
                    target: SENSOR_TARGET,
                    rule = record.rule_key(),
                    file = %path.display(),
                    "dropping diagnostic for unknown file"
                );
            }
        };
        let outcome = self.executor.execute(&request, &mut on_record);

        match outcome {
            Ok(run) => {
                report.warnings = run.warnings().to_vec();
                info!(
                    target: SENSOR_TARGET,
                    issues = report.issues,
                    inactive_dropped = report.inactive_dropped,
                    unknown_file_dropped = report.unknown_file_dropped,
                    warnings = report.warnings.len(),
                    "analysis complete"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(
                    target: SENSOR_TARGET,
                    issues = report.issues,
                    error = %err,
                    "analysis failed"
                );
                Err(SensorError::Engine(err))
            }
        }
    }
}

impl<E: EngineExecutor> Sensor<E> {
    /// Reads `paths` beneath `base_dir` from disk and analyses them.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Input`] when a file cannot be read and
    /// [`SensorError::Engine`] when the run fails.
    pub fn analyse_paths<I, P>(
        &self,
        base_dir: &Path,
        paths: I,
        rules: &ActiveRuleSet,
        sink: &mut dyn IssueSink,
    ) -> Result<SensorReport, SensorError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files = InputFileSet::load(base_dir, paths)?;
        self.analyse(&files, rules, sink)
    }
}

fn build_request(files: &InputFileSet, rules: &ActiveRuleSet) -> AnalysisRequest {
    let mut request = AnalysisRequest::new(files.base_dir())
        .with_files(files.files().iter().map(InputFile::relative_path));
    for rule in rules.to_rule_configs() {
        request = request.with_rule(rule);
    }
    request
}
