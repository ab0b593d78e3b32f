//! Out-of-process analysis engine supervision for lintbridge.
//!
//! The `lintbridge-engine` crate owns everything between a packaged engine
//! bundle and the stream of diagnostics it produces. A bundle archive is
//! expanded onto disk by [`bundle::deploy`], the engine is started from it by
//! an [`EngineLauncher`], and the resulting [`EngineRun`] yields
//! [`DiagnosticRecord`]s decoded from the engine's stdout while a second
//! thread drains stderr.
//!
//! # Protocol
//!
//! The launcher writes one [`AnalysisRequest`] as a single JSON line to the
//! engine's stdin and closes it. The engine answers with JSON Lines on stdout,
//! one record per line, and exits with status zero. Anything written to
//! stderr is free-form and surfaces verbatim in errors.
//!
//! # Example
//!
//! ```rust,no_run
//! use lintbridge_engine::bundle;
//! use lintbridge_engine::{AnalysisRequest, EngineCommand, EngineLauncher, RuleConfig, RunOptions};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let root = bundle::deploy_file(
//!     Path::new("engine-bundle.zip"),
//!     Path::new("/tmp/lintbridge"),
//! )
//! .expect("bundle deploys");
//! let launcher = EngineLauncher::new(EngineCommand::new("bin/engine"));
//! let request = AnalysisRequest::new("/src/project")
//!     .with_file("src/a.ts")
//!     .with_rule(RuleConfig::new("S3776"));
//! let mut run = launcher
//!     .launch(&root, &request, RunOptions::new(Duration::from_secs(60)))
//!     .expect("engine starts");
//! for record in run.by_ref() {
//!     println!("{}: {}", record.rule_key(), record.message());
//! }
//! let report = run.finish().into_result().expect("engine succeeds");
//! assert_eq!(report.exit_code(), 0);
//! ```

pub mod bundle;
pub mod cancel;
pub mod consumer;
pub mod error;
pub mod launcher;
pub mod protocol;
pub mod request;
pub mod run;

#[cfg(all(test, unix))]
mod tests;

pub use self::bundle::BundleRoot;
pub use self::cancel::CancellationToken;
pub use self::consumer::{ENGINE_STDERR_TARGET, ErrorLineSink, ErrorLog};
pub use self::error::{DeployError, EngineError};
pub use self::launcher::{EngineCommand, EngineLauncher, RunOptions};
pub use self::protocol::{DecodeError, DiagnosticRecord, RecordDecoder, Severity, TextSpan};
pub use self::request::{AnalysisRequest, RuleConfig};
pub use self::run::{EngineRun, KillReason, RunFailure, RunOutcome, RunReport, RunState, RunStatus};
