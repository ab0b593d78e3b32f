//! Host-side bridge from engine diagnostics to domain issues.
//!
//! The `lintbridge-sensor` crate sits between the host orchestrator and the
//! engine supervised by `lintbridge-engine`. The host supplies its rules
//! through a static [`RuleRegistry`], chooses an [`ActiveRuleSet`] for the
//! analysis, and describes the files to analyse with an [`InputFileSet`]. A
//! [`Sensor`] then runs the engine, translates every record whose rule is
//! active into an [`Issue`] attached to the matching input file, and hands
//! the issues to an [`IssueSink`] in the order the engine wrote them.
//! [`Sensor::from_config`] also installs the bridge's [`telemetry`] unless
//! the host already owns a tracing subscriber.
//!
//! # Example
//!
//! ```no_run
//! use lintbridge_config::Config;
//! use lintbridge_sensor::{ActiveRuleSet, CollectingSink, RuleDefinition, RuleRegistry, Sensor};
//!
//! let config = Config::default();
//!
//! let registry = RuleRegistry::new([
//!     RuleDefinition::new("S4275", "Getters and setters should access the expected fields"),
//!     RuleDefinition::new("S3776", "Cognitive Complexity of functions should not be too high"),
//! ])
//! .expect("unique rule keys");
//! let rules = ActiveRuleSet::from_registry(&registry, ["S4275"]).expect("known rules");
//!
//! let sensor = Sensor::from_config(&config).expect("engine bundle");
//! let mut sink = CollectingSink::default();
//! let report = sensor
//!     .analyse_paths("/src/project".as_ref(), ["src/a.ts"], &rules, &mut sink)
//!     .expect("analysis succeeds");
//! assert_eq!(report.issues(), sink.issues().len());
//! ```

pub mod active;
pub mod error;
pub mod files;
pub mod issue;
pub mod rules;
pub mod sensor;
pub mod telemetry;
pub mod translate;

#[cfg(test)]
mod tests;

pub use self::active::{ActiveRule, ActiveRuleSet};
pub use self::error::{InputFileError, RegistryError, SensorError, TranslateError};
pub use self::files::{FileResolver, InputFile, InputFileSet};
pub use self::issue::{CollectingSink, Issue, IssueSink, TextRange};
pub use self::rules::{RuleDefinition, RuleRegistry};
pub use self::sensor::{EngineExecutor, ProcessExecutor, Sensor, SensorReport};
pub use self::translate::translate;
