//! Output format for the bridge's own log records.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How log records emitted by the bridge and its engine runs are rendered.
///
/// Parsed case-insensitively from `LINTBRIDGE_LOG_FORMAT`, `--log-format`, or
/// the `log_format` key of the configuration file.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per record, with event fields flattened to the top
    /// level. Analysis hosts forward these to their own log collection.
    #[default]
    Json,
    /// Single-line text for a developer watching a terminal.
    Compact,
}

impl LogFormat {
    /// Whether records are meant for a machine; such output never carries
    /// terminal colour codes.
    #[must_use]
    pub const fn is_structured(self) -> bool {
        matches!(self, Self::Json)
    }
}
