//! App log types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_LOG_TAG;

/// Log severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
    Assert,
}

impl Severity {
    /// Single-letter label used in formatted lines
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Verbose => "V",
            Severity::Debug => "D",
            Severity::Info => "I",
            Severity::Warn => "W",
            Severity::Error => "E",
            Severity::Assert => "A",
        }
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Severity::Verbose,
            log::Level::Debug => Severity::Debug,
            log::Level::Info => Severity::Info,
            log::Level::Warn => Severity::Warn,
            log::Level::Error => Severity::Error,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One captured log call. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub tag: Option<String>,
    pub message: String,
    /// Error or stack trace text attached to the call
    pub error: Option<String>,
}

impl LogEntry {
    /// `"<time> <severity>/<tag>: <message>[\n<error>]"`
    pub fn format(&self) -> String {
        let mut line = format!(
            "{} {}/{}: {}",
            self.timestamp.format("%m-%d %H:%M:%S%.3f"),
            self.severity.label(),
            self.tag.as_deref().unwrap_or(DEFAULT_LOG_TAG),
            self.message
        );
        if let Some(error) = &self.error {
            line.push('\n');
            line.push_str(error);
        }
        line
    }
}
