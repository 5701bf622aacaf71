//! App Log Collector
//!
//! Keeps the most recent application log calls in a ring buffer so they can
//! be attached to a bug report.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::Utc;

use super::types::{LogEntry, Severity};
use crate::logic::buffer::{BufferStatus, RingBuffer};

pub struct AppLogCollector {
    buffer: RingBuffer<LogEntry>,
}

impl AppLogCollector {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: RingBuffer::new(capacity),
        }
    }

    /// Record one log call with the current timestamp
    pub fn record(
        &self,
        severity: Severity,
        tag: Option<&str>,
        message: impl Into<String>,
        error: Option<&dyn std::fmt::Display>,
    ) {
        self.buffer.append(LogEntry {
            timestamp: Utc::now(),
            severity,
            tag: tag.map(str::to_string),
            message: message.into(),
            error: error.map(|e| e.to_string()),
        });
    }

    pub fn verbose(&self, tag: &str, message: impl Into<String>) {
        self.record(Severity::Verbose, Some(tag), message, None);
    }

    pub fn debug(&self, tag: &str, message: impl Into<String>) {
        self.record(Severity::Debug, Some(tag), message, None);
    }

    pub fn info(&self, tag: &str, message: impl Into<String>) {
        self.record(Severity::Info, Some(tag), message, None);
    }

    pub fn warn(&self, tag: &str, message: impl Into<String>) {
        self.record(Severity::Warn, Some(tag), message, None);
    }

    pub fn error(&self, tag: &str, message: impl Into<String>, error: Option<&dyn std::fmt::Display>) {
        self.record(Severity::Error, Some(tag), message, error);
    }

    /// "What a terrible failure" - the Assert level
    pub fn assert(&self, tag: &str, message: impl Into<String>, error: Option<&dyn std::fmt::Display>) {
        self.record(Severity::Assert, Some(tag), message, error);
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.buffer.snapshot()
    }

    pub fn filter_by_severity_at_least(&self, min: Severity) -> Vec<LogEntry> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.severity >= min)
            .collect()
    }

    /// Entries recorded within the last `window`
    pub fn filter_since(&self, window: Duration) -> Vec<LogEntry> {
        let entries = self.snapshot();
        let Some(cutoff) = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w))
        else {
            return entries;
        };

        entries.into_iter().filter(|e| e.timestamp >= cutoff).collect()
    }

    pub fn format_all(&self) -> String {
        self.snapshot()
            .iter()
            .map(LogEntry::format)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    pub fn status(&self) -> BufferStatus {
        self.buffer.status()
    }
}
