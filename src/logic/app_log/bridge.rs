//! `log` facade bridge
//!
//! Installs a logger that copies every `log::*!` record emitted by the host
//! application into an [`AppLogCollector`], then forwards it to an
//! `env_logger` so console output keeps working.

use std::sync::Arc;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use super::collector::AppLogCollector;
use super::types::Severity;

/// Records from this crate are forwarded but never captured
const SDK_TARGET: &str = "bugshake";

pub struct CaptureLogger {
    collector: Arc<AppLogCollector>,
    capture_level: LevelFilter,
    inner: Option<env_logger::Logger>,
}

impl CaptureLogger {
    pub fn new(collector: Arc<AppLogCollector>, capture_level: LevelFilter) -> Self {
        Self {
            collector,
            capture_level,
            inner: None,
        }
    }

    /// Forward records to `inner` after capturing them
    pub fn with_inner(mut self, inner: env_logger::Logger) -> Self {
        self.inner = Some(inner);
        self
    }

    fn max_level(&self) -> LevelFilter {
        let inner = self.inner.as_ref().map(|l| l.filter()).unwrap_or(LevelFilter::Off);
        self.capture_level.max(inner)
    }

    fn should_capture(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.capture_level && !is_sdk_target(metadata.target())
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.should_capture(metadata)
            || self.inner.as_ref().map(|l| l.enabled(metadata)).unwrap_or(false)
    }

    fn log(&self, record: &Record) {
        if self.should_capture(record.metadata()) {
            self.collector.record(
                Severity::from(record.level()),
                Some(record.target()),
                record.args().to_string(),
                None,
            );
        }

        if let Some(inner) = &self.inner {
            if inner.matches(record) {
                inner.log(record);
            }
        }
    }

    fn flush(&self) {
        if let Some(inner) = &self.inner {
            inner.flush();
        }
    }
}

fn is_sdk_target(target: &str) -> bool {
    target
        .strip_prefix(SDK_TARGET)
        .map(|rest| rest.is_empty() || rest.starts_with("::"))
        .unwrap_or(false)
}

/// Install the capture logger as the process-wide `log` backend.
///
/// Console output goes through `env_logger` (`RUST_LOG`, default `info`).
pub fn install(collector: Arc<AppLogCollector>, capture_level: LevelFilter) -> Result<(), SetLoggerError> {
    let inner = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    let logger = CaptureLogger::new(collector, capture_level).with_inner(inner);
    let max_level = logger.max_level();

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(max_level);
    Ok(())
}
