//! Bugshake - shake-to-report SDK core
//!
//! Collects what a developer needs to understand a bug report (in-process
//! logs, HTTP traffic, the device log tail), detects the shake gesture that
//! opens the report flow, and signs the reporter in with the OAuth device
//! authorization flow.
//!
//! ```no_run
//! use bugshake::{BugReporter, SdkConfig};
//!
//! # async fn run() -> bugshake::Result<()> {
//! let reporter = BugReporter::new(SdkConfig::from_env())?;
//! reporter.ensure_signed_in()?;
//! let report = reporter.snapshot_report();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod constants;
pub mod error;
pub mod logic;

pub use api::{BugReporter, BugReporterBuilder, ReportSnapshot, ReportStats};
pub use error::{AuthError, ConfigError, Error, Result, StoreError, TransportError};
pub use logic::app_log::{AppLogCollector, LogEntry, Severity};
pub use logic::auth::{AuthState, DeviceAuthManager, StateStream};
pub use logic::network::{NetworkLogEntry, NetworkTrafficCollector};
pub use logic::shake::{ShakeDetector, ShakeEvent, ShakeSample};
pub use logic::{RingBuffer, SdkConfig};
