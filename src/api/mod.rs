//! API Module
//!
//! Host-facing surface of the SDK.
//!
//! Structure:
//! - reporter.rs: `BugReporter` context object and report snapshots
//!
//! Usage:
//! - `BugReporter::builder(config).build()?` at startup
//! - `reporter.snapshot_report()` when the user files a report

pub mod reporter;

pub use reporter::{BugReporter, BugReporterBuilder, ReportSnapshot, ReportStats};
