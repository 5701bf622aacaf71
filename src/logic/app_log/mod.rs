//! App Log Module
//!
//! - `types.rs` - LogEntry / Severity
//! - `collector.rs` - ring-buffered collector with read-side filters
//! - `bridge.rs` - `log` facade integration

pub mod bridge;
pub mod collector;
pub mod types;

pub use bridge::{install, CaptureLogger};
pub use collector::AppLogCollector;
pub use types::{LogEntry, Severity};
