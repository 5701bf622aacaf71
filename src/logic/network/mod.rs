//! Network Capture Module
//!
//! - `types.rs` - NetworkLogEntry, RequestToken, BodyRead
//! - `body.rs` - size cap / binary placeholder policy
//! - `redact.rs` - sensitive header masking (format time only)
//! - `collector.rs` - interception contract + read-side filters
//! - `instrumented.rs` - reqwest client wrapper feeding the collector

pub mod body;
pub mod collector;
pub mod instrumented;
pub mod redact;
pub mod types;

pub use body::BodyCapture;
pub use collector::{format_entry, NetworkTrafficCollector};
pub use instrumented::{CapturedResponse, InstrumentedClient};
pub use redact::{is_sensitive_header, redact_headers};
pub use types::{header_value, BodyRead, Headers, NetworkLogEntry, RequestToken};
