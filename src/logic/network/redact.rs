//! Display-time header redaction
//!
//! Stored entries keep the raw values; only formatted output is masked.

use crate::constants::{REDACTION_MARKER, SENSITIVE_HEADER_KEYWORDS};

use super::types::Headers;

pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_HEADER_KEYWORDS.iter().any(|kw| name.contains(kw))
}

/// Copy of `headers` with sensitive values replaced by the marker
pub fn redact_headers(headers: &Headers) -> Headers {
    headers
        .iter()
        .map(|(name, value)| {
            if is_sensitive_header(name) {
                (name.clone(), REDACTION_MARKER.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect()
}
