//! Network Traffic Collector
//!
//! Interception contract used by the host's HTTP layer:
//!
//! ```ignore
//! let token = collector.on_request_start("GET", url, headers, BodyRead::Empty);
//! match send().await {
//!     Ok(resp) => collector.on_request_complete(token, status, resp_headers, body),
//!     Err(e) => collector.on_request_failed(token, e.to_string()),
//! }
//! ```
//!
//! The entry is built and appended only once the call has finished.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;

use super::body::BodyCapture;
use super::redact::redact_headers;
use super::types::{generate_entry_id, header_value, BodyRead, Headers, NetworkLogEntry, RequestToken};
use crate::logic::buffer::{BufferStatus, RingBuffer};

pub struct NetworkTrafficCollector {
    buffer: RingBuffer<NetworkLogEntry>,
    capture: BodyCapture,
}

impl NetworkTrafficCollector {
    pub fn new(capacity: NonZeroUsize, body_cap_bytes: usize) -> Self {
        Self {
            buffer: RingBuffer::new(capacity),
            capture: BodyCapture::new(body_cap_bytes),
        }
    }

    // ========================================================================
    // INTERCEPTION
    // ========================================================================

    pub fn on_request_start(&self, method: &str, url: &str, headers: Headers, body: BodyRead<'_>) -> RequestToken {
        let request_body = self.capture.capture(header_value(&headers, "content-type"), body);

        RequestToken {
            id: generate_entry_id(),
            started: std::time::Instant::now(),
            timestamp: Utc::now(),
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            request_headers: headers,
            request_body,
        }
    }

    pub fn on_request_complete(&self, token: RequestToken, response_code: u16, headers: Headers, body: BodyRead<'_>) {
        let duration = elapsed_millis(&token);
        self.on_request_complete_with_duration(token, response_code, headers, body, duration);
    }

    /// Same as [`Self::on_request_complete`] for adapters that time calls themselves
    pub fn on_request_complete_with_duration(
        &self,
        token: RequestToken,
        response_code: u16,
        headers: Headers,
        body: BodyRead<'_>,
        duration_millis: u64,
    ) {
        let response_body = self.capture.capture(header_value(&headers, "content-type"), body);
        let success = (200..300).contains(&response_code);

        log::trace!("{} {} -> {} ({} ms)", token.method, token.url, response_code, duration_millis);

        self.buffer.append(NetworkLogEntry {
            id: token.id,
            timestamp: token.timestamp,
            method: token.method,
            url: token.url,
            request_headers: token.request_headers,
            request_body: token.request_body,
            response_code: Some(response_code),
            response_headers: headers,
            response_body,
            duration_millis,
            error_text: None,
            success,
        });
    }

    pub fn on_request_failed(&self, token: RequestToken, error_text: impl Into<String>) {
        let duration = elapsed_millis(&token);
        self.on_request_failed_with_duration(token, error_text, duration);
    }

    pub fn on_request_failed_with_duration(
        &self,
        token: RequestToken,
        error_text: impl Into<String>,
        duration_millis: u64,
    ) {
        let error_text = error_text.into();
        log::trace!("{} {} failed: {}", token.method, token.url, error_text);

        self.buffer.append(NetworkLogEntry {
            id: token.id,
            timestamp: token.timestamp,
            method: token.method,
            url: token.url,
            request_headers: token.request_headers,
            request_body: token.request_body,
            response_code: None,
            response_headers: Vec::new(),
            response_body: None,
            duration_millis,
            error_text: Some(error_text),
            success: false,
        });
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    pub fn snapshot(&self) -> Vec<NetworkLogEntry> {
        self.buffer.snapshot()
    }

    /// Entries that errored or returned a non-2xx status
    pub fn failed_only(&self) -> Vec<NetworkLogEntry> {
        self.snapshot().into_iter().filter(|e| !e.success).collect()
    }

    pub fn matching_url_pattern(&self, pattern: &Regex) -> Vec<NetworkLogEntry> {
        self.snapshot()
            .into_iter()
            .filter(|e| pattern.is_match(&e.url))
            .collect()
    }

    pub fn since(&self, window: Duration) -> Vec<NetworkLogEntry> {
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
            .map(format_entry)
            .collect::<Vec<_>>()
            .join("\n\n")
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

fn elapsed_millis(token: &RequestToken) -> u64 {
    u64::try_from(token.started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Human-readable rendering with sensitive headers masked
pub fn format_entry(entry: &NetworkLogEntry) -> String {
    let mut out = String::new();

    let outcome = match (entry.response_code, &entry.error_text) {
        (Some(code), _) => code.to_string(),
        (None, Some(error)) => format!("FAILED: {}", error),
        (None, None) => "PENDING".to_string(),
    };
    out.push_str(&format!(
        "[{}] {} {} {} -> {} ({} ms)",
        entry.id,
        entry.timestamp.format("%m-%d %H:%M:%S%.3f"),
        entry.method,
        entry.url,
        outcome,
        entry.duration_millis
    ));

    push_headers(&mut out, "Request headers", &entry.request_headers);
    push_body(&mut out, "Request body", entry.request_body.as_deref());
    push_headers(&mut out, "Response headers", &entry.response_headers);
    push_body(&mut out, "Response body", entry.response_body.as_deref());

    out
}

fn push_headers(out: &mut String, title: &str, headers: &Headers) {
    if headers.is_empty() {
        return;
    }
    out.push_str(&format!("\n{}:", title));
    for (name, value) in redact_headers(headers) {
        out.push_str(&format!("\n  {}: {}", name, value));
    }
}

fn push_body(out: &mut String, title: &str, body: Option<&str>) {
    if let Some(body) = body {
        out.push_str(&format!("\n{}:\n{}", title, body));
    }
}
