//! Network capture types

use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ordered header list (name, value), as sent on the wire
pub type Headers = Vec<(String, String)>;

/// Body as seen by the interception layer
#[derive(Debug, Clone, Copy)]
pub enum BodyRead<'a> {
    Empty,
    Bytes(&'a [u8]),
    /// Reading the body failed; carries the error message
    Failed(&'a str),
}

impl<'a> From<Option<&'a [u8]>> for BodyRead<'a> {
    fn from(body: Option<&'a [u8]>) -> Self {
        match body {
            Some(bytes) if !bytes.is_empty() => BodyRead::Bytes(bytes),
            _ => BodyRead::Empty,
        }
    }
}

/// A finished request. Never mutated after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub request_headers: Headers,
    pub request_body: Option<String>,
    pub response_code: Option<u16>,
    pub response_headers: Headers,
    pub response_body: Option<String>,
    pub duration_millis: u64,
    pub error_text: Option<String>,
    pub success: bool,
}

/// Handle returned by `on_request_start`; consumed when the request ends
#[derive(Debug)]
pub struct RequestToken {
    pub(crate) id: String,
    pub(crate) started: Instant,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) method: String,
    pub(crate) url: String,
    pub(crate) request_headers: Headers,
    pub(crate) request_body: Option<String>,
}

impl RequestToken {
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Short random id (8 alphanumerics)
pub(crate) fn generate_entry_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// Look up a header value by case-insensitive name
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
