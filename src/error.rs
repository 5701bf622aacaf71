//! Error handling
//!
//! One enum per concern, plus a crate-level [`Error`] that wraps them for
//! callers that don't care which layer failed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Setup-time configuration problems. Raised before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{field}` is required: {hint}")]
    Missing {
        field: &'static str,
        hint: &'static str,
    },

    #[error("`{field}` has invalid value `{value}`: {hint}")]
    Invalid {
        field: &'static str,
        value: String,
        hint: &'static str,
    },
}

/// HTTP transport failures (no response was obtained)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidRequest(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Secret store failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Device-flow sign-in failures
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not reach the authorization server: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Grant request rejected with a 4xx status
    #[error("Invalid client configuration (HTTP {0}): check the OAuth client id")]
    InvalidClient(u16),

    #[error("Could not start sign-in (HTTP {0})")]
    ServerError(u16),

    #[error("Unexpected response from the authorization server: {0}")]
    ParseError(String),

    #[error("Authorization was denied by the user")]
    AccessDenied,

    #[error("{message}")]
    Provider { code: String, message: String },

    #[error("No async runtime available to run the sign-in task")]
    NoRuntime,
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
