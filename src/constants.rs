//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To point the SDK at another provider, only edit this file (or set the
//! matching environment variables).

// ============================================
// Device flow endpoints
// ============================================

/// Device-code endpoint
pub const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";

/// Token poll endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// Authenticated identity endpoint
pub const DEFAULT_USER_URL: &str = "https://api.github.com/user";

/// Permission scopes requested with every grant
pub const DEVICE_FLOW_SCOPE: &str = "repo gist read:user user:email";

/// `grant_type` sent to the token endpoint
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Floor applied to the provider's poll interval (seconds)
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;

/// Extra delay added after a `slow_down` response (seconds)
pub const SLOW_DOWN_EXTRA_SECS: u64 = 5;

/// HTTP timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// ============================================
// Collectors
// ============================================

/// App log ring buffer size
pub const DEFAULT_APP_LOG_CAPACITY: usize = 500;

/// Network log ring buffer size
pub const DEFAULT_NETWORK_LOG_CAPACITY: usize = 100;

/// Request/response body capture limit (64 KB)
pub const DEFAULT_BODY_CAP_BYTES: usize = 64 * 1024;

/// Number of system log lines attached to a report
pub const DEFAULT_SYSTEM_LOG_LINES: usize = 500;

/// Tag used when a log call has none
pub const DEFAULT_LOG_TAG: &str = "App";

/// Replaces sensitive header values when formatting
pub const REDACTION_MARKER: &str = "██ REDACTED ██";

/// Header names containing any of these (case-insensitive) are redacted
pub const SENSITIVE_HEADER_KEYWORDS: &[&str] = &["authorization", "cookie", "token", "api-key", "apikey"];

// ============================================
// Shake detection
// ============================================

/// Standard gravity (m/s²)
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Jerk magnitude that counts as a shake (G)
pub const DEFAULT_SHAKE_THRESHOLD_G: f32 = 2.7;

/// Minimum time between two shakes (ms)
pub const DEFAULT_SHAKE_COOLDOWN_MS: u64 = 1000;

/// Samples closer than this to the previous one are ignored (ms)
pub const MIN_SAMPLE_INTERVAL_MS: u64 = 50;

/// SDK version
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// SDK name
pub const SDK_NAME: &str = "Bugshake";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get the OAuth client id from environment (empty when unset)
pub fn get_client_id() -> String {
    std::env::var("BUGSHAKE_CLIENT_ID").unwrap_or_default()
}

/// Get device-code endpoint from environment or use default
pub fn get_device_code_url() -> String {
    std::env::var("BUGSHAKE_DEVICE_CODE_URL")
        .unwrap_or_else(|_| DEFAULT_DEVICE_CODE_URL.to_string())
}

/// Get token endpoint from environment or use default
pub fn get_token_url() -> String {
    std::env::var("BUGSHAKE_TOKEN_URL")
        .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string())
}

/// Get identity endpoint from environment or use default
pub fn get_user_url() -> String {
    std::env::var("BUGSHAKE_USER_URL")
        .unwrap_or_else(|_| DEFAULT_USER_URL.to_string())
}

/// Get HTTP timeout from environment or use default
pub fn get_http_timeout() -> u64 {
    std::env::var("BUGSHAKE_HTTP_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
}

/// Get shake threshold from environment or use default
pub fn get_shake_threshold() -> f32 {
    std::env::var("BUGSHAKE_SHAKE_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SHAKE_THRESHOLD_G)
}

/// Get shake cooldown from environment or use default
pub fn get_shake_cooldown_ms() -> u64 {
    std::env::var("BUGSHAKE_SHAKE_COOLDOWN_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SHAKE_COOLDOWN_MS)
}
