//! Device-flow types: state machine, grant, credential and wire formats

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state")]
pub enum AuthState {
    NotAuthenticated,
    RequestingGrant,
    AwaitingUserAction {
        user_code: String,
        verification_uri: String,
    },
    Authenticated {
        username: Option<String>,
        email: Option<String>,
        avatar_url: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl AuthState {
    /// States where a sign-in attempt has stopped
    pub fn is_terminal(&self) -> bool {
        match self {
            AuthState::NotAuthenticated | AuthState::Authenticated { .. } | AuthState::Failed { .. } => true,
            AuthState::RequestingGrant | AuthState::AwaitingUserAction { .. } => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated { .. })
    }
}

// ============================================================================
// GRANT & CREDENTIAL
// ============================================================================

/// One authorization attempt. `device_code` never leaves the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCodeGrant {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub poll_interval_secs: u64,
    pub expires_at: DateTime<Utc>,
}

/// Identity returned by the provider; fields empty if the fetch failed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Persisted sign-in, replaced as a whole on every successful sign-in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    #[serde(flatten)]
    pub identity: Identity,
    pub saved_at: DateTime<Utc>,
}

impl StoredCredential {
    pub fn state(&self) -> AuthState {
        AuthState::Authenticated {
            username: self.identity.username.clone(),
            email: self.identity.email.clone(),
            avatar_url: self.identity.avatar_url.clone(),
        }
    }
}

/// Interpretation of one token-endpoint response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Authorized { access_token: String },
    Pending,
    SlowDown { interval_secs: Option<u64> },
    Expired,
    AccessDenied,
    Error { code: String, message: String },
}

// ============================================================================
// WIRE FORMATS
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResponse {
    pub login: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
