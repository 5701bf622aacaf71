//! Device Flow API Client
//!
//! The three provider calls of the device authorization flow:
//! grant request, token poll, identity fetch. No retry or state here; the
//! manager owns the loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transport::{HttpRequest, HttpTransport};
use super::types::{DeviceCodeGrant, DeviceCodeResponse, Identity, PollOutcome, TokenResponse, UserResponse};
use crate::constants::{self, DEVICE_CODE_GRANT_TYPE, DEVICE_FLOW_SCOPE, MIN_POLL_INTERVAL_SECS};
use crate::error::{AuthError, ConfigError};

/// Provider endpoints and client identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFlowConfig {
    pub client_id: String,
    pub device_code_url: String,
    pub token_url: String,
    pub user_url: String,
    pub scope: String,
}

impl Default for DeviceFlowConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            device_code_url: constants::DEFAULT_DEVICE_CODE_URL.to_string(),
            token_url: constants::DEFAULT_TOKEN_URL.to_string(),
            user_url: constants::DEFAULT_USER_URL.to_string(),
            scope: DEVICE_FLOW_SCOPE.to_string(),
        }
    }
}

impl DeviceFlowConfig {
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "client_id",
                hint: "set the OAuth app's client id (BUGSHAKE_CLIENT_ID); device flow must be enabled for the app",
            });
        }
        check_url("device_code_url", &self.device_code_url)?;
        check_url("token_url", &self.token_url)?;
        check_url("user_url", &self.user_url)?;
        Ok(())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            hint: "must be an http(s) URL",
        })
    }
}

pub struct DeviceFlowClient {
    config: DeviceFlowConfig,
    transport: Arc<dyn HttpTransport>,
}

impl DeviceFlowClient {
    pub fn new(config: DeviceFlowConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &DeviceFlowConfig {
        &self.config
    }

    /// Step 1: ask the provider for a device code / user code pair
    pub async fn request_grant(&self, now: DateTime<Utc>) -> Result<DeviceCodeGrant, AuthError> {
        let request = HttpRequest::post_form(
            &self.config.device_code_url,
            &[("client_id", self.config.client_id.as_str()), ("scope", self.config.scope.as_str())],
        );

        log::info!("Requesting device code from {}", self.config.device_code_url);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            log::error!("Device code request failed ({}): {}", response.status, response.body);
            return Err(if (400..500).contains(&response.status) {
                AuthError::InvalidClient(response.status)
            } else {
                AuthError::ServerError(response.status)
            });
        }

        // Some providers answer 200 with an error object
        let value: serde_json::Value =
            serde_json::from_str(&response.body).map_err(|e| AuthError::ParseError(e.to_string()))?;
        if let Some(code) = value.get("error").and_then(|e| e.as_str()) {
            let message = value
                .get("error_description")
                .and_then(|d| d.as_str())
                .unwrap_or(code)
                .to_string();
            return Err(AuthError::Provider {
                code: code.to_string(),
                message,
            });
        }

        let parsed: DeviceCodeResponse =
            serde_json::from_value(value).map_err(|e| AuthError::ParseError(e.to_string()))?;

        let expires_in = i64::try_from(parsed.expires_in).unwrap_or(i64::MAX);
        let expires_at = now
            .checked_add_signed(chrono::Duration::seconds(expires_in))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Ok(DeviceCodeGrant {
            device_code: parsed.device_code,
            user_code: parsed.user_code,
            verification_uri: parsed.verification_uri,
            poll_interval_secs: parsed.interval.unwrap_or(MIN_POLL_INTERVAL_SECS),
            expires_at,
        })
    }

    /// Step 2: one poll of the token endpoint
    pub async fn poll_token(&self, grant: &DeviceCodeGrant) -> Result<PollOutcome, AuthError> {
        let request = HttpRequest::post_form(
            &self.config.token_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("device_code", grant.device_code.as_str()),
                ("grant_type", DEVICE_CODE_GRANT_TYPE),
            ],
        );

        let response = self.transport.send(request).await?;

        match serde_json::from_str::<TokenResponse>(&response.body) {
            // A failed status only counts as an answer when it carries an OAuth error code
            Ok(parsed) if response.is_success() || parsed.error.is_some() => {
                Ok(interpret_token_response(parsed))
            }
            Ok(_) => Err(AuthError::ServerError(response.status)),
            Err(_) if !response.is_success() => Err(AuthError::ServerError(response.status)),
            Err(e) => Err(AuthError::ParseError(e.to_string())),
        }
    }

    /// Step 3: who did we just sign in as
    pub async fn fetch_identity(&self, access_token: &str) -> Result<Identity, AuthError> {
        let request =
            HttpRequest::get(&self.config.user_url).header("Authorization", format!("Bearer {}", access_token));

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::ServerError(response.status));
        }

        let user: UserResponse =
            serde_json::from_str(&response.body).map_err(|e| AuthError::ParseError(e.to_string()))?;

        Ok(Identity {
            username: Some(user.login),
            email: user.email,
            avatar_url: user.avatar_url,
        })
    }
}

fn interpret_token_response(response: TokenResponse) -> PollOutcome {
    if let Some(access_token) = response.access_token.filter(|t| !t.is_empty()) {
        return PollOutcome::Authorized { access_token };
    }

    match response.error.as_deref() {
        Some("authorization_pending") => PollOutcome::Pending,
        Some("slow_down") => PollOutcome::SlowDown {
            interval_secs: response.interval,
        },
        Some("expired_token") => PollOutcome::Expired,
        Some("access_denied") => PollOutcome::AccessDenied,
        Some(code) => PollOutcome::Error {
            code: code.to_string(),
            message: response.error_description.unwrap_or_else(|| code.to_string()),
        },
        None => PollOutcome::Error {
            code: "invalid_response".to_string(),
            message: "Token response had neither an access token nor an error".to_string(),
        },
    }
}
