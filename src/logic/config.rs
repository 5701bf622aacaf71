//! SDK Configuration
//!
//! One value holding everything the reporter needs at construction time.
//! Defaults come from `constants`; `from_env` applies the `BUGSHAKE_*`
//! overrides. Validation happens before any collector or network client
//! is built.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::auth::DeviceFlowConfig;
use super::shake::ShakeConfig;
use crate::constants::{self, DEVICE_FLOW_SCOPE};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// OAuth app client id (device flow must be enabled for the app)
    pub client_id: String,
    pub device_code_url: String,
    pub token_url: String,
    pub user_url: String,
    pub scope: String,
    pub http_timeout_secs: u64,
    pub app_log_capacity: usize,
    pub network_log_capacity: usize,
    pub body_cap_bytes: usize,
    pub system_log_lines: usize,
    pub shake: ShakeConfig,
    /// Where the encrypted credential file lives. `None` = platform data dir
    pub storage_dir: Option<PathBuf>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            device_code_url: constants::DEFAULT_DEVICE_CODE_URL.to_string(),
            token_url: constants::DEFAULT_TOKEN_URL.to_string(),
            user_url: constants::DEFAULT_USER_URL.to_string(),
            scope: DEVICE_FLOW_SCOPE.to_string(),
            http_timeout_secs: constants::DEFAULT_HTTP_TIMEOUT_SECS,
            app_log_capacity: constants::DEFAULT_APP_LOG_CAPACITY,
            network_log_capacity: constants::DEFAULT_NETWORK_LOG_CAPACITY,
            body_cap_bytes: constants::DEFAULT_BODY_CAP_BYTES,
            system_log_lines: constants::DEFAULT_SYSTEM_LOG_LINES,
            shake: ShakeConfig::default(),
            storage_dir: None,
        }
    }
}

impl SdkConfig {
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `BUGSHAKE_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self {
            client_id: constants::get_client_id(),
            device_code_url: constants::get_device_code_url(),
            token_url: constants::get_token_url(),
            user_url: constants::get_user_url(),
            http_timeout_secs: constants::get_http_timeout(),
            ..Self::default()
        };
        config.shake.threshold_g = constants::get_shake_threshold();
        config.shake.cooldown_ms = constants::get_shake_cooldown_ms();
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device_flow().validate()?;
        self.shake.validate()?;

        non_zero("app_log_capacity", self.app_log_capacity)?;
        non_zero("network_log_capacity", self.network_log_capacity)?;
        non_zero("http_timeout_secs", usize::try_from(self.http_timeout_secs).unwrap_or(usize::MAX))?;
        Ok(())
    }

    /// Provider settings for the auth manager
    pub fn device_flow(&self) -> DeviceFlowConfig {
        DeviceFlowConfig {
            client_id: self.client_id.clone(),
            device_code_url: self.device_code_url.clone(),
            token_url: self.token_url.clone(),
            user_url: self.user_url.clone(),
            scope: self.scope.clone(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn app_log_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        non_zero("app_log_capacity", self.app_log_capacity)
    }

    pub fn network_log_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        non_zero("network_log_capacity", self.network_log_capacity)
    }
}

fn non_zero(field: &'static str, value: usize) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or(ConfigError::Invalid {
        field,
        value: value.to_string(),
        hint: "must be greater than zero",
    })
}
