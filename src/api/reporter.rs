//! Bug Reporter - SDK entry point
//!
//! One explicit context object instead of process-wide singletons: the host
//! builds a [`BugReporter`] at startup and hands clones of its parts to
//! whatever needs them (logger bridge, HTTP client, sensor thread).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::constants::SDK_VERSION;
use crate::error::{AuthError, Error};
use crate::logic::app_log::{self, AppLogCollector, LogEntry, Severity};
use crate::logic::auth::{
    AuthState, Clock, DeviceAuthManager, EncryptedFileStore, HttpTransport, MemorySecretStore, ReqwestTransport,
    SecretStore, StateStream, SystemClock,
};
use crate::logic::buffer::BufferStatus;
use crate::logic::network::{redact_headers, InstrumentedClient, NetworkLogEntry, NetworkTrafficCollector};
use crate::logic::shake::{ManualSensorSource, SensorSource, ShakeDetector, ShakeListener};
use crate::logic::system_log::{StaticLogSource, SystemLogSource};
use crate::logic::SdkConfig;

// ============================================================================
// REPORT
// ============================================================================

/// Everything attached to one bug report, frozen at collection time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub report_id: String,
    pub collected_at: DateTime<Utc>,
    pub sdk_version: String,
    /// Signed-in username, if any
    pub reporter: Option<String>,
    pub app_logs: Vec<LogEntry>,
    /// Sensitive header values already masked
    pub network_logs: Vec<NetworkLogEntry>,
    pub system_logs: String,
    pub stats: ReportStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStats {
    pub app_logs: BufferStatus,
    pub network_logs: BufferStatus,
    pub shakes_detected: u64,
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct BugReporterBuilder {
    config: SdkConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    store: Option<Arc<dyn SecretStore>>,
    clock: Option<Arc<dyn Clock>>,
    sensor: Option<Arc<dyn SensorSource>>,
    system_log: Option<Arc<dyn SystemLogSource>>,
}

impl BugReporterBuilder {
    /// Transport for the sign-in calls (default: reqwest)
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where the credential is kept (default: in memory only)
    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use an encrypted file under `config.storage_dir` (or the platform
    /// data dir) keyed by `secret`
    pub fn encrypted_store(mut self, secret: &str) -> Result<Self, Error> {
        let store = match &self.config.storage_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                EncryptedFileStore::open(dir.join("credentials.enc.json"), secret)?
            }
            None => EncryptedFileStore::open_default(secret)?,
        };
        self.store = Some(Arc::new(store));
        Ok(self)
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Accelerometer adapter (default: none, shake detection unavailable)
    pub fn sensor(mut self, sensor: Arc<dyn SensorSource>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Device log reader (default: none, reports carry an empty system log)
    pub fn system_log(mut self, source: Arc<dyn SystemLogSource>) -> Self {
        self.system_log = Some(source);
        self
    }

    pub fn build(self) -> Result<BugReporter, Error> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.http_timeout())?),
        };
        let store: Arc<dyn SecretStore> = self.store.unwrap_or_else(|| {
            log::warn!("No secret store configured, credentials will not survive a restart");
            Arc::new(MemorySecretStore::new())
        });
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sensor = self.sensor.unwrap_or_else(|| Arc::new(ManualSensorSource::unavailable()));
        let system_log = self.system_log.unwrap_or_else(|| Arc::new(StaticLogSource::default()));

        let app_logs = Arc::new(AppLogCollector::new(config.app_log_capacity()?));
        let network = Arc::new(NetworkTrafficCollector::new(
            config.network_log_capacity()?,
            config.body_cap_bytes,
        ));
        let shake = ShakeDetector::new(config.shake, sensor)?;
        let auth = DeviceAuthManager::with_clock(config.device_flow(), transport, store, clock)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(crate::error::TransportError::from)?;

        log::info!(
            "Bug reporter ready (app logs: {}, network logs: {}, body cap: {} bytes)",
            config.app_log_capacity,
            config.network_log_capacity,
            config.body_cap_bytes
        );

        Ok(BugReporter {
            config,
            app_logs,
            network,
            shake,
            auth,
            system_log,
            http_client,
        })
    }
}

// ============================================================================
// REPORTER
// ============================================================================

#[derive(Clone)]
pub struct BugReporter {
    config: SdkConfig,
    app_logs: Arc<AppLogCollector>,
    network: Arc<NetworkTrafficCollector>,
    shake: ShakeDetector,
    auth: DeviceAuthManager,
    system_log: Arc<dyn SystemLogSource>,
    http_client: reqwest::Client,
}

impl BugReporter {
    pub fn builder(config: SdkConfig) -> BugReporterBuilder {
        BugReporterBuilder {
            config,
            transport: None,
            store: None,
            clock: None,
            sensor: None,
            system_log: None,
        }
    }

    /// Reporter with default collaborators
    pub fn new(config: SdkConfig) -> Result<Self, Error> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    // --- Collectors ---

    pub fn app_logs(&self) -> &Arc<AppLogCollector> {
        &self.app_logs
    }

    pub fn network(&self) -> &Arc<NetworkTrafficCollector> {
        &self.network
    }

    pub fn log(&self, severity: Severity, tag: &str, message: impl Into<String>) {
        self.app_logs.record(severity, Some(tag), message, None);
    }

    /// Route the host's `log::*!` output into the app log collector
    pub fn install_logger(&self, capture_level: LevelFilter) -> Result<(), log::SetLoggerError> {
        app_log::install(Arc::clone(&self.app_logs), capture_level)
    }

    /// HTTP client whose traffic is captured into the network collector
    pub fn instrumented_client(&self) -> InstrumentedClient {
        InstrumentedClient::new(self.http_client.clone(), Arc::clone(&self.network))
    }

    // --- Shake ---

    pub fn shake_detector(&self) -> &ShakeDetector {
        &self.shake
    }

    /// Listen for shakes. Returns false when no accelerometer is available.
    pub fn start_shake_detection(&self, listener: Arc<dyn ShakeListener>) -> bool {
        self.shake.set_listener(listener);
        self.shake.start()
    }

    pub fn stop_shake_detection(&self) {
        self.shake.stop();
    }

    // --- Auth ---

    pub fn auth(&self) -> &DeviceAuthManager {
        &self.auth
    }

    pub fn sign_in(&self) -> Result<(), AuthError> {
        self.auth.sign_in()
    }

    pub fn sign_out(&self) {
        self.auth.sign_out();
    }

    pub fn reauthenticate(&self) -> Result<(), AuthError> {
        self.auth.reauthenticate()
    }

    pub fn current_state(&self) -> AuthState {
        self.auth.current_state()
    }

    pub fn observe_state(&self) -> StateStream {
        self.auth.observe_state()
    }

    /// First step of the report flow. Returns true when already signed in;
    /// otherwise makes sure a sign-in is running and returns false.
    pub fn ensure_signed_in(&self) -> Result<bool, AuthError> {
        match self.auth.current_state() {
            AuthState::Authenticated { .. } => Ok(true),
            AuthState::RequestingGrant | AuthState::AwaitingUserAction { .. } => Ok(false),
            AuthState::NotAuthenticated | AuthState::Failed { .. } => {
                self.auth.sign_in()?;
                Ok(false)
            }
        }
    }

    // --- Report ---

    /// Copy every collector into a report. Collectors keep their contents.
    pub fn snapshot_report(&self) -> ReportSnapshot {
        let reporter = match self.auth.current_state() {
            AuthState::Authenticated { username, .. } => username,
            _ => None,
        };

        let network_logs = self
            .network
            .snapshot()
            .into_iter()
            .map(|mut entry| {
                entry.request_headers = redact_headers(&entry.request_headers);
                entry.response_headers = redact_headers(&entry.response_headers);
                entry
            })
            .collect();

        let snapshot = ReportSnapshot {
            report_id: uuid::Uuid::new_v4().to_string(),
            collected_at: Utc::now(),
            sdk_version: SDK_VERSION.to_string(),
            reporter,
            app_logs: self.app_logs.snapshot(),
            network_logs,
            system_logs: self.system_log.last_lines(self.config.system_log_lines),
            stats: ReportStats {
                app_logs: self.app_logs.status(),
                network_logs: self.network.status(),
                shakes_detected: self.shake.shakes_detected(),
            },
        };

        log::info!(
            "Report {} collected: {} app logs, {} requests",
            snapshot.report_id,
            snapshot.app_logs.len(),
            snapshot.network_logs.len()
        );
        snapshot
    }

    /// Plain-text rendering of the collectors, for issue bodies
    pub fn format_report_text(&self) -> String {
        format!(
            "## App logs\n{}\n\n## Network\n{}\n\n## System log\n{}",
            self.app_logs.format_all(),
            self.network.format_all(),
            self.system_log.last_lines(self.config.system_log_lines)
        )
    }
}
