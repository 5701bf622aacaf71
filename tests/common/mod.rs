//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bugshake::logic::auth::{
    AuthState, Clock, DeviceFlowConfig, HttpRequest, HttpResponse, HttpTransport, ManualClock, MemorySecretStore,
    SecretStore, StateStream,
};
use bugshake::{StoreError, TransportError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub const DEVICE_CODE_URL: &str = "http://auth.test/login/device/code";
pub const TOKEN_URL: &str = "http://auth.test/login/oauth/access_token";
pub const USER_URL: &str = "http://api.auth.test/user";

pub type Reply = Result<HttpResponse, TransportError>;

pub fn config() -> DeviceFlowConfig {
    DeviceFlowConfig {
        device_code_url: DEVICE_CODE_URL.to_string(),
        token_url: TOKEN_URL.to_string(),
        user_url: USER_URL.to_string(),
        ..DeviceFlowConfig::with_client_id("Iv1.integration")
    }
}

pub fn ok(body: &str) -> Reply {
    Ok(HttpResponse::new(200, body))
}

pub fn status(code: u16, body: &str) -> Reply {
    Ok(HttpResponse::new(code, body))
}

pub fn network_error() -> Reply {
    Err(TransportError::Network("connection reset by peer".to_string()))
}

pub fn grant(user_code: &str, device_code: &str, interval: u64, expires_in: u64) -> Reply {
    ok(&format!(
        concat!(
            r#"{{"device_code":"{}","user_code":"{}","verification_uri":"https://auth.test/device","#,
            r#""expires_in":{},"interval":{}}}"#,
        ),
        device_code, user_code, expires_in, interval
    ))
}

pub fn pending() -> Reply {
    ok(r#"{"error":"authorization_pending"}"#)
}

pub fn token(value: &str) -> Reply {
    ok(&format!(r#"{{"access_token":"{}","token_type":"bearer","scope":"repo"}}"#, value))
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Replies per URL, in order. The last reply of a route repeats forever.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, url: &str, replies: Vec<Reply>) {
        self.routes.lock().insert(url.to_string(), replies.into());
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests.lock().iter().filter(|r| r.url == url).cloned().collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests.lock().push(request);

        let mut routes = self.routes.lock();
        let Some(queue) = routes.get_mut(&url) else {
            return Ok(HttpResponse::new(404, "{}"));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Ok(HttpResponse::new(404, "{}")))
        } else {
            queue.front().cloned().unwrap_or_else(|| Ok(HttpResponse::new(404, "{}")))
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Memory store that remembers every write
#[derive(Default)]
pub struct RecordingStore {
    inner: MemorySecretStore,
    pub puts: Mutex<Vec<(String, String)>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().len()
    }
}

impl SecretStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.puts.lock().push((key.to_string(), value.to_string()));
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

// ============================================================================
// CLOCK
// ============================================================================

/// Virtual clock whose sleeps only finish when the test releases them
pub struct GatedClock {
    inner: ManualClock,
    gate: Semaphore,
}

impl GatedClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: ManualClock::new(Utc::now()),
            gate: Semaphore::new(0),
        })
    }

    /// Let `n` pending or future sleeps complete
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.sleeps()
    }
}

#[async_trait]
impl Clock for GatedClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.now()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        self.inner.sleep(duration).await;
    }
}

// ============================================================================
// STATE HELPERS
// ============================================================================

/// Next state, failing the test after 5 seconds
pub async fn next_state(stream: &mut StateStream) -> AuthState {
    match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
        Ok(Some(state)) => state,
        Ok(None) => panic!("state stream closed"),
        Err(_) => panic!("timed out waiting for a state transition (latest: {:?})", stream.latest()),
    }
}

/// The snapshot plus every transition up to the next terminal state
pub async fn collect_flow(stream: &mut StateStream) -> Vec<AuthState> {
    let mut states = vec![next_state(stream).await];
    loop {
        let state = next_state(stream).await;
        let terminal = state.is_terminal();
        states.push(state);
        if terminal {
            return states;
        }
    }
}

/// Wait until a state matching `pred` shows up
pub async fn wait_for(stream: &mut StateStream, pred: impl Fn(&AuthState) -> bool) -> AuthState {
    loop {
        let state = next_state(stream).await;
        if pred(&state) {
            return state;
        }
    }
}
