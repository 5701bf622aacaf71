//! Device Auth Manager
//!
//! Owns the sign-in state machine:
//!
//! ```text
//! NotAuthenticated --sign_in--> RequestingGrant --grant--> AwaitingUserAction --token--> Authenticated
//!        ^                            |                         |   |                      |
//!        |                            +--error--> Failed <------+   +--expired--> NotAuthenticated
//!        +-------------------------------------- sign_out ---------------------------------+
//! ```
//!
//! Every sign-in runs as one background task tagged with a generation
//! number. `sign_out` and newer sign-ins bump the generation; a task whose
//! generation is stale can no longer write state or credentials.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::client::{DeviceFlowClient, DeviceFlowConfig};
use super::clock::{Clock, SystemClock};
use super::storage::SecretStore;
use super::transport::HttpTransport;
use super::types::{AuthState, DeviceCodeGrant, Identity, PollOutcome, StoredCredential};
use crate::constants::{MIN_POLL_INTERVAL_SECS, SLOW_DOWN_EXTRA_SECS};
use crate::error::{AuthError, ConfigError};

/// Secret-store key holding the serialized [`StoredCredential`]
pub const CREDENTIAL_KEY: &str = "auth.credential";

/// Transitions buffered per observer before it counts as lagging
const STATE_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// STATE
// ============================================================================

struct Inner {
    client: DeviceFlowClient,
    store: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<AuthState>>,
    events: broadcast::Sender<AuthState>,
    generation: AtomicU64,
    credential: RwLock<Option<StoredCredential>>,
    /// Serializes secret-store writes; never held together with `state`
    persist: Mutex<()>,
    /// Running sign-in task and the generation it belongs to
    task: Mutex<Option<(u64, JoinHandle<()>)>>,
}

/// How the poll loop ended
enum PollEnd {
    Token(String),
    Expired,
    Failed(String),
    Superseded,
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Publish `next` unless `generation` has been superseded.
    ///
    /// The state lock is held while broadcasting so observers see
    /// transitions in the order they were written.
    fn transition(&self, generation: u64, next: AuthState) -> bool {
        let mut state = self.state.write();
        if !self.is_current(generation) {
            return false;
        }
        log::debug!("Auth state: {:?} -> {:?}", *state, next);
        *state = next.clone();
        let _ = self.events.send(next);
        true
    }

    /// Persist the credential and enter `Authenticated`.
    ///
    /// The store write holds `persist` only, never `state`. A write whose
    /// generation went stale in between is rolled back before `persist` is
    /// released.
    fn commit_authenticated(&self, generation: u64, credential: StoredCredential) -> bool {
        let _persist = self.persist.lock();
        if !self.is_current(generation) {
            return false;
        }

        let persisted = match serde_json::to_string(&credential) {
            Ok(blob) => match self.store.put(CREDENTIAL_KEY, &blob) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Failed to persist credential: {}", e);
                    false
                }
            },
            Err(e) => {
                log::error!("Failed to serialize credential: {}", e);
                false
            }
        };

        let mut state = self.state.write();
        if !self.is_current(generation) {
            drop(state);
            if persisted {
                if let Err(e) = self.store.remove(CREDENTIAL_KEY) {
                    log::error!("Failed to roll back superseded credential: {}", e);
                }
            }
            return false;
        }

        let next = credential.state();
        *self.credential.write() = Some(credential);
        *state = next.clone();
        let _ = self.events.send(next);
        true
    }

    /// Remember the task for `generation`. Whichever of the running and the
    /// new task is older gets aborted.
    fn track_task(&self, generation: u64, handle: JoinHandle<()>) {
        let mut task = self.task.lock();
        match task.as_ref() {
            Some((running, _)) if *running > generation => handle.abort(),
            _ => {
                if let Some((_, previous)) = task.replace((generation, handle)) {
                    previous.abort();
                }
            }
        }
    }

    /// Abort the running task if it belongs to a generation before `generation`
    fn cancel_tasks_before(&self, generation: u64) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|(running, _)| *running < generation) {
            if let Some((_, handle)) = task.take() {
                handle.abort();
            }
        }
    }

    async fn run_sign_in(self: Arc<Self>, generation: u64) {
        let grant = match self.client.request_grant(self.clock.now()).await {
            Ok(grant) => grant,
            Err(e) => {
                log::error!("Device code request failed: {}", e);
                self.transition(generation, AuthState::Failed { reason: e.to_string() });
                return;
            }
        };

        log::info!(
            "Enter code {} at {} (expires {})",
            grant.user_code,
            grant.verification_uri,
            grant.expires_at
        );

        let awaiting = AuthState::AwaitingUserAction {
            user_code: grant.user_code.clone(),
            verification_uri: grant.verification_uri.clone(),
        };
        if !self.transition(generation, awaiting) {
            return;
        }

        let access_token = match self.poll_for_token(generation, &grant).await {
            PollEnd::Token(token) => token,
            PollEnd::Expired => {
                log::info!("Device code expired before authorization");
                self.transition(generation, AuthState::NotAuthenticated);
                return;
            }
            PollEnd::Failed(reason) => {
                log::warn!("Sign-in failed: {}", reason);
                self.transition(generation, AuthState::Failed { reason });
                return;
            }
            PollEnd::Superseded => return,
        };

        if !self.is_current(generation) {
            return;
        }

        let identity = match self.client.fetch_identity(&access_token).await {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("Identity fetch failed, continuing without profile: {}", e);
                Identity::default()
            }
        };

        let credential = StoredCredential {
            access_token,
            identity,
            saved_at: self.clock.now(),
        };
        if self.commit_authenticated(generation, credential) {
            log::info!("Signed in");
        }
    }

    async fn poll_for_token(&self, generation: u64, grant: &DeviceCodeGrant) -> PollEnd {
        let mut interval_secs = grant.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS);
        let mut attempt: u32 = 0;

        loop {
            if !self.is_current(generation) {
                return PollEnd::Superseded;
            }
            if self.clock.now() >= grant.expires_at {
                return PollEnd::Expired;
            }

            self.clock.sleep(Duration::from_secs(interval_secs)).await;

            if !self.is_current(generation) {
                return PollEnd::Superseded;
            }
            if self.clock.now() >= grant.expires_at {
                return PollEnd::Expired;
            }

            attempt += 1;
            match self.client.poll_token(grant).await {
                Ok(PollOutcome::Authorized { access_token }) => {
                    log::debug!("Token issued after {} polls", attempt);
                    return PollEnd::Token(access_token);
                }
                Ok(PollOutcome::Pending) => {
                    log::trace!("Authorization pending (poll {})", attempt);
                }
                Ok(PollOutcome::SlowDown { interval_secs: suggested }) => {
                    interval_secs = interval_secs
                        .saturating_add(SLOW_DOWN_EXTRA_SECS)
                        .max(suggested.unwrap_or(0));
                    log::debug!("Provider asked to slow down, polling every {}s", interval_secs);
                }
                Ok(PollOutcome::Expired) => return PollEnd::Expired,
                Ok(PollOutcome::AccessDenied) => return PollEnd::Failed(AuthError::AccessDenied.to_string()),
                Ok(PollOutcome::Error { code, message }) => {
                    return PollEnd::Failed(AuthError::Provider { code, message }.to_string());
                }
                // Transient: keep polling until the grant expires
                Err(e) => {
                    log::debug!("Poll {} failed, retrying: {}", attempt, e);
                }
            }
        }
    }
}

// ============================================================================
// DEVICE AUTH MANAGER
// ============================================================================

/// Cheap to clone; clones share the same state machine.
#[derive(Clone)]
pub struct DeviceAuthManager {
    inner: Arc<Inner>,
}

impl DeviceAuthManager {
    pub fn new(
        config: DeviceFlowConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn SecretStore>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, transport, store, Arc::new(SystemClock))
    }

    /// Construct with an explicit time source
    pub fn with_clock(
        config: DeviceFlowConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn SecretStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let client = DeviceFlowClient::new(config, transport)?;
        let credential = load_credential(store.as_ref());
        let initial = credential
            .as_ref()
            .map(StoredCredential::state)
            .unwrap_or(AuthState::NotAuthenticated);

        log::info!("Auth manager ready: {}", if initial.is_authenticated() { "signed in" } else { "signed out" });

        let (events, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                store,
                clock,
                state: Arc::new(RwLock::new(initial)),
                events,
                generation: AtomicU64::new(0),
                credential: RwLock::new(credential),
                persist: Mutex::new(()),
                task: Mutex::new(None),
            }),
        })
    }

    /// Start a device-flow sign-in in the background.
    ///
    /// Supersedes any attempt already running. No-op when already signed in.
    /// Must be called from within a tokio runtime.
    pub fn sign_in(&self) -> Result<(), AuthError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| AuthError::NoRuntime)?;

        let generation = {
            let mut state = self.inner.state.write();
            if state.is_authenticated() {
                log::debug!("sign_in ignored: already authenticated");
                return Ok(());
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = AuthState::RequestingGrant;
            let _ = self.inner.events.send(AuthState::RequestingGrant);
            generation
        };

        let handle = runtime.spawn(Arc::clone(&self.inner).run_sign_in(generation));
        self.inner.track_task(generation, handle);
        Ok(())
    }

    /// Clear the credential and cancel any running sign-in
    pub fn sign_out(&self) {
        let generation = {
            let mut state = self.inner.state.write();
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *self.inner.credential.write() = None;
            *state = AuthState::NotAuthenticated;
            let _ = self.inner.events.send(AuthState::NotAuthenticated);
            generation
        };

        {
            let _persist = self.inner.persist.lock();
            if let Err(e) = self.inner.store.remove(CREDENTIAL_KEY) {
                log::error!("Failed to clear stored credential: {}", e);
            }
        }

        self.inner.cancel_tasks_before(generation);
        log::info!("Signed out");
    }

    /// Sign out, then start a fresh sign-in. Used after the provider
    /// rejects the stored token.
    pub fn reauthenticate(&self) -> Result<(), AuthError> {
        self.sign_out();
        self.sign_in()
    }

    pub fn current_state(&self) -> AuthState {
        self.inner.state.read().clone()
    }

    /// Current state first, then every later transition in order
    pub fn observe_state(&self) -> StateStream {
        // Holding the read lock blocks writers, so nothing slips between
        // the snapshot and the subscription
        let state = self.inner.state.read();
        StateStream {
            pending: Some(state.clone()),
            receiver: self.inner.events.subscribe(),
            latest: Arc::clone(&self.inner.state),
        }
    }

    /// Start a sign-in and wait until it stops (signed in, failed, expired
    /// or cancelled)
    pub async fn sign_in_and_wait(&self) -> Result<AuthState, AuthError> {
        let mut stream = self.observe_state();
        if stream.latest().is_authenticated() {
            return Ok(stream.latest());
        }
        self.sign_in()?;

        // Snapshot taken before the sign-in started
        stream.next().await;
        while let Some(state) = stream.next().await {
            if state.is_terminal() {
                return Ok(state);
            }
        }
        Ok(self.current_state())
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.credential.read().as_ref().map(|c| c.access_token.clone())
    }

    pub fn credential(&self) -> Option<StoredCredential> {
        self.inner.credential.read().clone()
    }
}

fn load_credential(store: &dyn SecretStore) -> Option<StoredCredential> {
    let blob = match store.get(CREDENTIAL_KEY) {
        Ok(Some(blob)) => blob,
        Ok(None) => return None,
        Err(e) => {
            log::warn!("Could not read stored credential: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<StoredCredential>(&blob) {
        Ok(credential) if !credential.access_token.is_empty() => Some(credential),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Ignoring unreadable stored credential: {}", e);
            None
        }
    }
}

// ============================================================================
// STATE STREAM
// ============================================================================

pub struct StateStream {
    pending: Option<AuthState>,
    receiver: broadcast::Receiver<AuthState>,
    latest: Arc<RwLock<AuthState>>,
}

impl StateStream {
    /// Next state; `None` once the manager is gone
    pub async fn next(&mut self) -> Option<AuthState> {
        if let Some(state) = self.pending.take() {
            return Some(state);
        }

        match self.receiver.recv().await {
            Ok(state) => Some(state),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Auth state observer lagged, skipped {} transitions", skipped);
                self.receiver = self.receiver.resubscribe();
                Some(self.latest())
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Latest state, without waiting
    pub fn latest(&self) -> AuthState {
        self.latest.read().clone()
    }
}
