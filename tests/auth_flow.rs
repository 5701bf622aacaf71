//! Device-flow sign-in, driven end to end through scripted HTTP replies

mod common;

use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use bugshake::logic::auth::{
    AuthState, DeviceAuthManager, DeviceFlowConfig, EncryptedFileStore, ManualClock, MemorySecretStore, SecretStore,
    StoredCredential, CREDENTIAL_KEY,
};
use bugshake::{ConfigError, StoreError};
use common::*;
use parking_lot::Mutex;

fn manager(
    transport: &Arc<ScriptedTransport>,
    store: &Arc<RecordingStore>,
    clock: Arc<dyn bugshake::logic::auth::Clock>,
) -> DeviceAuthManager {
    DeviceAuthManager::with_clock(config(), transport.clone(), store.clone(), clock).unwrap()
}

fn stored_credential(store: &RecordingStore) -> Option<StoredCredential> {
    store
        .get(CREDENTIAL_KEY)
        .unwrap()
        .map(|blob| serde_json::from_str(&blob).unwrap())
}

fn failed(reason: &str) -> AuthState {
    AuthState::Failed {
        reason: reason.to_string(),
    }
}

#[tokio::test]
async fn rejected_client_fails_without_showing_a_code() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![status(401, r#"{"message":"Bad credentials"}"#)]);
    let store = RecordingStore::new();
    let manager = manager(&transport, &store, Arc::new(ManualClock::default()));

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert_eq!(flow[0], AuthState::NotAuthenticated);
    assert_eq!(flow[1], AuthState::RequestingGrant);
    assert_eq!(flow.len(), 3);
    match &flow[2] {
        AuthState::Failed { reason } => assert!(reason.contains("Invalid client configuration"), "{}", reason),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(transport.requests_to(TOKEN_URL).is_empty());
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn server_error_on_grant_is_a_generic_failure() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![status(503, "unavailable")]);
    let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert_eq!(flow.last(), Some(&failed("Could not start sign-in (HTTP 503)")));
}

#[tokio::test]
async fn pending_polls_then_token_signs_in_once() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![pending(), pending(), token("t1")]);
    transport.on(
        USER_URL,
        vec![ok(r#"{"login":"octocat","email":"octo@example.com","avatar_url":null}"#)],
    );
    let store = RecordingStore::new();
    let clock = Arc::new(ManualClock::default());
    let manager = manager(&transport, &store, clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert_eq!(
        flow.last(),
        Some(&AuthState::Authenticated {
            username: Some("octocat".to_string()),
            email: Some("octo@example.com".to_string()),
            avatar_url: None,
        })
    );
    assert_eq!(store.put_count(), 1);
    assert!(store.puts.lock()[0].1.contains("t1"));
    assert_eq!(manager.access_token().as_deref(), Some("t1"));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 3]);

    let identity_request = &transport.requests_to(USER_URL)[0];
    assert!(identity_request
        .headers
        .iter()
        .any(|(name, value)| name == "Authorization" && value == "Bearer t1"));
}

#[tokio::test]
async fn slow_down_adds_five_seconds_for_good() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(
        TOKEN_URL,
        vec![ok(r#"{"error":"slow_down"}"#), pending(), token("t1")],
    );
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let clock = Arc::new(ManualClock::default());
    let manager = manager(&transport, &RecordingStore::new(), clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    collect_flow(&mut states).await;

    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_secs(5), Duration::from_secs(10), Duration::from_secs(10)]
    );
}

#[tokio::test]
async fn slow_down_honours_a_longer_provider_interval() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![ok(r#"{"error":"slow_down","interval":20}"#), token("t1")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let clock = Arc::new(ManualClock::default());
    let manager = manager(&transport, &RecordingStore::new(), clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    collect_flow(&mut states).await;

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5), Duration::from_secs(20)]);
}

#[tokio::test]
async fn slow_down_on_a_huge_interval_does_not_overflow() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", u64::MAX, 900)]);
    transport.on(TOKEN_URL, vec![ok(r#"{"error":"slow_down"}"#), token("t1")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let clock = Arc::new(ManualClock::default());
    let manager = manager(&transport, &RecordingStore::new(), clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert!(flow.last().is_some_and(AuthState::is_authenticated), "{:?}", flow);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(u64::MAX); 2]);
}

#[tokio::test]
async fn short_provider_interval_is_raised_to_five_seconds() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 1, 900)]);
    transport.on(TOKEN_URL, vec![token("t1")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let clock = Arc::new(ManualClock::default());
    let manager = manager(&transport, &RecordingStore::new(), clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    collect_flow(&mut states).await;

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
}

#[tokio::test]
async fn full_flow_with_failed_identity_fetch() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("ABCD-1234", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![pending(), pending(), pending(), token("gho_e2e")]);
    transport.on(USER_URL, vec![network_error()]);
    let store = RecordingStore::new();
    let manager = manager(&transport, &store, Arc::new(ManualClock::default()));

    let mut first = manager.observe_state();
    let mut second = manager.observe_state();
    manager.sign_in().unwrap();

    let expected = vec![
        AuthState::NotAuthenticated,
        AuthState::RequestingGrant,
        AuthState::AwaitingUserAction {
            user_code: "ABCD-1234".to_string(),
            verification_uri: "https://auth.test/device".to_string(),
        },
        AuthState::Authenticated {
            username: None,
            email: None,
            avatar_url: None,
        },
    ];
    assert_eq!(collect_flow(&mut first).await, expected);
    assert_eq!(collect_flow(&mut second).await, expected);

    assert_eq!(transport.requests_to(TOKEN_URL).len(), 4);
    let credential = stored_credential(&store).unwrap();
    assert_eq!(credential.access_token, "gho_e2e");
    assert_eq!(credential.identity.username, None);
}

#[tokio::test]
async fn expired_token_returns_to_signed_out() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![pending(), ok(r#"{"error":"expired_token"}"#)]);
    let store = RecordingStore::new();
    let manager = manager(&transport, &store, Arc::new(ManualClock::default()));

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert_eq!(flow.last(), Some(&AuthState::NotAuthenticated));
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn grant_lifetime_bounds_the_poll_loop() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 12)]);
    transport.on(TOKEN_URL, vec![pending()]);
    let clock = Arc::new(ManualClock::default());
    let manager = manager(&transport, &RecordingStore::new(), clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert_eq!(flow.last(), Some(&AuthState::NotAuthenticated));
    // Polls at t=5 and t=10; the wake-up at t=15 is past the deadline
    assert_eq!(transport.requests_to(TOKEN_URL).len(), 2);
    assert_eq!(clock.sleeps().len(), 3);
}

#[tokio::test]
async fn access_denied_fails_with_message() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![ok(r#"{"error":"access_denied"}"#)]);
    let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert_eq!(flow.last(), Some(&failed("Authorization was denied by the user")));
}

#[tokio::test]
async fn unknown_provider_error_uses_its_description() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(
        TOKEN_URL,
        vec![ok(r#"{"error":"incorrect_client_credentials","error_description":"The client_id is not valid."}"#)],
    );
    let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert_eq!(flow.last(), Some(&failed("The client_id is not valid.")));
}

#[tokio::test]
async fn transient_poll_errors_keep_polling() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(
        TOKEN_URL,
        vec![network_error(), status(502, "<html>bad gateway</html>"), pending(), token("t1")],
    );
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert!(flow.last().is_some_and(AuthState::is_authenticated));
    assert_eq!(transport.requests_to(TOKEN_URL).len(), 4);
}

#[tokio::test]
async fn json_bodied_server_errors_keep_polling() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(
        TOKEN_URL,
        vec![status(503, r#"{"message":"Service Unavailable"}"#), status(500, "{}"), pending(), token("t1")],
    );
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    let flow = collect_flow(&mut states).await;

    assert!(flow.last().is_some_and(AuthState::is_authenticated), "{:?}", flow);
    assert_eq!(transport.requests_to(TOKEN_URL).len(), 4);
}

/// Wait until the manager settles in a terminal state
async fn settle(manager: &DeviceAuthManager) -> AuthState {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let state = manager.current_state();
        if state.is_terminal() || tokio::time::Instant::now() >= deadline {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sign_ins_always_finish() {
    let runtime = tokio::runtime::Handle::current();

    for round in 0..200 {
        let transport = ScriptedTransport::new();
        transport.on(DEVICE_CODE_URL, vec![status(401, "{}")]);
        let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));
        let barrier = Arc::new(Barrier::new(2));

        let callers: Vec<_> = (0..2)
            .map(|_| {
                let (manager, barrier, runtime) = (manager.clone(), Arc::clone(&barrier), runtime.clone());
                thread::spawn(move || {
                    let _guard = runtime.enter();
                    barrier.wait();
                    manager.sign_in()
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap().unwrap();
        }

        let state = settle(&manager).await;
        assert!(state.is_terminal(), "round {} stuck in {:?}", round, state);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sign_in_racing_sign_out_always_finishes() {
    let runtime = tokio::runtime::Handle::current();

    for round in 0..200 {
        let transport = ScriptedTransport::new();
        transport.on(DEVICE_CODE_URL, vec![status(401, "{}")]);
        let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));
        let barrier = Arc::new(Barrier::new(2));

        let signing_in = {
            let (manager, barrier, runtime) = (manager.clone(), Arc::clone(&barrier), runtime.clone());
            thread::spawn(move || {
                let _guard = runtime.enter();
                barrier.wait();
                manager.sign_in()
            })
        };
        let signing_out = {
            let (manager, barrier) = (manager.clone(), Arc::clone(&barrier));
            thread::spawn(move || {
                barrier.wait();
                manager.sign_out();
            })
        };
        signing_in.join().unwrap().unwrap();
        signing_out.join().unwrap();

        let state = settle(&manager).await;
        assert!(state.is_terminal(), "round {} stuck in {:?}", round, state);
    }
}

#[tokio::test]
async fn sign_out_cancels_a_running_sign_in() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![token("t1")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let store = RecordingStore::new();
    let clock = GatedClock::new();
    let manager = manager(&transport, &store, clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    wait_for(&mut states, |s| matches!(s, AuthState::AwaitingUserAction { .. })).await;

    manager.sign_out();
    clock.release(10);

    assert_eq!(next_state(&mut states).await, AuthState::NotAuthenticated);
    let late = tokio::time::timeout(Duration::from_millis(200), states.next()).await;
    assert!(late.is_err(), "no transition may follow sign-out, got {:?}", late);

    assert_eq!(manager.current_state(), AuthState::NotAuthenticated);
    assert!(transport.requests_to(TOKEN_URL).is_empty());
    assert_eq!(store.put_count(), 0);
    assert_eq!(manager.access_token(), None);
}

/// Memory store whose writes wait until the test lets them through
struct HeldStore {
    inner: MemorySecretStore,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl SecretStore for HeldStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _ = self.entered.lock().send(());
        let _ = self.release.lock().recv_timeout(Duration::from_secs(5));
        self.inner.put(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sign_out_during_a_slow_credential_write_leaves_nothing_behind() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![token("t1")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let store = Arc::new(HeldStore {
        inner: MemorySecretStore::new(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let manager =
        DeviceAuthManager::with_clock(config(), transport.clone(), store.clone(), Arc::new(ManualClock::default()))
            .unwrap();

    manager.sign_in().unwrap();
    tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();

    // The write is in flight; state stays readable
    assert!(!manager.current_state().is_terminal());

    let signing_out = {
        let manager = manager.clone();
        thread::spawn(move || manager.sign_out())
    };
    assert_eq!(settle(&manager).await, AuthState::NotAuthenticated);
    release_tx.send(()).unwrap();
    signing_out.join().unwrap();

    assert_eq!(manager.current_state(), AuthState::NotAuthenticated);
    assert_eq!(manager.access_token(), None);
    assert_eq!(store.get(CREDENTIAL_KEY).unwrap(), None);
}

#[tokio::test]
async fn new_sign_in_supersedes_the_previous_one() {
    let transport = ScriptedTransport::new();
    transport.on(
        DEVICE_CODE_URL,
        vec![grant("AAAA-1111", "dc-first", 5, 900), grant("BBBB-2222", "dc-second", 5, 900)],
    );
    transport.on(TOKEN_URL, vec![token("t-second")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let store = RecordingStore::new();
    let clock = GatedClock::new();
    let manager = manager(&transport, &store, clock.clone());

    let mut states = manager.observe_state();
    manager.sign_in().unwrap();
    wait_for(&mut states, |s| matches!(s, AuthState::AwaitingUserAction { .. })).await;

    manager.sign_in().unwrap();
    let second = wait_for(&mut states, |s| matches!(s, AuthState::AwaitingUserAction { .. })).await;
    assert_eq!(
        second,
        AuthState::AwaitingUserAction {
            user_code: "BBBB-2222".to_string(),
            verification_uri: "https://auth.test/device".to_string(),
        }
    );

    clock.release(10);
    wait_for(&mut states, AuthState::is_terminal).await;

    assert!(manager.current_state().is_authenticated());
    assert_eq!(store.put_count(), 1);
    let polled: Vec<_> = transport
        .requests_to(TOKEN_URL)
        .iter()
        .map(|r| r.field("device_code").unwrap_or_default().to_string())
        .collect();
    assert_eq!(polled, vec!["dc-second".to_string()]);
}

#[tokio::test]
async fn reauthenticate_replaces_the_stored_credential() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![token("t-new")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let store = RecordingStore::new();
    store
        .put(
            CREDENTIAL_KEY,
            r#"{"access_token":"t-old","username":"octocat","saved_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
    let manager = manager(&transport, &store, Arc::new(ManualClock::default()));
    assert!(manager.current_state().is_authenticated());

    let mut states = manager.observe_state();
    manager.reauthenticate().unwrap();

    assert!(next_state(&mut states).await.is_authenticated());
    assert_eq!(next_state(&mut states).await, AuthState::NotAuthenticated);
    assert_eq!(next_state(&mut states).await, AuthState::RequestingGrant);
    wait_for(&mut states, AuthState::is_terminal).await;

    assert_eq!(manager.access_token().as_deref(), Some("t-new"));
    assert_eq!(stored_credential(&store).unwrap().access_token, "t-new");
}

#[tokio::test]
async fn sign_in_and_wait_returns_the_outcome() {
    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![pending(), token("t1")]);
    transport.on(USER_URL, vec![ok(r#"{"login":"octocat"}"#)]);
    let manager = manager(&transport, &RecordingStore::new(), Arc::new(ManualClock::default()));

    let outcome = tokio::time::timeout(Duration::from_secs(5), manager.sign_in_and_wait())
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_authenticated());
}

#[tokio::test]
async fn credential_survives_a_restart_in_the_encrypted_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.enc.json");

    let transport = ScriptedTransport::new();
    transport.on(DEVICE_CODE_URL, vec![grant("WDJB-MJHT", "dc-1", 5, 900)]);
    transport.on(TOKEN_URL, vec![token("gho_persisted")]);
    transport.on(
        USER_URL,
        vec![ok(r#"{"login":"octocat","email":null,"avatar_url":"https://avatars.test/1"}"#)],
    );

    {
        let store = Arc::new(EncryptedFileStore::open(&path, "device-secret").unwrap());
        let manager = DeviceAuthManager::with_clock(
            config(),
            transport.clone(),
            store,
            Arc::new(ManualClock::default()),
        )
        .unwrap();
        let outcome = manager.sign_in_and_wait().await.unwrap();
        assert!(outcome.is_authenticated());
    }

    let store = Arc::new(EncryptedFileStore::open(&path, "device-secret").unwrap());
    let restarted = DeviceAuthManager::new(config(), transport.clone(), store).unwrap();
    assert_eq!(
        restarted.current_state(),
        AuthState::Authenticated {
            username: Some("octocat".to_string()),
            email: None,
            avatar_url: Some("https://avatars.test/1".to_string()),
        }
    );
    assert_eq!(restarted.access_token().as_deref(), Some("gho_persisted"));
}

#[test]
fn blank_client_id_is_rejected_up_front() {
    let transport = ScriptedTransport::new();
    let result = DeviceAuthManager::new(
        DeviceFlowConfig {
            client_id: String::new(),
            ..config()
        },
        transport.clone(),
        RecordingStore::new(),
    );

    assert!(matches!(result, Err(ConfigError::Missing { field: "client_id", .. })));
    assert!(transport.requests_to(DEVICE_CODE_URL).is_empty());
}
