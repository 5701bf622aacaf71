//! Auth Module - Device Authorization Flow
//!
//! Signs the reporter in to the issue tracker without a browser redirect:
//! the user enters a short code on another device while the SDK polls.
//!
//! ## Architecture
//! - `client` - the three provider calls (grant, poll, identity)
//! - `manager` - state machine, poll loop, persistence, cancellation
//! - `transport` - pluggable HTTP seam, reqwest by default
//! - `storage` - secret stores (memory, encrypted file)
//! - `clock` - injectable time source

pub mod client;
pub mod clock;
pub mod manager;
pub mod storage;
pub mod transport;
pub mod types;

pub use client::{DeviceFlowClient, DeviceFlowConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{DeviceAuthManager, StateStream, CREDENTIAL_KEY};
pub use storage::{EncryptedFileStore, MemorySecretStore, SecretStore};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{AuthState, DeviceCodeGrant, Identity, PollOutcome, StoredCredential};
