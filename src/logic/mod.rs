//! Logic Module - Collectors, Detectors & Auth
//!
//! ## Architecture
//! - `buffer` - bounded FIFO shared by every collector
//! - `app_log/` - in-process log capture
//! - `network/` - HTTP exchange capture
//! - `shake/` - accelerometer shake detection
//! - `auth/` - device-flow sign-in
//! - `system_log` - device log tail
//! - `config` - SDK configuration

pub mod app_log;
pub mod auth;
pub mod buffer;
pub mod config;
pub mod network;
pub mod shake;
pub mod system_log;

pub use buffer::{BufferStatus, RingBuffer};
pub use config::SdkConfig;
