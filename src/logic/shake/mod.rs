//! Shake Detection Module
//!
//! Turns accelerometer samples into "user shook the device" events that
//! start the bug-report flow.

pub mod detector;
pub mod source;
pub mod types;

pub use detector::{jerk_magnitude, ShakeDetector};
pub use source::ManualSensorSource;
pub use types::{SensorListener, SensorSource, ShakeConfig, ShakeEvent, ShakeListener, ShakeSample};
