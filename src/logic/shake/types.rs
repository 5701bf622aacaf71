//! Shake detection types and platform seams

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SHAKE_COOLDOWN_MS, DEFAULT_SHAKE_THRESHOLD_G, MIN_SAMPLE_INTERVAL_MS};
use crate::error::ConfigError;

/// One linear-acceleration reading (m/s²) with a monotonic timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub timestamp_ms: u64,
}

impl ShakeSample {
    pub fn new(x: f32, y: f32, z: f32, timestamp_ms: u64) -> Self {
        Self { x, y, z, timestamp_ms }
    }
}

/// Emitted once per confirmed shake
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShakeEvent {
    pub magnitude_g: f32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShakeConfig {
    /// Jerk magnitude (G) that must be exceeded
    pub threshold_g: f32,
    /// Minimum time between two shakes
    pub cooldown_ms: u64,
    /// Samples closer than this to the retained one are dropped
    pub min_sample_interval_ms: u64,
}

impl Default for ShakeConfig {
    fn default() -> Self {
        Self {
            threshold_g: DEFAULT_SHAKE_THRESHOLD_G,
            cooldown_ms: DEFAULT_SHAKE_COOLDOWN_MS,
            min_sample_interval_ms: MIN_SAMPLE_INTERVAL_MS,
        }
    }
}

impl ShakeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold_g.is_finite() || self.threshold_g <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "shake.threshold_g",
                value: self.threshold_g.to_string(),
                hint: "threshold must be a positive number of G (default 2.7)",
            });
        }
        Ok(())
    }
}

/// Receives samples from the platform sensor thread
pub trait SensorListener: Send + Sync {
    fn on_sample(&self, sample: ShakeSample);
}

/// Platform accelerometer adapter
pub trait SensorSource: Send + Sync {
    fn is_available(&self) -> bool;

    /// Start delivering samples to `listener`. Returns false if the sensor
    /// could not be registered.
    fn subscribe(&self, listener: Arc<dyn SensorListener>) -> bool;

    /// Stop delivering samples and release the listener
    fn unsubscribe(&self);
}

/// Shake callback target.
///
/// May be invoked on the sensor thread; implementations must not assume a
/// UI thread.
pub trait ShakeListener: Send + Sync {
    fn on_shake(&self, event: ShakeEvent);
}

impl<F> ShakeListener for F
where
    F: Fn(ShakeEvent) + Send + Sync,
{
    fn on_shake(&self, event: ShakeEvent) {
        self(event)
    }
}
