//! Shake Detector
//!
//! Jerk-based detection over a noisy accelerometer stream:
//! 1. First sample after `start()` only sets the baseline
//! 2. Samples < `min_sample_interval_ms` after the retained one are dropped
//! 3. jerk = |current - retained| / g
//! 4. jerk > threshold and cooldown elapsed -> one shake event
//! 5. Every accepted sample becomes the retained one

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::types::{SensorListener, SensorSource, ShakeConfig, ShakeEvent, ShakeListener, ShakeSample};
use crate::constants::STANDARD_GRAVITY;
use crate::error::ConfigError;

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Default)]
struct DetectorState {
    running: bool,
    retained: Option<ShakeSample>,
    last_shake_ms: Option<u64>,
}

struct Inner {
    config: ShakeConfig,
    source: Arc<dyn SensorSource>,
    state: Mutex<DetectorState>,
    listener: RwLock<Option<Arc<dyn ShakeListener>>>,
    shakes_detected: AtomicU64,
}

// ============================================================================
// SHAKE DETECTOR
// ============================================================================

/// Cheap to clone; clones share state.
///
/// While started, the sensor source holds a clone of the detector. Call
/// [`ShakeDetector::stop`] on teardown to release it.
#[derive(Clone)]
pub struct ShakeDetector {
    inner: Arc<Inner>,
}

impl ShakeDetector {
    pub fn new(config: ShakeConfig, source: Arc<dyn SensorSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                source,
                state: Mutex::new(DetectorState::default()),
                listener: RwLock::new(None),
                shakes_detected: AtomicU64::new(0),
            }),
        })
    }

    /// Subscribe to the sensor. Returns whether a motion sensor is available.
    pub fn start(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.running {
                return true;
            }
            if !self.inner.source.is_available() {
                log::warn!("No motion sensor available, shake detection disabled");
                return false;
            }
            state.running = true;
            state.retained = None;
        }

        // Sources may deliver synchronously from subscribe, so no lock here
        if !self.inner.source.subscribe(Arc::new(self.clone())) {
            log::warn!("Motion sensor registration failed");
            self.inner.state.lock().running = false;
            return false;
        }

        log::debug!(
            "Shake detection started (threshold {:.2}G, cooldown {}ms)",
            self.inner.config.threshold_g,
            self.inner.config.cooldown_ms
        );
        true
    }

    pub fn stop(&self) {
        let was_running = {
            let mut state = self.inner.state.lock();
            let was_running = state.running;
            state.running = false;
            state.retained = None;
            was_running
        };

        if was_running {
            self.inner.source.unsubscribe();
            log::debug!("Shake detection stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    /// Register the shake callback target, replacing any previous one
    pub fn set_listener(&self, listener: Arc<dyn ShakeListener>) {
        *self.inner.listener.write() = Some(listener);
    }

    pub fn clear_listener(&self) {
        self.inner.listener.write().take();
    }

    pub fn shakes_detected(&self) -> u64 {
        self.inner.shakes_detected.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &ShakeConfig {
        &self.inner.config
    }

    /// Run one sample through the filter; returns the event if it fired
    fn process(&self, sample: ShakeSample) -> Option<ShakeEvent> {
        let config = &self.inner.config;
        let mut state = self.inner.state.lock();

        if !state.running {
            return None;
        }

        let Some(prev) = state.retained else {
            state.retained = Some(sample);
            return None;
        };

        let delta_ms = sample.timestamp_ms.saturating_sub(prev.timestamp_ms);
        if delta_ms < config.min_sample_interval_ms {
            return None;
        }

        let jerk = jerk_magnitude(&prev, &sample);
        state.retained = Some(sample);

        if jerk <= config.threshold_g {
            return None;
        }

        let cooled_down = state
            .last_shake_ms
            .map_or(true, |last| sample.timestamp_ms.saturating_sub(last) >= config.cooldown_ms);
        if !cooled_down {
            return None;
        }

        state.last_shake_ms = Some(sample.timestamp_ms);
        Some(ShakeEvent {
            magnitude_g: jerk,
            timestamp_ms: sample.timestamp_ms,
        })
    }
}

impl SensorListener for ShakeDetector {
    fn on_sample(&self, sample: ShakeSample) {
        let Some(event) = self.process(sample) else {
            return;
        };

        self.inner.shakes_detected.fetch_add(1, Ordering::Relaxed);
        log::info!("Shake detected ({:.2}G)", event.magnitude_g);

        let listener = self.inner.listener.read().clone();
        match listener {
            Some(listener) => listener.on_shake(event),
            None => log::debug!("Shake detected but no listener registered"),
        }
    }
}

/// Change in acceleration between two samples, in G
pub fn jerk_magnitude(prev: &ShakeSample, current: &ShakeSample) -> f32 {
    let dx = current.x - prev.x;
    let dy = current.y - prev.y;
    let dz = current.z - prev.z;
    (dx * dx + dy * dy + dz * dz).sqrt() / STANDARD_GRAVITY
}
