//! Push-driven sensor source
//!
//! For hosts whose sensor callbacks are plain function calls: the adapter
//! forwards each reading through [`ManualSensorSource::push`].

use std::sync::Arc;

use parking_lot::RwLock;

use super::types::{SensorListener, SensorSource, ShakeSample};

pub struct ManualSensorSource {
    available: bool,
    listener: RwLock<Option<Arc<dyn SensorListener>>>,
}

impl ManualSensorSource {
    pub fn new() -> Self {
        Self {
            available: true,
            listener: RwLock::new(None),
        }
    }

    /// A device without a motion sensor
    pub fn unavailable() -> Self {
        Self {
            available: false,
            listener: RwLock::new(None),
        }
    }

    /// Deliver one reading; dropped when nobody is subscribed
    pub fn push(&self, sample: ShakeSample) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_sample(sample);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.listener.read().is_some()
    }
}

impl Default for ManualSensorSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for ManualSensorSource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn subscribe(&self, listener: Arc<dyn SensorListener>) -> bool {
        if !self.available {
            return false;
        }
        *self.listener.write() = Some(listener);
        true
    }

    fn unsubscribe(&self) {
        self.listener.write().take();
    }
}
