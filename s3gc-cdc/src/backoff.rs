//! Exponential reconnect backoff, 100 ms doubling to a 30 s cap.

use std::time::Duration;

use s3gc_core::constants::{CDC_BACKOFF_CAP_MS, CDC_BACKOFF_INITIAL_MS};

pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            current: Duration::from_millis(CDC_BACKOFF_INITIAL_MS),
        }
    }

    /// The delay to sleep now; doubles for next time.
    pub fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(Duration::from_millis(CDC_BACKOFF_CAP_MS));
        delay
    }

    /// Back to the initial delay after a healthy stretch.
    pub fn reset(&mut self) {
        self.current = Duration::from_millis(CDC_BACKOFF_INITIAL_MS);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
