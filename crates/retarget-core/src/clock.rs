//! Time source used for the approach timer and bootstrap delays

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time in seconds plus a way to wait
pub trait Clock: Send + Sync {
    /// Seconds since an arbitrary fixed origin
    fn now(&self) -> f64;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually driven clock; clones share the same time
///
/// `sleep` returns immediately after advancing the shared time, so code
/// that waits on a `ManualClock` runs instantly in tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
    sleeps: Arc<Mutex<u32>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            sleeps: Arc::new(Mutex::new(0)),
        }
    }

    pub fn advance(&self, seconds: f64) {
        *self.now.lock() += seconds;
    }

    pub fn set(&self, seconds: f64) {
        *self.now.lock() = seconds;
    }

    /// Number of `sleep` calls so far
    pub fn sleep_count(&self) -> u32 {
        *self.sleeps.lock()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        *self.sleeps.lock() += 1;
        self.advance(duration.as_secs_f64());
    }
}
