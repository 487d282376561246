//! Virtual clock for deterministic timing tests

use crate::core::platform::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Manually driven clock.
///
/// `sleep` advances virtual time instantly. With `auto_advance` set, every
/// `now()` call also moves time forward by that step, which lets busy-wait
/// loops make progress without a real time source.
#[derive(Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ClockInner>>,
}

#[derive(Default)]
struct ClockInner {
    now: Duration,
    auto_advance: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock that advances by `step` on every `now()` call
    pub fn with_auto_advance(step: Duration) -> Self {
        let clock = Self::new();
        clock.inner.lock().auto_advance = step;
        clock
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        self.inner.lock().now += by;
    }

    /// Jump to an absolute time (never moves backwards)
    pub fn set(&self, at: Duration) {
        let mut inner = self.inner.lock();
        if at > inner.now {
            inner.now = at;
        }
    }

    /// Current time without triggering auto-advance
    pub fn peek(&self) -> Duration {
        self.inner.lock().now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let mut inner = self.inner.lock();
        let step = inner.auto_advance;
        inner.now += step;
        inner.now
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
