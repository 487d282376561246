//! State shared between threads

use crate::core::types::TelemetrySample;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Most recently accepted telemetry sample.
///
/// Distance and tilt are stored together under one lock, so a reader never
/// sees one field from a newer record than the other.
#[derive(Debug, Default)]
pub struct SharedTelemetryState {
    inner: Mutex<StateInner>,
}

#[derive(Debug, Default)]
struct StateInner {
    sample: TelemetrySample,
    updates: u64,
}

impl SharedTelemetryState {
    /// Starts at the zero sample
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored sample
    pub fn update(&self, sample: TelemetrySample) {
        let mut inner = self.inner.lock();
        inner.sample = sample;
        inner.updates += 1;
    }

    /// Copy of the stored sample
    pub fn snapshot(&self) -> TelemetrySample {
        self.inner.lock().sample
    }

    /// Number of samples accepted so far
    pub fn updates(&self) -> u64 {
        self.inner.lock().updates
    }
}

/// Cooperative stop flag checked once per loop iteration
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_starts_at_zero_sample() {
        let state = SharedTelemetryState::new();
        assert_eq!(state.snapshot(), TelemetrySample::default());
        assert_eq!(state.updates(), 0);
    }

    #[test]
    fn test_update_replaces_both_fields() {
        let state = SharedTelemetryState::new();
        state.update(TelemetrySample::new(12.0, -3.0));
        assert_eq!(state.snapshot(), TelemetrySample::new(12.0, -3.0));
        assert_eq!(state.updates(), 1);
    }

    #[test]
    fn test_no_torn_reads() {
        // Writer alternates between two samples whose fields always match
        let state = Arc::new(SharedTelemetryState::new());
        let writer_state = Arc::clone(&state);
        let writer = thread::spawn(move || {
            for i in 0..10_000 {
                let v = if i % 2 == 0 { 1.0 } else { 2.0 };
                writer_state.update(TelemetrySample::new(v, v));
            }
        });

        for _ in 0..10_000 {
            let s = state.snapshot();
            assert_eq!(s.distance_cm, s.tilt_deg);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_shutdown_signal_shared_between_clones() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_triggered());
        signal.trigger();
        assert!(other.is_triggered());
    }
}
