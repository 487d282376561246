//! Scripted analog source

use crate::core::platform::AnalogSource;
use crate::core::types::AnalogReading;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Analog source returning queued readings, then a steady value
#[derive(Clone)]
pub struct MockAdc {
    inner: Arc<Mutex<AdcInner>>,
}

struct AdcInner {
    queued: VecDeque<u16>,
    steady: u16,
    fail: bool,
    transfers: Vec<u8>,
}

impl MockAdc {
    /// Source that always reads `steady`
    pub fn new(steady: u16) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AdcInner {
                queued: VecDeque::new(),
                steady,
                fail: false,
                transfers: Vec::new(),
            })),
        }
    }

    /// Queue readings returned before falling back to the steady value
    pub fn push_readings(&self, readings: &[u16]) {
        self.inner.lock().queued.extend(readings.iter().copied());
    }

    pub fn set_steady(&self, value: u16) {
        self.inner.lock().steady = value;
    }

    /// Make every following transfer fail
    pub fn fail_transfers(&self) {
        self.inner.lock().fail = true;
    }

    /// Channels that were sampled, in order
    pub fn transfers(&self) -> Vec<u8> {
        self.inner.lock().transfers.clone()
    }
}

impl AnalogSource for MockAdc {
    fn analog_transfer(&mut self, channel: u8) -> Result<AnalogReading> {
        let mut inner = self.inner.lock();
        if inner.fail {
            return Err(Error::Analog {
                channel,
                source: std::io::Error::other("mock transfer failure"),
            });
        }
        inner.transfers.push(channel);
        let raw = inner.queued.pop_front().unwrap_or(inner.steady);
        Ok(AnalogReading::new(raw))
    }
}
