//! In-memory register bus

use crate::core::platform::RegisterBus;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// 256-register device image with a write log
#[derive(Clone)]
pub struct MockBus {
    inner: Arc<Mutex<BusInner>>,
}

struct BusInner {
    registers: [u8; 256],
    writes: Vec<(u8, u8)>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                registers: [0u8; 256],
                writes: Vec::new(),
            })),
        }
    }

    /// Store a big-endian i16 at `high`/`high + 1`
    pub fn set_i16_be(&self, high: u8, value: i16) {
        let [hi, lo] = value.to_be_bytes();
        let mut inner = self.inner.lock();
        inner.registers[high as usize] = hi;
        inner.registers[high.wrapping_add(1) as usize] = lo;
    }

    /// Register writes issued by the code under test
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.inner.lock().writes.clone()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for MockBus {
    fn read_register(&mut self, register: u8) -> Result<u8> {
        Ok(self.inner.lock().registers[register as usize])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.registers[register as usize] = value;
        inner.writes.push((register, value));
        Ok(())
    }
}
