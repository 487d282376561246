//! Hardware access traits.
//!
//! The control loop never touches device files directly. It issues logical
//! operations through these traits; [`crate::devices::linux`] maps them onto
//! sysfs, spidev and i2c-dev, and [`crate::devices::mock`] records them for tests.

use crate::core::types::{AnalogReading, Level, LineDirection, LineId};
use crate::error::Result;
use std::time::Duration;

/// Digital line access (export bookkeeping, direction, level)
pub trait DigitalLines: Send {
    /// Make a line available to user space
    fn export_line(&mut self, line: LineId) -> Result<()>;

    /// Release a line. Releasing a line that is not exported is not an error.
    fn unexport_line(&mut self, line: LineId) -> Result<()>;

    fn set_direction(&mut self, line: LineId, direction: LineDirection) -> Result<()>;

    fn write_line(&mut self, line: LineId, level: Level) -> Result<()>;

    fn read_line(&mut self, line: LineId) -> Result<Level>;

    /// Export a line and configure it as an output driven low
    fn claim_output(&mut self, line: LineId) -> Result<()> {
        self.export_line(line)?;
        self.set_direction(line, LineDirection::Out)?;
        self.write_line(line, Level::Low)
    }

    /// Export a line and configure it as an input
    fn claim_input(&mut self, line: LineId) -> Result<()> {
        self.export_line(line)?;
        self.set_direction(line, LineDirection::In)
    }
}

/// Analog-to-digital converter behind a synchronous serial bus
pub trait AnalogSource: Send {
    fn analog_transfer(&mut self, channel: u8) -> Result<AnalogReading>;
}

/// Register-addressed device on a two-wire bus.
///
/// An instance is an opened bus handle bound to one device address.
pub trait RegisterBus: Send {
    fn read_register(&mut self, register: u8) -> Result<u8>;

    fn write_register(&mut self, register: u8, value: u8) -> Result<()>;

    /// Read a big-endian signed 16-bit value from `high` and `high + 1`
    fn read_i16_be(&mut self, high: u8) -> Result<i16> {
        let hi = self.read_register(high)?;
        let lo = self.read_register(high.wrapping_add(1))?;
        Ok(i16::from_be_bytes([hi, lo]))
    }
}

/// Monotonic time source with sleeping.
///
/// Shared between threads, so methods take `&self`.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}
