//! Linux device access for the Raspberry Pi nodes.
//!
//! All device paths live here; the control loop only sees the
//! [`crate::core::platform`] traits.

mod clock;
mod i2c;
mod spi_adc;
mod sysfs_gpio;

pub use clock::SystemClock;
pub use i2c::I2cDevice;
pub use spi_adc::{Mcp3008, SpiSettings};
pub use sysfs_gpio::SysfsGpio;
