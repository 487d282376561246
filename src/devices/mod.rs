//! Platform implementations.
//!
//! - [`linux`]: sysfs GPIO, spidev ADC, i2c-dev register bus, system clock
//! - [`mock`]: In-memory recording devices for hardware-free testing

pub mod linux;
pub mod mock;
