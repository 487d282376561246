//! Sensor node measurements: echo ranging and accelerometer tilt.

pub mod ranging;
pub mod tilt;

pub use ranging::{EchoRanger, RangingConfig};
pub use tilt::{Acceleration, Mpu6050, tilt_angle};
