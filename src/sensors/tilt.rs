//! MPU-6050 accelerometer tilt.
//!
//! Only the accelerometer is used. The three axis registers are big-endian
//! signed 16-bit values at the default ±2g range (16384 LSB/g).

use crate::core::platform::RegisterBus;
use crate::error::Result;

/// Default I2C address (AD0 low)
pub const MPU6050_ADDRESS: u16 = 0x68;
/// Power management register; writing 0 clears SLEEP
const PWR_MGMT_1: u8 = 0x6B;
pub const ACCEL_XOUT_H: u8 = 0x3B;
pub const ACCEL_YOUT_H: u8 = 0x3D;
pub const ACCEL_ZOUT_H: u8 = 0x3F;
/// LSB per g at ±2g full scale
pub const ACCEL_LSB_PER_G: f32 = 16384.0;

/// Acceleration in g
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Tilt about the Y projection in degrees: `atan2(y, sqrt(x² + z²))`.
///
/// Independent of the sign of Z, so an upside-down mount reads the same.
pub fn tilt_angle(accel: Acceleration) -> f32 {
    let Acceleration { x, y, z } = accel;
    y.atan2((x * x + z * z).sqrt()).to_degrees()
}

pub struct Mpu6050<B: RegisterBus> {
    bus: B,
}

impl<B: RegisterBus> Mpu6050<B> {
    /// Wake the device. Fails if the bus rejects the write.
    pub fn new(mut bus: B) -> Result<Self> {
        bus.write_register(PWR_MGMT_1, 0x00)?;
        log::info!("MPU-6050 awake");
        Ok(Self { bus })
    }

    pub fn read_acceleration(&mut self) -> Result<Acceleration> {
        let x = self.bus.read_i16_be(ACCEL_XOUT_H)?;
        let y = self.bus.read_i16_be(ACCEL_YOUT_H)?;
        let z = self.bus.read_i16_be(ACCEL_ZOUT_H)?;
        Ok(Acceleration {
            x: x as f32 / ACCEL_LSB_PER_G,
            y: y as f32 / ACCEL_LSB_PER_G,
            z: z as f32 / ACCEL_LSB_PER_G,
        })
    }

    pub fn measure_tilt(&mut self) -> Result<f32> {
        let accel = self.read_acceleration()?;
        let angle = tilt_angle(accel);
        log::trace!(
            "accel=({:.3}, {:.3}, {:.3})g tilt={:.2}°",
            accel.x,
            accel.y,
            accel.z,
            angle
        );
        Ok(angle)
    }
}
