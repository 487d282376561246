//! tilt-rover - two-node tilt-aware rover control
//!
//! A sensor node measures obstacle distance and accelerometer tilt and streams
//! them as text records over TCP. A controller node turns each record into a
//! speed decision, drives both motors with software pulse modulation, and runs
//! an independent status indicator from an analog channel.
//!
//! ```text
//! sensor-node                          controller-node
//! ┌──────────────┐   TCP :12345   ┌──────────────────────────────┐
//! │ EchoRanger   │ ─────────────► │ control: parse → state →     │
//! │ Mpu6050      │   "Distance:   │   DrivePolicy → PulseActuator│
//! │ SensorLoop   │    ... degrees"│ indicator: MCP3008 → GPIO 18 │
//! └──────────────┘                └──────────────────────────────┘
//! ```
//!
//! Hardware access goes through the [`crate::core::platform`] traits, implemented
//! for Linux in [`devices::linux`] and in memory in [`devices::mock`].

pub mod config;
pub mod control;
pub mod core;
pub mod devices;
pub mod error;
pub mod runtime;
pub mod sensors;
pub mod streaming;

// Re-export commonly used types
pub use config::RoverConfig;
pub use crate::core::types::{Direction, MotorCommand, MotorId, TelemetrySample};
pub use error::{Error, Result};
