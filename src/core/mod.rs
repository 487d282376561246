//! Core abstractions shared by both nodes.
//!
//! - [`types`]: Telemetry samples, motor commands, line levels
//! - [`platform`]: Traits the hardware layer implements

pub mod platform;
pub mod types;
