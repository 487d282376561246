//! Node runtimes: thread loops, shared state and lifecycle.
//!
//! ## Controller threads
//!
//! - **indicator** (~200 Hz sampling, 0.1 Hz decisions): ADC → status line
//! - **control** (per received record): socket → parse → decide → pulse drive
//!
//! The only data the two share is the shutdown signal. The control thread is
//! the sole writer and reader of [`SharedTelemetryState`]; its lock covers the
//! sample copy only, never the multi-millisecond actuation.
//!
//! ## Sensor loop
//!
//! Single thread: measure → format → send → sleep.

pub mod controller;
pub mod sensor;
pub mod shared;

pub use controller::{
    ControlLoop, ControllerHandles, ControllerParts, IndicatorLoop, accept_client, spawn_controller,
};
pub use sensor::{SensorLoop, resolve_controller_addr};
pub use shared::{SharedTelemetryState, ShutdownSignal};
