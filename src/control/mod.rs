//! Controller-side decision and actuation

pub mod actuator;
pub mod indicator;
pub mod policy;

pub use actuator::{MotorLines, PulseActuator, PulseConfig};
pub use indicator::{IndicatorConfig, IndicatorMonitor};
pub use policy::DrivePolicy;
