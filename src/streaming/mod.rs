//! Telemetry link between the sensor and controller nodes

pub mod framing;
pub mod link;
pub mod wire;

pub use framing::RecordAssembler;
pub use link::{TelemetryReceiver, TelemetrySender};
pub use wire::{ParseError, format_record, parse_record};
