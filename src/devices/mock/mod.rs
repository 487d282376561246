//! Mock devices for hardware-free testing.
//!
//! Every mock is a cheap `Clone` handle around shared state, so a test can
//! hand one clone to the code under test and inspect the other.

mod adc;
mod bus;
mod clock;
mod lines;

pub use adc::MockAdc;
pub use bus::MockBus;
pub use clock::ManualClock;
pub use lines::{LineEvent, MockLines};
