//! Ultrasonic echo ranging (HC-SR04 style trigger/echo pair).
//!
//! ```text
//! TRIG  __|‾‾‾‾‾‾‾‾‾‾|_______________________
//!          >= 10us
//! ECHO  _________________|‾‾‾‾‾‾‾‾‾‾‾‾‾‾|_____
//!                        <- round trip ->
//! ```
//!
//! Distance is the echo width in microseconds divided by 58 (the round trip
//! of sound over one centimeter). Both edge waits are busy polls bounded by
//! `echo_timeout_us`; a disconnected or stuck echo line reports
//! [`Error::RangingTimeout`] instead of hanging the loop.

use crate::core::platform::{Clock, DigitalLines};
use crate::core::types::{Level, LineId};
use crate::error::{EchoPhase, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round-trip microseconds per centimeter of distance
pub const US_PER_CM: f32 = 58.0;

/// Echo ranging parameters
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RangingConfig {
    pub trigger_line: LineId,
    pub echo_line: LineId,
    /// Low time before the trigger pulse
    pub settle_us: u64,
    /// Width of the trigger pulse
    pub trigger_pulse_us: u64,
    /// Upper bound on each edge wait
    pub echo_timeout_us: u64,
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            trigger_line: 23,
            echo_line: 24,
            settle_us: 2,
            trigger_pulse_us: 10,
            // ~5m round trip; the HC-SR04 gives up after ~38ms itself
            echo_timeout_us: 30_000,
        }
    }
}

/// Convert an echo pulse width into centimeters
#[inline]
pub fn echo_to_cm(width: Duration) -> f32 {
    width.as_micros() as f32 / US_PER_CM
}

/// Trigger/echo distance sensor
pub struct EchoRanger<L: DigitalLines, C: Clock> {
    lines: L,
    clock: C,
    config: RangingConfig,
}

impl<L: DigitalLines, C: Clock> EchoRanger<L, C> {
    pub fn new(lines: L, clock: C, config: RangingConfig) -> Self {
        Self {
            lines,
            clock,
            config,
        }
    }

    /// Claim the trigger as output (driven low) and the echo as input
    pub fn setup(&mut self) -> Result<()> {
        self.lines.claim_output(self.config.trigger_line)?;
        self.lines.claim_input(self.config.echo_line)?;
        log::info!(
            "Ranger ready (trigger GPIO {}, echo GPIO {})",
            self.config.trigger_line,
            self.config.echo_line
        );
        Ok(())
    }

    /// Fire one trigger pulse and time the echo.
    ///
    /// Blocks for the round trip (up to two echo timeouts).
    pub fn measure_distance(&mut self) -> Result<f32> {
        let trig = self.config.trigger_line;

        self.lines.write_line(trig, Level::Low)?;
        self.clock
            .sleep(Duration::from_micros(self.config.settle_us));
        self.lines.write_line(trig, Level::High)?;
        self.clock
            .sleep(Duration::from_micros(self.config.trigger_pulse_us));
        self.lines.write_line(trig, Level::Low)?;

        let armed = self.clock.now();
        self.wait_for_echo(Level::High, armed, EchoPhase::EchoStart)?;
        let start = self.clock.now();
        self.wait_for_echo(Level::Low, start, EchoPhase::EchoEnd)?;
        let end = self.clock.now();

        let width = end.saturating_sub(start);
        let distance = echo_to_cm(width);
        log::trace!("Echo width {}us -> {:.2} cm", width.as_micros(), distance);
        Ok(distance)
    }

    fn wait_for_echo(&mut self, level: Level, since: Duration, phase: EchoPhase) -> Result<()> {
        let timeout = Duration::from_micros(self.config.echo_timeout_us);
        loop {
            if self.lines.read_line(self.config.echo_line)? == level {
                return Ok(());
            }
            let waited = self.clock.now().saturating_sub(since);
            if waited > timeout {
                return Err(Error::RangingTimeout {
                    phase,
                    waited_us: waited.as_micros() as u64,
                });
            }
        }
    }

    /// Release both lines
    pub fn release(&mut self) -> Result<()> {
        let trigger = self.lines.unexport_line(self.config.trigger_line);
        let echo = self.lines.unexport_line(self.config.echo_line);
        trigger.and(echo)
    }
}
