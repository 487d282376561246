//! Software pulse-width drive for two H-bridge motor channels.
//!
//! Each call to [`PulseActuator::drive`] runs one full modulation period of
//! `steps` slots, `step_us` apart. With the defaults (100 × 50µs) the period
//! is 5ms, i.e. a 200 Hz drive frequency with 1 % duty resolution.
//!
//! ```text
//! duty 40:  A ‾‾‾‾‾‾‾‾|____________   B ______________________
//!           0        40          100
//! ```
//!
//! Forward drives A high / B low, Reverse drives A low / B high, Stop and the
//! inactive part of the period drive both low (coast).

use crate::core::platform::{Clock, DigitalLines};
use crate::core::types::{Direction, Level, LineId, MotorCommand, MotorId};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest accepted `steps` (0.01 % duty resolution)
pub const MAX_PULSE_STEPS: u32 = 10_000;
/// Largest accepted `step_us` (one second per slot)
pub const MAX_STEP_US: u64 = 1_000_000;

/// The two control inputs of one H-bridge channel
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct MotorLines {
    pub a: LineId,
    pub b: LineId,
}

/// Pulse timing and wiring
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PulseConfig {
    /// Slots per period (duty resolution)
    pub steps: u32,
    /// Hold time of each slot
    pub step_us: u64,
    pub left: MotorLines,
    pub right: MotorLines,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            steps: 100,
            step_us: 50,
            left: MotorLines { a: 5, b: 6 },
            right: MotorLines { a: 13, b: 19 },
        }
    }
}

impl PulseConfig {
    /// Length of one modulation period
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.step_us.saturating_mul(self.steps as u64))
    }

    pub fn frequency_hz(&self) -> f32 {
        1.0 / self.period().as_secs_f32()
    }

    pub fn lines_for(&self, motor: MotorId) -> MotorLines {
        match motor {
            MotorId::Left => self.left,
            MotorId::Right => self.right,
        }
    }
}

/// Active-slot levels for (A, B)
#[inline]
fn active_levels(direction: Direction) -> (Level, Level) {
    match direction {
        Direction::Forward => (Level::High, Level::Low),
        Direction::Reverse => (Level::Low, Level::High),
        Direction::Stop => (Level::Low, Level::Low),
    }
}

/// Blocking software pulse generator
pub struct PulseActuator<L: DigitalLines, C: Clock> {
    lines: L,
    clock: C,
    config: PulseConfig,
}

impl<L: DigitalLines, C: Clock> PulseActuator<L, C> {
    pub fn new(lines: L, clock: C, config: PulseConfig) -> Self {
        Self {
            lines,
            clock,
            config,
        }
    }

    /// Export all four control lines as outputs, driven low
    pub fn setup(&mut self) -> Result<()> {
        for motor in [MotorId::Left, MotorId::Right] {
            let MotorLines { a, b } = self.config.lines_for(motor);
            self.lines.claim_output(a)?;
            self.lines.claim_output(b)?;
        }
        log::info!(
            "Motor lines ready: left {:?}, right {:?} ({:.0} Hz, {} steps)",
            self.config.left,
            self.config.right,
            self.config.frequency_hz(),
            self.config.steps
        );
        Ok(())
    }

    /// Run one modulation period for `command`.
    ///
    /// Blocks for the whole period. A failed line write aborts the period
    /// and is returned; callers treat it as fatal.
    pub fn drive(&mut self, command: &MotorCommand) -> Result<()> {
        let MotorLines { a, b } = self.config.lines_for(command.motor);
        let (on_a, on_b) = active_levels(command.direction);
        let duty = command.duty_percent.min(100) as u32;
        // Scale percent onto the configured slot count
        let active_steps = (duty as u64 * self.config.steps as u64 / 100) as u32;
        let step = Duration::from_micros(self.config.step_us);

        for i in 0..self.config.steps {
            let (level_a, level_b) = if i < active_steps {
                (on_a, on_b)
            } else {
                (Level::Low, Level::Low)
            };
            self.lines.write_line(a, level_a)?;
            self.lines.write_line(b, level_b)?;
            self.clock.sleep(step);
        }
        Ok(())
    }

    /// Drive both motors, left then right
    pub fn drive_pair(&mut self, commands: &(MotorCommand, MotorCommand)) -> Result<()> {
        self.drive(&commands.0)?;
        self.drive(&commands.1)
    }

    fn all_lines(&self) -> [LineId; 4] {
        let MotorLines { a: la, b: lb } = self.config.left;
        let MotorLines { a: ra, b: rb } = self.config.right;
        [la, lb, ra, rb]
    }

    /// Drive every control line low once.
    ///
    /// Keeps going past a failed line; the first error is returned.
    pub fn stop_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for line in self.all_lines() {
            if let Err(e) = self.lines.write_line(line, Level::Low) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Stop and unexport every control line, even after a failure
    pub fn release(&mut self) -> Result<()> {
        let mut first_error = self.stop_all().err();
        for line in self.all_lines() {
            if let Err(e) = self.lines.unexport_line(line) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => {
                log::info!("Motor lines released");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock::{ManualClock, MockLines};

    fn actuator() -> (PulseActuator<MockLines, ManualClock>, MockLines, ManualClock) {
        let clock = ManualClock::new();
        let lines = MockLines::with_clock(clock.clone());
        let mut act = PulseActuator::new(lines.clone(), clock.clone(), PulseConfig::default());
        act.setup().unwrap();
        lines.clear_events();
        (act, lines, clock)
    }

    #[test]
    fn test_default_period_is_200hz() {
        let config = PulseConfig::default();
        assert_eq!(config.period(), Duration::from_millis(5));
        assert!((config.frequency_hz() - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_period_saturates_on_extreme_timing() {
        let config = PulseConfig {
            steps: u32::MAX,
            step_us: u64::MAX,
            ..PulseConfig::default()
        };
        assert_eq!(config.period(), Duration::from_micros(u64::MAX));
    }

    #[test]
    fn test_zero_duty_never_raises_a_line() {
        let (mut act, lines, _) = actuator();
        act.drive(&MotorCommand::new(MotorId::Left, Direction::Forward, 0))
            .unwrap();
        assert!(!lines.ever_high(5));
        assert!(!lines.ever_high(6));
        assert_eq!(lines.writes_to(5).len(), 100);
    }

    #[test]
    fn test_full_duty_holds_a_high() {
        let (mut act, lines, _) = actuator();
        act.drive(&MotorCommand::new(MotorId::Left, Direction::Forward, 100))
            .unwrap();
        let a = lines.writes_to(5);
        assert_eq!(a.len(), 100);
        assert!(a.iter().all(|l| l.is_high()));
        assert!(!lines.ever_high(6));
    }

    #[test]
    fn test_partial_duty_active_steps() {
        let (mut act, lines, _) = actuator();
        act.drive(&MotorCommand::new(MotorId::Right, Direction::Forward, 40))
            .unwrap();
        let a = lines.writes_to(13);
        assert_eq!(a.iter().filter(|l| l.is_high()).count(), 40);
        assert!(a[..40].iter().all(|l| l.is_high()));
        assert!(a[40..].iter().all(|l| !l.is_high()));
        // Left channel untouched
        assert!(lines.writes_to(5).is_empty());
    }

    #[test]
    fn test_reverse_drives_b() {
        let (mut act, lines, _) = actuator();
        act.drive(&MotorCommand::new(MotorId::Left, Direction::Reverse, 75))
            .unwrap();
        assert!(!lines.ever_high(5));
        assert_eq!(
            lines.writes_to(6).iter().filter(|l| l.is_high()).count(),
            75
        );
    }

    #[test]
    fn test_drive_blocks_for_one_period() {
        let (mut act, _, clock) = actuator();
        let start = clock.peek();
        act.drive(&MotorCommand::new(MotorId::Left, Direction::Forward, 65))
            .unwrap();
        assert_eq!(clock.peek() - start, Duration::from_millis(5));
    }

    #[test]
    fn test_write_failure_propagates() {
        let (mut act, lines, _) = actuator();
        lines.fail_line(19);
        let err = act
            .drive(&MotorCommand::new(MotorId::Right, Direction::Forward, 50))
            .unwrap_err();
        assert!(err.is_hardware());
    }

    #[test]
    fn test_release_continues_past_failed_line() {
        let (mut act, lines, _) = actuator();
        lines.fail_line(5);
        assert!(act.release().unwrap_err().is_hardware());
        for line in [5, 6, 13, 19] {
            assert!(!lines.is_exported(line));
        }
        assert_eq!(lines.writes_to(19), vec![Level::Low]);
    }

    #[test]
    fn test_release_unexports() {
        let (mut act, lines, _) = actuator();
        act.release().unwrap();
        for line in [5, 6, 13, 19] {
            assert!(!lines.is_exported(line));
            assert_eq!(lines.level(line), Level::Low);
        }
    }
}
