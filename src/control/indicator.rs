//! Status indicator driven by an analog channel.
//!
//! The channel is sampled every iteration, but the indicator is only
//! reconsidered once per `interval_secs` of monotonic time. Whatever the
//! reading is at that instant decides the state; dips between windows are
//! ignored.

use crate::core::platform::{AnalogSource, Clock, DigitalLines};
use crate::core::types::{AnalogReading, Level, LineId};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Indicator wiring and thresholds
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Status output line
    pub line: LineId,
    /// ADC channel (0-7)
    pub channel: u8,
    /// Readings at or below this turn the indicator on
    pub threshold: u16,
    /// Seconds between decisions
    pub interval_secs: u64,
    /// Milliseconds between samples
    pub sample_ms: u64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            line: 18,
            channel: 0,
            threshold: 400,
            interval_secs: 10,
            sample_ms: 5,
        }
    }
}

pub struct IndicatorMonitor<A: AnalogSource, L: DigitalLines, C: Clock> {
    adc: A,
    lines: L,
    clock: C,
    config: IndicatorConfig,
    last_action: Duration,
    on: bool,
    last_reading: Option<AnalogReading>,
}

impl<A: AnalogSource, L: DigitalLines, C: Clock> IndicatorMonitor<A, L, C> {
    /// The first decision window starts now
    pub fn new(adc: A, lines: L, clock: C, config: IndicatorConfig) -> Self {
        let last_action = clock.now();
        Self {
            adc,
            lines,
            clock,
            config,
            last_action,
            on: false,
            last_reading: None,
        }
    }

    /// Claim the status line as an output (off)
    pub fn setup(&mut self) -> Result<()> {
        self.lines.claim_output(self.config.line)?;
        log::info!(
            "Indicator on GPIO {} (ADC channel {}, on at <= {}, every {}s)",
            self.config.line,
            self.config.channel,
            self.config.threshold,
            self.config.interval_secs
        );
        Ok(())
    }

    /// Sample once; act if the interval has elapsed.
    ///
    /// Returns the new indicator state when a decision was made.
    pub fn tick(&mut self) -> Result<Option<bool>> {
        let reading = self.adc.analog_transfer(self.config.channel)?;
        self.last_reading = Some(reading);

        let now = self.clock.now();
        if now.saturating_sub(self.last_action) < Duration::from_secs(self.config.interval_secs) {
            return Ok(None);
        }

        let on = reading.value() <= self.config.threshold;
        self.lines.write_line(self.config.line, Level::from_bool(on))?;
        if on != self.on {
            log::info!(
                "Indicator {} (reading {})",
                if on { "on" } else { "off" },
                reading.value()
            );
        } else {
            log::debug!("Indicator stays {} (reading {})", on, reading.value());
        }
        self.on = on;
        self.last_action = now;
        Ok(Some(on))
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn last_reading(&self) -> Option<AnalogReading> {
        self.last_reading
    }

    /// Time between samples
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.config.sample_ms)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Turn the indicator off and unexport its line
    pub fn release(&mut self) -> Result<()> {
        self.lines.write_line(self.config.line, Level::Low)?;
        self.on = false;
        self.lines.unexport_line(self.config.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock::{ManualClock, MockAdc, MockLines};

    fn monitor(
        reading: u16,
    ) -> (
        IndicatorMonitor<MockAdc, MockLines, ManualClock>,
        MockAdc,
        MockLines,
        ManualClock,
    ) {
        let clock = ManualClock::new();
        let adc = MockAdc::new(reading);
        let lines = MockLines::new();
        let mut mon = IndicatorMonitor::new(
            adc.clone(),
            lines.clone(),
            clock.clone(),
            IndicatorConfig::default(),
        );
        mon.setup().unwrap();
        (mon, adc, lines, clock)
    }

    #[test]
    fn test_no_action_before_interval() {
        let (mut mon, _, lines, clock) = monitor(350);

        assert_eq!(mon.tick().unwrap(), None);
        clock.set(Duration::from_secs(5));
        assert_eq!(mon.tick().unwrap(), None);
        assert!(!mon.is_on());
        assert_eq!(lines.level(18), Level::Low);

        clock.set(Duration::from_secs(10));
        assert_eq!(mon.tick().unwrap(), Some(true));
        assert!(mon.is_on());
        assert_eq!(lines.level(18), Level::High);
    }

    #[test]
    fn test_turns_off_above_threshold() {
        let (mut mon, adc, lines, clock) = monitor(350);
        clock.set(Duration::from_secs(10));
        assert_eq!(mon.tick().unwrap(), Some(true));

        adc.set_steady(500);
        clock.set(Duration::from_secs(15));
        assert_eq!(mon.tick().unwrap(), None);
        assert!(mon.is_on());

        clock.set(Duration::from_secs(20));
        assert_eq!(mon.tick().unwrap(), Some(false));
        assert_eq!(lines.level(18), Level::Low);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (mut mon, _, _, clock) = monitor(400);
        clock.set(Duration::from_secs(10));
        assert_eq!(mon.tick().unwrap(), Some(true));
    }

    #[test]
    fn test_transient_dip_between_windows_is_ignored() {
        let (mut mon, adc, _, clock) = monitor(800);
        adc.push_readings(&[100]);
        clock.set(Duration::from_secs(3));
        assert_eq!(mon.tick().unwrap(), None);
        assert_eq!(mon.last_reading().map(|r| r.value()), Some(100));

        clock.set(Duration::from_secs(10));
        assert_eq!(mon.tick().unwrap(), Some(false));
    }

    #[test]
    fn test_samples_every_tick() {
        let (mut mon, adc, _, clock) = monitor(350);
        for _ in 0..10 {
            mon.tick().unwrap();
            clock.sleep(mon.sample_period());
        }
        assert_eq!(adc.transfers(), vec![0; 10]);
    }
}
