//! Sensor node loop: measure, send, sleep.

use crate::core::platform::{Clock, DigitalLines, RegisterBus};
use crate::core::types::TelemetrySample;
use crate::error::{Error, Result};
use crate::runtime::shared::ShutdownSignal;
use crate::sensors::{EchoRanger, Mpu6050};
use crate::streaming::TelemetrySender;
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Periodic telemetry producer
pub struct SensorLoop<L: DigitalLines, B: RegisterBus, C: Clock, W: Write> {
    ranger: EchoRanger<L, C>,
    imu: Mpu6050<B>,
    sender: TelemetrySender<W>,
    clock: C,
    period: Duration,
    shutdown: ShutdownSignal,
    skipped: u64,
}

impl<L, B, C, W> SensorLoop<L, B, C, W>
where
    L: DigitalLines,
    B: RegisterBus,
    C: Clock,
    W: Write,
{
    /// `ranger` must already be set up
    pub fn new(
        ranger: EchoRanger<L, C>,
        imu: Mpu6050<B>,
        sender: TelemetrySender<W>,
        clock: C,
        period: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            ranger,
            imu,
            sender,
            clock,
            period,
            shutdown,
            skipped: 0,
        }
    }

    /// Take one distance and tilt reading.
    ///
    /// A ranging timeout skips the cycle and yields `None`.
    pub fn sample(&mut self) -> Result<Option<TelemetrySample>> {
        let distance_cm = match self.ranger.measure_distance() {
            Ok(d) => d,
            Err(e @ Error::RangingTimeout { .. }) => {
                self.skipped += 1;
                log::warn!("Skipping cycle: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let tilt_deg = self.imu.measure_tilt()?;
        Ok(Some(TelemetrySample::new(distance_cm, tilt_deg)))
    }

    /// Sample and send once; no sleep
    pub fn cycle(&mut self) -> Result<()> {
        if let Some(sample) = self.sample()? {
            log::debug!(
                "Distance: {:.2} cm, Tilt Angle: {:.2} degrees",
                sample.distance_cm,
                sample.tilt_deg
            );
            self.sender.send(&sample)?;
        }
        Ok(())
    }

    /// Run until shutdown or a fault, then release the ranging lines
    pub fn run(&mut self) -> Result<()> {
        let result = self.cycle_until_shutdown();
        log::info!(
            "Sensor loop stopped: {} records sent, {} cycles skipped",
            self.sender.sent(),
            self.skipped
        );
        if let Err(e) = self.ranger.release() {
            log::error!("Failed to release ranging lines: {}", e);
        }
        result
    }

    fn cycle_until_shutdown(&mut self) -> Result<()> {
        while !self.shutdown.is_triggered() {
            self.cycle()?;
            self.clock.sleep(self.period);
        }
        Ok(())
    }

    /// Cycles skipped on ranging timeouts
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn sender(&self) -> &TelemetrySender<W> {
        &self.sender
    }
}

/// Turn the command-line controller address into `host:port`.
///
/// Accepts `host`, `host:port`, a bare IP, or a socket address (IPv6 in
/// brackets when a port is given). `default_port` fills in a missing port.
pub fn resolve_controller_addr(arg: &str, default_port: u16) -> String {
    let arg = arg.trim();
    if arg.parse::<SocketAddr>().is_ok() {
        return arg.to_string();
    }
    if let Ok(ip) = arg.parse::<IpAddr>() {
        return SocketAddr::new(ip, default_port).to_string();
    }
    match arg.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => arg.to_string(),
        _ => format!("{}:{}", arg, default_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Level;
    use crate::devices::mock::{ManualClock, MockBus, MockLines};
    use crate::sensors::RangingConfig;
    use crate::sensors::tilt::{ACCEL_XOUT_H, ACCEL_YOUT_H, ACCEL_ZOUT_H};

    fn sensor_loop(
        echo_script: Vec<(Duration, Level)>,
    ) -> SensorLoop<MockLines, MockBus, ManualClock, Vec<u8>> {
        let clock = ManualClock::with_auto_advance(Duration::from_micros(10));
        let lines = MockLines::with_clock(clock.clone());
        lines.script_input(24, echo_script);
        let mut ranger = EchoRanger::new(lines, clock.clone(), RangingConfig::default());
        ranger.setup().unwrap();

        let bus = MockBus::new();
        bus.set_i16_be(ACCEL_XOUT_H, 0);
        bus.set_i16_be(ACCEL_YOUT_H, 0);
        bus.set_i16_be(ACCEL_ZOUT_H, 16384);
        let imu = Mpu6050::new(bus).unwrap();

        SensorLoop::new(
            ranger,
            imu,
            TelemetrySender::new(Vec::new()),
            clock,
            Duration::from_millis(100),
            ShutdownSignal::new(),
        )
    }

    #[test]
    fn test_cycle_sends_one_record() {
        // Echo high from 1 ms to ~1.58 ms: about 10 cm
        let mut sensor = sensor_loop(vec![
            (Duration::from_millis(1), Level::High),
            (Duration::from_micros(1580), Level::Low),
        ]);
        sensor.cycle().unwrap();
        assert_eq!(sensor.sender().sent(), 1);
        assert_eq!(sensor.skipped(), 0);
    }

    #[test]
    fn test_stuck_echo_skips_cycle() {
        let mut sensor = sensor_loop(Vec::new());
        sensor.cycle().unwrap();
        assert_eq!(sensor.sender().sent(), 0);
        assert_eq!(sensor.skipped(), 1);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let mut sensor = sensor_loop(Vec::new());
        sensor.shutdown.trigger();
        sensor.run().unwrap();
        assert_eq!(sensor.sender().sent(), 0);
    }

    #[test]
    fn test_resolve_controller_addr() {
        assert_eq!(resolve_controller_addr("192.168.1.20", 12345), "192.168.1.20:12345");
        assert_eq!(resolve_controller_addr("192.168.1.20:4000", 12345), "192.168.1.20:4000");
        assert_eq!(resolve_controller_addr("rover.local", 12345), "rover.local:12345");
        assert_eq!(resolve_controller_addr("rover.local:80", 12345), "rover.local:80");
        assert_eq!(resolve_controller_addr("::1", 12345), "[::1]:12345");
        assert_eq!(resolve_controller_addr("[::1]:9000", 12345), "[::1]:9000");
    }
}
