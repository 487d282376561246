//! Controller Loopback Tests
//!
//! Runs the real controller threads against mock hardware and a real TCP
//! socket on 127.0.0.1:
//! - close obstacle → no motor line ever raised
//! - steep tilt → 65% duty on both motors
//! - malformed records leave the stored sample untouched
//! - sensor disconnect shuts both threads down and releases every line
//! - a motor line fault during setup stops the controller and still releases
//!   every line
//!
//! Run with: `cargo test --test controller_loopback`

use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tilt_rover::core::types::Level;
use tilt_rover::devices::linux::SystemClock;
use tilt_rover::devices::mock::{MockAdc, MockLines};
use tilt_rover::error::Error;
use tilt_rover::runtime::{
    ControllerHandles, ControllerParts, SharedTelemetryState, ShutdownSignal, spawn_controller,
};
use tilt_rover::streaming::TelemetrySender;
use tilt_rover::{RoverConfig, TelemetrySample};

const MOTOR_LINES: [u32; 4] = [5, 6, 13, 19];
const STATUS_LINE: u32 = 18;

struct Harness {
    motor: MockLines,
    status: MockLines,
    state: Arc<SharedTelemetryState>,
    shutdown: ShutdownSignal,
    handles: ControllerHandles,
    addr: String,
}

fn start(config: RoverConfig, adc_reading: u16) -> Harness {
    start_with_motor_lines(config, adc_reading, MockLines::new())
}

fn start_with_motor_lines(config: RoverConfig, adc_reading: u16, motor: MockLines) -> Harness {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let status = MockLines::new();
    let parts = ControllerParts {
        adc: MockAdc::new(adc_reading),
        indicator_lines: status.clone(),
        motor_lines: motor.clone(),
        clock: SystemClock::new(),
    };
    let state = Arc::new(SharedTelemetryState::new());
    let shutdown = ShutdownSignal::new();
    let handles = spawn_controller(&config, listener, parts, Arc::clone(&state), shutdown.clone())
        .unwrap();

    Harness {
        motor,
        status,
        state,
        shutdown,
        handles,
        addr,
    }
}

fn connect(addr: &str) -> TelemetrySender<std::net::TcpStream> {
    TelemetrySender::connect(addr, Duration::from_secs(2)).unwrap()
}

fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(5));
    }
}

fn high_steps(lines: &MockLines, line: u32) -> usize {
    lines.writes_to(line).iter().filter(|l| **l == Level::High).count()
}

#[test]
fn test_close_obstacle_stops_both_motors() {
    let h = start(RoverConfig::default(), 1000);
    let mut sender = connect(&h.addr);

    sender.send(&TelemetrySample::new(5.0, 0.0)).unwrap();
    // claim_output writes once, then one period of 100 steps
    wait_for("one pulse period", || h.motor.writes_to(19).len() >= 101);

    assert_eq!(h.state.snapshot(), TelemetrySample::new(5.0, 0.0));
    for line in MOTOR_LINES {
        assert!(!h.motor.ever_high(line), "line {} went high", line);
    }

    drop(sender);
    assert!(matches!(h.handles.join(), Err(Error::Disconnected)));
}

#[test]
fn test_steep_tilt_runs_at_reduced_duty() {
    let h = start(RoverConfig::default(), 1000);
    let mut sender = connect(&h.addr);

    sender.send(&TelemetrySample::new(50.0, 40.0)).unwrap();
    wait_for("one pulse period", || h.motor.writes_to(19).len() >= 101);

    assert_eq!(high_steps(&h.motor, 5), 65);
    assert_eq!(high_steps(&h.motor, 13), 65);
    assert!(!h.motor.ever_high(6));
    assert!(!h.motor.ever_high(19));

    h.shutdown.trigger();
    h.handles.join().unwrap();
}

#[test]
fn test_malformed_records_are_skipped() {
    let h = start(RoverConfig::default(), 1000);
    let mut sender = connect(&h.addr);

    sender.send(&TelemetrySample::new(42.0, 3.0)).unwrap();
    wait_for("first record", || h.state.updates() == 1);

    let stream = sender.into_inner();
    let mut stream = &stream;
    stream.write_all(b"garbage degrees\n").unwrap();
    stream
        .write_all(b"Distance: 1.00 cm, Tilt Angle: nope degrees\n")
        .unwrap();
    stream
        .write_all(b"Distance: 60.00 cm, Tilt Angle: 20.00 degrees\n")
        .unwrap();

    wait_for("valid record after junk", || h.state.updates() == 2);
    assert_eq!(h.state.snapshot(), TelemetrySample::new(60.0, 20.0));

    h.shutdown.trigger();
    h.handles.join().unwrap();
}

#[test]
fn test_disconnect_releases_all_lines() {
    let mut config = RoverConfig::default();
    config.controller.indicator.interval_secs = 0;
    let h = start(config, 350);
    let sender = connect(&h.addr);

    wait_for("indicator on", || h.status.level(STATUS_LINE) == Level::High);
    wait_for("motor lines claimed", || h.motor.is_exported(5));

    drop(sender);
    assert!(matches!(h.handles.join(), Err(Error::Disconnected)));
    assert!(h.shutdown.is_triggered());

    assert_eq!(h.status.level(STATUS_LINE), Level::Low);
    assert!(!h.status.is_exported(STATUS_LINE));
    for line in MOTOR_LINES {
        assert!(!h.motor.is_exported(line));
        assert_eq!(h.motor.level(line), Level::Low);
    }
}

#[test]
fn test_shutdown_before_client_connects() {
    let h = start(RoverConfig::default(), 1000);
    wait_for("indicator claimed", || h.status.is_exported(STATUS_LINE));

    h.shutdown.trigger();
    h.handles.join().unwrap();

    for line in MOTOR_LINES {
        assert!(!h.motor.is_exported(line));
    }
    assert!(h.motor.events().is_empty());
}

#[test]
fn test_motor_setup_fault_releases_lines() {
    let motor = MockLines::new();
    motor.fail_line(13);
    let h = start_with_motor_lines(RoverConfig::default(), 1000, motor);
    let _sender = connect(&h.addr);

    let err = h.handles.join().unwrap_err();
    assert!(err.is_hardware(), "unexpected error: {}", err);
    assert!(h.shutdown.is_triggered());

    for line in MOTOR_LINES {
        assert!(!h.motor.is_exported(line), "line {} still exported", line);
    }
    assert!(!h.status.is_exported(STATUS_LINE));
}
