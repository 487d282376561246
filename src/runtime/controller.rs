//! Controller node: telemetry in, motor pulses and status indicator out.
//!
//! [`spawn_controller`] starts two named threads over an already bound
//! listener. The indicator thread runs from the start; the control thread
//! first waits for the single sensor client, then claims the motor lines and
//! processes records until shutdown or disconnect. Either thread ending
//! triggers the shared shutdown signal so its sibling stops too.

use crate::config::RoverConfig;
use crate::control::{DrivePolicy, IndicatorMonitor, PulseActuator};
use crate::core::platform::{AnalogSource, Clock, DigitalLines};
use crate::error::{Error, Result};
use crate::runtime::shared::{SharedTelemetryState, ShutdownSignal};
use crate::streaming::TelemetryReceiver;
use crate::streaming::framing::RecordResult;
use std::io::{ErrorKind, Read};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Hardware handed to the controller threads
pub struct ControllerParts<A, LI, LM, C> {
    /// ADC feeding the indicator
    pub adc: A,
    /// Lines used by the indicator thread
    pub indicator_lines: LI,
    /// Lines used by the control thread
    pub motor_lines: LM,
    pub clock: C,
}

/// Receive → store → decide → actuate, one record at a time
pub struct ControlLoop<R: Read, L: DigitalLines, C: Clock> {
    receiver: TelemetryReceiver<R>,
    actuator: PulseActuator<L, C>,
    policy: DrivePolicy,
    state: Arc<SharedTelemetryState>,
    shutdown: ShutdownSignal,
    rejected: u64,
}

impl<R: Read, L: DigitalLines, C: Clock> ControlLoop<R, L, C> {
    /// `actuator` must already be set up
    pub fn new(
        reader: R,
        actuator: PulseActuator<L, C>,
        policy: DrivePolicy,
        state: Arc<SharedTelemetryState>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            receiver: TelemetryReceiver::new(reader),
            actuator,
            policy,
            state,
            shutdown,
            rejected: 0,
        }
    }

    /// Apply one reassembled record.
    ///
    /// Malformed records are logged and dropped; the stored sample and the
    /// motors are left as they were.
    pub fn handle_record(&mut self, record: RecordResult) -> Result<()> {
        let sample = match record {
            Ok(sample) => sample,
            Err(e) => {
                self.rejected += 1;
                log::warn!("Dropping telemetry record: {}", e);
                return Ok(());
            }
        };

        self.state.update(sample);
        let current = self.state.snapshot();
        let commands = self.policy.decide(&current);
        log::debug!(
            "{:.2} cm, {:.2}° -> {:?} {}%",
            current.distance_cm,
            current.tilt_deg,
            commands.0.direction,
            commands.0.duty_percent
        );
        self.actuator.drive_pair(&commands)
    }

    /// One read from the link and every record it completed
    pub fn step(&mut self) -> Result<()> {
        for record in self.receiver.poll()? {
            self.handle_record(record)?;
        }
        Ok(())
    }

    /// Run until shutdown, disconnect, or a hardware fault
    pub fn run(&mut self) -> Result<()> {
        while !self.shutdown.is_triggered() {
            self.step()?;
        }
        Ok(())
    }

    /// Records dropped as malformed
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Stop and unexport the motor lines
    pub fn release(&mut self) -> Result<()> {
        self.actuator.release()
    }
}

/// Sample-and-decide loop for the status indicator
pub struct IndicatorLoop<A: AnalogSource, L: DigitalLines, C: Clock> {
    monitor: IndicatorMonitor<A, L, C>,
    shutdown: ShutdownSignal,
}

impl<A: AnalogSource, L: DigitalLines, C: Clock> IndicatorLoop<A, L, C> {
    pub fn new(monitor: IndicatorMonitor<A, L, C>, shutdown: ShutdownSignal) -> Self {
        Self { monitor, shutdown }
    }

    /// Claim the line, tick until shutdown, then turn off and release
    pub fn run(&mut self) -> Result<()> {
        self.monitor.setup()?;
        let result = self.tick_until_shutdown();
        if let Err(e) = self.monitor.release() {
            log::error!("Failed to release indicator line: {}", e);
        }
        result
    }

    fn tick_until_shutdown(&mut self) -> Result<()> {
        let period = self.monitor.sample_period();
        while !self.shutdown.is_triggered() {
            self.monitor.tick()?;
            self.monitor.clock().sleep(period);
        }
        Ok(())
    }
}

/// Join handles for the controller threads
pub struct ControllerHandles {
    pub indicator: JoinHandle<Result<()>>,
    pub control: JoinHandle<Result<()>>,
}

impl ControllerHandles {
    /// True once either thread has returned
    pub fn any_finished(&self) -> bool {
        self.indicator.is_finished() || self.control.is_finished()
    }

    /// Wait for both threads; the control thread's error wins
    pub fn join(self) -> Result<()> {
        let indicator = join_worker("indicator", self.indicator);
        let control = join_worker("control", self.control);
        control.and(indicator)
    }
}

fn join_worker(name: &str, handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => {
            log::error!("{} thread panicked", name);
            Err(Error::ThreadPanic)
        }
    }
}

/// Start the indicator and control threads.
///
/// `listener` must already be bound; bind failures belong to the caller and
/// happen before any thread starts.
pub fn spawn_controller<A, LI, LM, C>(
    config: &RoverConfig,
    listener: TcpListener,
    parts: ControllerParts<A, LI, LM, C>,
    state: Arc<SharedTelemetryState>,
    shutdown: ShutdownSignal,
) -> Result<ControllerHandles>
where
    A: AnalogSource + 'static,
    LI: DigitalLines + 'static,
    LM: DigitalLines + 'static,
    C: Clock + Clone + 'static,
{
    let ControllerParts {
        adc,
        indicator_lines,
        motor_lines,
        clock,
    } = parts;

    let monitor = IndicatorMonitor::new(
        adc,
        indicator_lines,
        clock.clone(),
        config.controller.indicator.clone(),
    );
    let indicator_shutdown = shutdown.clone();
    let indicator = thread::Builder::new()
        .name("indicator".to_string())
        .spawn(move || {
            let result = IndicatorLoop::new(monitor, indicator_shutdown.clone()).run();
            finish_worker("Indicator", &result, &indicator_shutdown);
            result
        })
        .map_err(|e| Error::Other(format!("Failed to spawn indicator thread: {}", e)))?;

    let actuator = PulseActuator::new(motor_lines, clock, config.controller.pulse.clone());
    let policy = config.policy.clone();
    let read_timeout = config.network.read_timeout();
    let control_shutdown = shutdown.clone();
    let control = thread::Builder::new()
        .name("control".to_string())
        .spawn(move || {
            let result = control_thread(
                listener,
                read_timeout,
                actuator,
                policy,
                state,
                control_shutdown.clone(),
            );
            finish_worker("Control", &result, &control_shutdown);
            result
        });

    let control = match control {
        Ok(handle) => handle,
        Err(e) => {
            shutdown.trigger();
            let _ = join_worker("indicator", indicator);
            return Err(Error::Other(format!("Failed to spawn control thread: {}", e)));
        }
    };

    Ok(ControllerHandles { indicator, control })
}

fn finish_worker(name: &str, result: &Result<()>, shutdown: &ShutdownSignal) {
    match result {
        Ok(()) => log::info!("{} thread exiting", name),
        Err(Error::Disconnected) => log::info!("{} thread: sensor node disconnected", name),
        Err(e) if e.is_hardware() => log::error!("{} thread hardware fault: {}", name, e),
        Err(e) => log::error!("{} thread failed: {}", name, e),
    }
    shutdown.trigger();
}

fn control_thread<L: DigitalLines, C: Clock>(
    listener: TcpListener,
    read_timeout: Duration,
    mut actuator: PulseActuator<L, C>,
    policy: DrivePolicy,
    state: Arc<SharedTelemetryState>,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let Some(stream) = accept_client(&listener, &shutdown)? else {
        return Ok(());
    };
    stream.set_read_timeout(Some(read_timeout))?;

    if let Err(e) = actuator.setup() {
        if let Err(release_err) = actuator.release() {
            log::error!("Failed to release motor lines after setup error: {}", release_err);
        }
        return Err(e);
    }

    let mut control = ControlLoop::new(stream, actuator, policy, state, shutdown);
    let result = control.run();
    if control.rejected() > 0 {
        log::info!("Dropped {} malformed records", control.rejected());
    }
    if let Err(e) = control.release() {
        log::error!("Failed to release motor lines: {}", e);
    }
    result
}

/// Wait for the single sensor client.
///
/// Returns `None` if shutdown is requested first.
pub fn accept_client(
    listener: &TcpListener,
    shutdown: &ShutdownSignal,
) -> Result<Option<TcpStream>> {
    listener.set_nonblocking(true)?;
    log::info!("Waiting for sensor node on {}", listener.local_addr()?);

    while !shutdown.is_triggered() {
        match listener.accept() {
            Ok((stream, addr)) => {
                stream.set_nonblocking(false)?;
                if let Err(e) = stream.set_nodelay(true) {
                    log::warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                }
                log::info!("Sensor node connected: {}", addr);
                return Ok(Some(stream));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(None)
}
