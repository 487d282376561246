//! sensor-node - distance and tilt telemetry producer
//!
//! Measures echo distance and accelerometer tilt every 100 ms and streams
//! `Distance: <d> cm, Tilt Angle: <t> degrees` records to the controller.
//!
//! Usage:
//!   sensor-node 192.168.1.20
//!   sensor-node 192.168.1.20:12345 --config /etc/tilt-rover.toml
//!   RUST_LOG=debug sensor-node 127.0.0.1

use clap::Parser;
use std::path::PathBuf;
use tilt_rover::core::platform::{Clock, DigitalLines};
use tilt_rover::devices::linux::{I2cDevice, SysfsGpio, SystemClock};
use tilt_rover::error::{Error, Result};
use tilt_rover::runtime::{SensorLoop, ShutdownSignal, resolve_controller_addr};
use tilt_rover::sensors::{EchoRanger, Mpu6050};
use tilt_rover::streaming::TelemetrySender;
use tilt_rover::RoverConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller address (host or host:port)
    controller: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn release_ranger<L: DigitalLines, C: Clock>(ranger: &mut EchoRanger<L, C>) {
    if let Err(e) = ranger.release() {
        log::error!("Failed to release ranging lines: {}", e);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = RoverConfig::load_or_default(args.config.as_ref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("sensor-node v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = ShutdownSignal::new();
    let s = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        s.trigger();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let addr = resolve_controller_addr(&args.controller, config.network.port);
    let sender = TelemetrySender::connect(&addr, config.network.connect_timeout())?;

    let clock = SystemClock::new();
    let mut ranger = EchoRanger::new(SysfsGpio::new(), clock, config.sensor.ranging.clone());
    if let Err(e) = ranger.setup() {
        release_ranger(&mut ranger);
        return Err(e);
    }

    let imu = match I2cDevice::open(config.sensor.i2c_bus, config.sensor.accel_address)
        .and_then(Mpu6050::new)
    {
        Ok(imu) => imu,
        Err(e) => {
            release_ranger(&mut ranger);
            return Err(e);
        }
    };

    let mut sensor = SensorLoop::new(
        ranger,
        imu,
        sender,
        clock,
        config.sensor.period(),
        shutdown,
    );

    match sensor.run() {
        Ok(()) => {
            log::info!("sensor-node stopped");
            Ok(())
        }
        Err(e) => {
            if e.is_hardware() {
                log::error!("Hardware fault: {}", e);
            } else {
                log::error!("Sensor loop failed: {}", e);
            }
            Err(e)
        }
    }
}
