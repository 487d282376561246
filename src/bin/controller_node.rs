//! controller-node - telemetry-driven motor controller
//!
//! Listens for one sensor node, drives both motors from each record and runs
//! the light-level status indicator on its own thread.
//!
//! Usage:
//!   controller-node
//!   controller-node --config /etc/tilt-rover.toml

use clap::Parser;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tilt_rover::devices::linux::{Mcp3008, SysfsGpio, SystemClock};
use tilt_rover::error::{Error, Result};
use tilt_rover::runtime::{ControllerParts, SharedTelemetryState, ShutdownSignal, spawn_controller};
use tilt_rover::RoverConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = RoverConfig::load_or_default(args.config.as_ref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("controller-node v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!(
        "Policy: stop < {} cm, |tilt| > {}° -> {}%, > {}° -> {}%, else {}%",
        config.policy.stop_distance_cm,
        config.policy.steep_tilt_deg,
        config.policy.steep_duty,
        config.policy.moderate_tilt_deg,
        config.policy.moderate_duty,
        config.policy.cruise_duty
    );

    let shutdown = ShutdownSignal::new();
    let s = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        s.trigger();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let bind_addr = config.network.bind_address();
    let listener = TcpListener::bind(&bind_addr)
        .map_err(|e| Error::Other(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    let parts = ControllerParts {
        adc: Mcp3008::open(config.controller.spi.clone())?,
        indicator_lines: SysfsGpio::new(),
        motor_lines: SysfsGpio::new(),
        clock: SystemClock::new(),
    };

    let state = Arc::new(SharedTelemetryState::new());
    let handles = spawn_controller(&config, listener, parts, Arc::clone(&state), shutdown.clone())?;
    log::info!("controller-node running. Press Ctrl-C to stop.");

    // Main thread: wait for Ctrl-C or a worker exit
    let check_interval = Duration::from_millis(100);
    while !shutdown.is_triggered() && !handles.any_finished() {
        thread::sleep(check_interval);
    }
    shutdown.trigger();

    log::info!("Waiting for threads to finish...");
    let result = handles.join();
    log::info!("Processed {} telemetry records", state.updates());

    match result {
        Ok(()) | Err(Error::Disconnected) => {
            log::info!("controller-node stopped");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
