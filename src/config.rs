//! Configuration for both nodes
//!
//! Every section has defaults, so an empty or partial TOML file is valid and a
//! missing file is not an error for the binaries.

use crate::control::actuator::{MAX_PULSE_STEPS, MAX_STEP_US};
use crate::control::{DrivePolicy, IndicatorConfig, PulseConfig};
use crate::devices::linux::SpiSettings;
use crate::error::{Error, Result};
use crate::sensors::RangingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RoverConfig {
    pub network: NetworkConfig,
    pub sensor: SensorConfig,
    pub controller: ControllerConfig,
    pub policy: DrivePolicy,
    pub logging: LoggingConfig,
}

/// Telemetry link settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Controller listen host; the port comes from `port`
    pub bind_host: String,
    /// Controller listen port, also dialled when the sensor node is given a bare host
    pub port: u16,
    /// Sensor-side connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Controller-side socket read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 12345,
            connect_timeout_ms: 5000,
            read_timeout_ms: 100,
        }
    }
}

impl NetworkConfig {
    /// `bind_host:port` for the controller listener
    pub fn bind_address(&self) -> String {
        match self.bind_host.parse::<std::net::Ipv6Addr>() {
            Ok(ip) => format!("[{}]:{}", ip, self.port),
            Err(_) => format!("{}:{}", self.bind_host, self.port),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Sensor node hardware and cadence
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub ranging: RangingConfig,
    /// I2C bus number (/dev/i2c-N)
    pub i2c_bus: u8,
    /// Accelerometer address on the bus
    pub accel_address: u16,
    /// Milliseconds between telemetry records
    pub period_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ranging: RangingConfig::default(),
            i2c_bus: 1,
            accel_address: crate::sensors::tilt::MPU6050_ADDRESS,
            period_ms: 100,
        }
    }
}

impl SensorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Controller node hardware
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub pulse: PulseConfig,
    pub indicator: IndicatorConfig,
    pub spi: SpiSettings,
}

/// Logging
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RoverConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: RoverConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the loops cannot run with
    pub fn validate(&self) -> Result<()> {
        let pulse = &self.controller.pulse;
        if pulse.steps == 0 || pulse.steps > MAX_PULSE_STEPS {
            return Err(Error::Config(format!(
                "pulse.steps {} out of range 1-{}",
                pulse.steps, MAX_PULSE_STEPS
            )));
        }
        if pulse.step_us == 0 || pulse.step_us > MAX_STEP_US {
            return Err(Error::Config(format!(
                "pulse.step_us {} out of range 1-{}",
                pulse.step_us, MAX_STEP_US
            )));
        }
        if self.controller.indicator.channel > 7 {
            return Err(Error::Config(format!(
                "indicator.channel {} out of range 0-7",
                self.controller.indicator.channel
            )));
        }
        let p = &self.policy;
        if p.moderate_tilt_deg > p.steep_tilt_deg {
            return Err(Error::Config(format!(
                "policy.moderate_tilt_deg ({}) exceeds steep_tilt_deg ({})",
                p.moderate_tilt_deg, p.steep_tilt_deg
            )));
        }
        if self.network.read_timeout_ms == 0 {
            // A zero timeout is rejected by set_read_timeout
            return Err(Error::Config("network.read_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}
