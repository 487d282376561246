//! Error types for tilt-rover

use crate::core::types::LineId;
use crate::streaming::wire::ParseError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Phase of an echo measurement that ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoPhase {
    /// Waiting for the echo line to rise
    EchoStart,
    /// Waiting for the echo line to fall
    EchoEnd,
}

impl std::fmt::Display for EchoPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EchoPhase::EchoStart => write!(f, "echo start"),
            EchoPhase::EchoEnd => write!(f, "echo end"),
        }
    }
}

/// tilt-rover error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Digital line access failed
    #[error("GPIO {line} {operation} failed: {source}")]
    Gpio {
        /// Line that failed
        line: LineId,
        /// What was attempted (export, direction, write, read, ...)
        operation: &'static str,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Register bus (I2C) transaction failed
    #[error("Bus error at register {register:#04x}: {source}")]
    Bus {
        /// Register being accessed
        register: u8,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Analog transfer (SPI) failed
    #[error("Analog transfer on channel {channel} failed: {source}")]
    Analog {
        /// ADC channel
        channel: u8,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Echo line did not change within the allowed time
    #[error("Ranging timeout waiting for {phase} after {waited_us}us")]
    RangingTimeout {
        /// Which edge never arrived
        phase: EchoPhase,
        /// How long we waited
        waited_us: u64,
    },

    /// Malformed telemetry record
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Peer closed the telemetry connection
    #[error("Telemetry peer disconnected")]
    Disconnected,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker thread panicked
    #[error("Thread panic")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Whether the error comes from the hardware layer (always fatal)
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Error::Gpio { .. } | Error::Bus { .. } | Error::Analog { .. }
        )
    }
}
