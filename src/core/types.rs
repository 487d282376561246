//! Core data types for telemetry, motor commands and digital lines.

/// Digital line number (BCM numbering on the Raspberry Pi)
pub type LineId = u32;

/// Logic level of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

impl Level {
    /// Level from a boolean (true = High)
    #[inline]
    pub fn from_bool(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }

    #[inline]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

/// Direction of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDirection {
    In,
    Out,
}

impl LineDirection {
    /// Keyword understood by the sysfs `direction` attribute
    pub fn as_str(self) -> &'static str {
        match self {
            LineDirection::In => "in",
            LineDirection::Out => "out",
        }
    }
}

/// One (distance, tilt) reading produced by the sensor node
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    /// Distance to the nearest obstacle in centimeters
    pub distance_cm: f32,
    /// Tilt angle in degrees, roughly [-90, 90]
    pub tilt_deg: f32,
}

impl TelemetrySample {
    pub fn new(distance_cm: f32, tilt_deg: f32) -> Self {
        Self {
            distance_cm,
            tilt_deg,
        }
    }
}

/// Which of the two drive motors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorId {
    Left,
    Right,
}

/// Requested rotation of a motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
    Stop,
}

/// Direction plus duty cycle for one motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    pub motor: MotorId,
    pub direction: Direction,
    /// Active share of the pulse period, 0..=100
    pub duty_percent: u8,
}

impl MotorCommand {
    /// Build a command, clamping duty to 100 and forcing 0 for `Stop`
    pub fn new(motor: MotorId, direction: Direction, duty_percent: u8) -> Self {
        let duty_percent = match direction {
            Direction::Stop => 0,
            _ => duty_percent.min(100),
        };
        Self {
            motor,
            direction,
            duty_percent,
        }
    }

    pub fn stop(motor: MotorId) -> Self {
        Self::new(motor, Direction::Stop, 0)
    }

    /// Same direction and duty for a different motor
    pub fn for_motor(self, motor: MotorId) -> Self {
        Self { motor, ..self }
    }
}

/// 10-bit sample from one analog channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AnalogReading(u16);

impl AnalogReading {
    /// Largest value a 10-bit converter can report
    pub const MAX: u16 = 0x3FF;

    /// Wrap a raw value, keeping only the low 10 bits
    pub fn new(raw: u16) -> Self {
        Self(raw & Self::MAX)
    }

    pub fn value(self) -> u16 {
        self.0
    }
}
