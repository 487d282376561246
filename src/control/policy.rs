//! Threshold drive policy.
//!
//! | Priority | Condition                       | Both motors  |
//! |----------|---------------------------------|--------------|
//! | 1        | `distance < 10 cm`              | Stop         |
//! | 2        | `|tilt| > 30°`                  | Forward 65 % |
//! | 3        | `|tilt| > 15°`                  | Forward 75 % |
//! | 4        | otherwise                       | Forward 95 % |
//!
//! Larger tilt slows the robot down; an obstacle overrides everything.
//! The policy never reverses.

use crate::core::types::{Direction, MotorCommand, MotorId, TelemetrySample};
use serde::{Deserialize, Serialize};

/// Policy thresholds and duties
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DrivePolicy {
    /// Stop when the obstacle is closer than this
    pub stop_distance_cm: f32,
    pub steep_tilt_deg: f32,
    pub moderate_tilt_deg: f32,
    pub steep_duty: u8,
    pub moderate_duty: u8,
    pub cruise_duty: u8,
}

impl Default for DrivePolicy {
    fn default() -> Self {
        Self {
            stop_distance_cm: 10.0,
            steep_tilt_deg: 30.0,
            moderate_tilt_deg: 15.0,
            steep_duty: 65,
            moderate_duty: 75,
            cruise_duty: 95,
        }
    }
}

impl DrivePolicy {
    /// Map a sample to (left, right) commands; both always match
    pub fn decide(&self, sample: &TelemetrySample) -> (MotorCommand, MotorCommand) {
        let tilt = sample.tilt_deg;
        let outside = |limit: f32| tilt < -limit || tilt > limit;

        let command = if sample.distance_cm < self.stop_distance_cm {
            MotorCommand::stop(MotorId::Left)
        } else if outside(self.steep_tilt_deg) {
            MotorCommand::new(MotorId::Left, Direction::Forward, self.steep_duty)
        } else if outside(self.moderate_tilt_deg) {
            MotorCommand::new(MotorId::Left, Direction::Forward, self.moderate_duty)
        } else {
            MotorCommand::new(MotorId::Left, Direction::Forward, self.cruise_duty)
        };

        (command, command.for_motor(MotorId::Right))
    }
}

/// [`DrivePolicy::decide`] with the default thresholds
pub fn decide(sample: &TelemetrySample) -> (MotorCommand, MotorCommand) {
    DrivePolicy::default().decide(sample)
}
