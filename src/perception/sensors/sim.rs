//! Simulated drivetrain used by the simulation binary and tests

use std::time::Duration;

use nalgebra::{Rotation2, Vector2};

use super::{Hardware, SensorSample};
use crate::common::{normalize_angle, Pose};
use crate::control::controllers::DriveOutput;
use crate::error::{MotionError, Result};

/// Physical parameters of the simulated robot
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Wheel surface speed at full power, distance per second
    pub max_wheel_speed: f64,
    pub track_width: f64,
    /// Simulated time that passes between two sensor reads
    pub step: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        // 3.25" wheels at 360 rpm
        Self {
            max_wheel_speed: 3.25 * std::f64::consts::PI * 360.0 / 60.0,
            track_width: 12.0,
            step: Duration::from_millis(10),
        }
    }
}

/// Kinematic differential drive with an ideal heading sensor.
///
/// Each [`Hardware::read_sensors`] call advances simulated time by one
/// `step` using the most recently applied power.
#[derive(Debug, Clone)]
pub struct SimulatedDrivetrain {
    config: SimConfig,
    pose: Pose,
    output: DriveOutput,
    outputs_applied: usize,
    failures_pending: u32,
}

impl SimulatedDrivetrain {
    pub fn new(config: SimConfig, start: Pose) -> Self {
        SimulatedDrivetrain {
            config,
            pose: start,
            output: DriveOutput::STOPPED,
            outputs_applied: 0,
            failures_pending: 0,
        }
    }

    /// Ground-truth pose of the simulated robot
    pub fn true_pose(&self) -> Pose {
        self.pose
    }

    /// Last power applied by the control loop
    pub fn output(&self) -> DriveOutput {
        self.output
    }

    pub fn outputs_applied(&self) -> usize {
        self.outputs_applied
    }

    /// Make the next `count` sensor reads fail
    pub fn inject_failures(&mut self, count: u32) {
        self.failures_pending = count;
    }

    fn advance(&mut self) -> SensorSample {
        let dt = self.config.step.as_secs_f64();
        let left = self.output.left.clamp(-1.0, 1.0) * self.config.max_wheel_speed * dt;
        let right = self.output.right.clamp(-1.0, 1.0) * self.config.max_wheel_speed * dt;

        let delta_heading = (right - left) / self.config.track_width;
        let delta_s = (left + right) / 2.0;
        let chord = if delta_heading.abs() < 1e-12 {
            delta_s
        } else {
            2.0 * (delta_s / delta_heading) * (delta_heading / 2.0).sin()
        };
        let step = Rotation2::new(self.pose.heading + delta_heading / 2.0) * Vector2::new(chord, 0.0);

        self.pose.x += step.x;
        self.pose.y += step.y;
        self.pose.heading = normalize_angle(self.pose.heading + delta_heading);

        SensorSample::new(self.pose.heading, left, right)
    }
}

impl Hardware for SimulatedDrivetrain {
    fn name(&self) -> &str {
        "simulated drivetrain"
    }

    fn read_sensors(&mut self) -> Result<SensorSample> {
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            // the robot keeps moving even when the read fails
            self.advance();
            return Err(MotionError::Sensor("simulated read failure".to_string()));
        }
        Ok(self.advance())
    }

    fn set_drive(&mut self, output: DriveOutput) {
        self.output = output;
        self.outputs_applied += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn equal_power_drives_straight() {
        let mut sim = SimulatedDrivetrain::new(SimConfig::default(), Pose::default());
        sim.set_drive(DriveOutput::new(0.5, 0.5));
        for _ in 0..100 {
            sim.read_sensors().unwrap();
        }
        let expected = 0.5 * SimConfig::default().max_wheel_speed;
        assert_relative_eq!(sim.true_pose().x, expected, epsilon = 1e-9);
        assert_relative_eq!(sim.true_pose().y, 0.0);
    }

    #[test]
    fn opposite_power_turns_in_place() {
        let mut sim = SimulatedDrivetrain::new(SimConfig::default(), Pose::default());
        sim.set_drive(DriveOutput::new(-0.2, 0.2));
        let sample = sim.read_sensors().unwrap();
        assert!(sample.heading > 0.0);
        assert_relative_eq!(sim.true_pose().x, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn injected_failures_are_reported() {
        let mut sim = SimulatedDrivetrain::new(SimConfig::default(), Pose::default());
        sim.inject_failures(2);
        assert!(sim.read_sensors().is_err());
        assert!(sim.read_sensors().is_err());
        assert!(sim.read_sensors().is_ok());
    }
}
