//! Hardware interface for the chassis.
//!
//! The control loop owns one [`Hardware`] value, passed in at construction.
//! Nothing else in the crate touches motors or sensors.

mod sim;

pub use sim::{SimConfig, SimulatedDrivetrain};

use crate::control::controllers::DriveOutput;
use crate::error::Result;

/// One reading of the odometry sensors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorSample {
    /// Absolute heading from the inertial sensor, radians, CCW positive
    pub heading: f64,
    /// Left side travel since the previous sample
    pub left_travel: f64,
    /// Right side travel since the previous sample
    pub right_travel: f64,
}

impl SensorSample {
    pub fn new(heading: f64, left_travel: f64, right_travel: f64) -> Self {
        SensorSample {
            heading,
            left_travel,
            right_travel,
        }
    }

    /// Sample with no wheel travel
    pub fn stationary(heading: f64) -> Self {
        Self::new(heading, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.heading.is_finite() && self.left_travel.is_finite() && self.right_travel.is_finite()
    }
}

/// Sensor and actuator access for the drivetrain
pub trait Hardware: Send {
    /// Name used in log messages
    fn name(&self) -> &str {
        "drivetrain"
    }

    /// Read the heading sensor and the wheel travel since the last read
    fn read_sensors(&mut self) -> Result<SensorSample>;

    /// Apply left/right power in `[-1, 1]`
    fn set_drive(&mut self, output: DriveOutput);
}
