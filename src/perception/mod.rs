//! Perception: hardware access and pose estimation
pub mod localization;
pub mod sensors;

pub use self::localization::PoseEstimator;
pub use self::sensors::{Hardware, SensorSample, SimConfig, SimulatedDrivetrain};
