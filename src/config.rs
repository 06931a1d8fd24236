//! Chassis configuration loaded from YAML.
//!
//! Every section has defaults matching the competition robot's tuning, so a
//! config file only needs to name the values it changes. Powers are
//! normalized to `[-1, 1]`; distances use the same unit as the wheel travel
//! readings (inches on the competition robot).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Full chassis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChassisConfig {
    #[serde(default)]
    pub drivetrain: DrivetrainConfig,

    /// Gains for distance error
    #[serde(default = "ControllerSettings::linear")]
    pub linear: ControllerSettings,

    /// Gains for heading error
    #[serde(default = "ControllerSettings::angular")]
    pub angular: ControllerSettings,

    #[serde(default)]
    pub motion: MotionDefaults,

    #[serde(default, rename = "loop")]
    pub control_loop: LoopConfig,

    #[serde(default)]
    pub driver: DriverConfig,
}

/// Physical drivetrain parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    /// Distance between left and right wheel contact patches
    pub track_width: f64,
    /// Largest power magnitude the actuators accept
    pub max_power: f64,
    /// Largest change per tick in the power sent to either side
    pub slew: f64,
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        Self {
            track_width: 12.0,
            max_power: 1.0,
            slew: 0.16,
        }
    }
}

/// PD gains and slew for one controlled axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Proportional gain (power per unit of error)
    pub kp: f64,
    /// Derivative gain (power per unit of error per second)
    pub kd: f64,
    /// Largest change in output allowed per tick
    pub slew: f64,
}

impl ControllerSettings {
    pub fn linear() -> Self {
        Self {
            kp: 0.08,
            kd: 0.0024,
            slew: 0.16,
        }
    }

    pub fn angular() -> Self {
        Self {
            kp: 0.9,
            kd: 0.045,
            slew: 0.16,
        }
    }
}

/// Defaults applied to commands that don't override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDefaults {
    pub linear_tolerance: f64,
    /// Heading tolerance in degrees
    pub angular_tolerance_deg: f64,
    /// Pure pursuit lookahead distance
    pub lookahead: f64,
    /// Boomerang lead factor for move-to-pose, in [0, 1]
    pub lead: f64,
    /// Below this distance move-to-pose steers to the final heading only
    pub close_distance: f64,
}

impl Default for MotionDefaults {
    fn default() -> Self {
        Self {
            linear_tolerance: 1.0,
            angular_tolerance_deg: 1.0,
            lookahead: 15.0,
            lead: 0.6,
            close_distance: 7.5,
        }
    }
}

impl MotionDefaults {
    pub fn angular_tolerance(&self) -> f64 {
        self.angular_tolerance_deg.to_radians()
    }
}

/// Control loop timing and fault handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub period_ms: u64,
    /// Consecutive bad samples tolerated before outputs are held at zero
    pub max_untrusted_ticks: u32,
    /// Number of recent command reports kept in the published state
    pub report_history: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            period_ms: 10,
            max_untrusted_ticks: 5,
            report_history: 16,
        }
    }
}

impl LoopConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Driver-control settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Stick magnitudes below this are treated as zero
    pub deadband: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            deadband: 15.0 / 127.0,
        }
    }
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            drivetrain: DrivetrainConfig::default(),
            linear: ControllerSettings::linear(),
            angular: ControllerSettings::angular(),
            motion: MotionDefaults::default(),
            control_loop: LoopConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl ChassisConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ChassisConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        }
        fn non_negative(name: &str, value: f64) -> Result<(), ConfigError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!(
                    "{name} must be non-negative, got {value}"
                )))
            }
        }

        positive("drivetrain.track_width", self.drivetrain.track_width)?;
        positive("drivetrain.max_power", self.drivetrain.max_power)?;
        positive("drivetrain.slew", self.drivetrain.slew)?;
        if self.drivetrain.max_power > 1.0 {
            return Err(ConfigError::Invalid(
                "drivetrain.max_power must not exceed 1.0".to_string(),
            ));
        }

        for (axis, settings) in [("linear", &self.linear), ("angular", &self.angular)] {
            non_negative(&format!("{axis}.kp"), settings.kp)?;
            non_negative(&format!("{axis}.kd"), settings.kd)?;
            positive(&format!("{axis}.slew"), settings.slew)?;
        }

        positive("motion.linear_tolerance", self.motion.linear_tolerance)?;
        positive("motion.angular_tolerance_deg", self.motion.angular_tolerance_deg)?;
        positive("motion.lookahead", self.motion.lookahead)?;
        non_negative("motion.close_distance", self.motion.close_distance)?;
        if !(0.0..=1.0).contains(&self.motion.lead) {
            return Err(ConfigError::Invalid(format!(
                "motion.lead must be within [0, 1], got {}",
                self.motion.lead
            )));
        }

        if self.control_loop.period_ms == 0 {
            return Err(ConfigError::Invalid("loop.period_ms must be positive".to_string()));
        }
        if self.control_loop.report_history == 0 {
            return Err(ConfigError::Invalid(
                "loop.report_history must be positive".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.driver.deadband) {
            return Err(ConfigError::Invalid(format!(
                "driver.deadband must be within [0, 1), got {}",
                self.driver.deadband
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ChassisConfig::from_yaml("loop:\n  period_ms: 20\n").unwrap();
        assert_eq!(config.control_loop.period_ms, 20);
        assert_eq!(config.control_loop.max_untrusted_ticks, 5);
        assert_eq!(config.linear, ControllerSettings::linear());
        assert_eq!(config.angular, ControllerSettings::angular());
    }

    #[test]
    fn default_config_round_trips() {
        let config = ChassisConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(ChassisConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ChassisConfig::from_yaml("drivetrain:\n  track_width: -1.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ChassisConfig::from_yaml("motion:\n  lead: 1.5\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ChassisConfig::from_yaml("drivetrain:\n  slew: 0.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ChassisConfig::from_yaml("loop:\n  period_ms: 0\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            ChassisConfig::from_yaml("loop: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }
}
