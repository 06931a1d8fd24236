use std::path::Path;

use approx::assert_relative_eq;
use chassis_core::config::ControllerSettings;
use chassis_core::{ChassisConfig, ConfigError};

#[test]
fn shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/chassis.yaml");
    let config = ChassisConfig::load(&path).unwrap();
    let defaults = ChassisConfig::default();

    assert_eq!(config.drivetrain, defaults.drivetrain);
    assert_eq!(config.linear, ControllerSettings::linear());
    assert_eq!(config.angular, ControllerSettings::angular());
    assert_eq!(config.motion, defaults.motion);
    assert_eq!(config.control_loop, defaults.control_loop);
    assert_relative_eq!(config.driver.deadband, defaults.driver.deadband, epsilon = 1e-4);
}

#[test]
fn missing_file_is_an_io_error() {
    let result = ChassisConfig::load(Path::new("/nonexistent/chassis.yaml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
