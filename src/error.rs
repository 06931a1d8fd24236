//! Error types for the chassis

use crate::control::commands::CommandId;

/// Result type alias
pub type Result<T> = std::result::Result<T, MotionError>;

/// Errors raised by estimation, command handling and waiting.
///
/// None of these are fatal to the control loop: sample errors skip one
/// estimation step, command errors end only the command concerned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MotionError {
    /// Sample arrived with a non-positive time step
    #[error("stale sensor sample: dt = {dt_s:.6}s")]
    StaleSample { dt_s: f64 },

    /// Sample contained NaN or infinite readings
    #[error("invalid sensor sample: {0}")]
    InvalidSample(String),

    /// The hardware failed to produce a sample
    #[error("sensor read failed: {0}")]
    Sensor(String),

    /// A command was started while another one was still running.
    /// The running command is pre-empted.
    #[error("command {incoming} pre-empted active command {active}")]
    CommandInProgress { active: CommandId, incoming: CommandId },

    /// Command rejected before entering the queue
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The awaited command was cancelled by a stop signal
    #[error("command {0} was cancelled")]
    Cancelled(CommandId),

    /// The control loop is no longer running
    #[error("control loop stopped")]
    LoopStopped,
}

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
