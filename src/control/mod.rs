//! Motion control: commands, controllers, the executor and the loop that drives it
pub mod commands;
pub mod control_loop;
pub mod controllers;
pub mod executor;
pub mod sync;

pub use self::commands::{
    CommandId, CommandReport, Direction, MotionCommand, MotionKind, MotionTarget, Outcome,
    Tolerances, TurnTarget,
};
pub use self::control_loop::{ControlLoop, TickReport};
pub use self::controllers::{DriveOutput, PdController};
pub use self::executor::{ActiveStatus, ExecutorOutput, MotionExecutor};
pub use self::sync::{ExecutionState, WaitCondition};
