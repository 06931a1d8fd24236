//! Pose tracking and motion sequencing for a differential-drive competition robot.
//!
//! A [`Chassis`] handle enqueues motion commands and waits on their progress.
//! The paired [`ControlLoop`] owns the hardware and is the only writer of the
//! pose estimate and the execution state.
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod perception;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

pub use crate::common::{Point, Pose};
pub use crate::config::ChassisConfig;
pub use crate::control::{
    CommandId, ControlLoop, ExecutionState, MotionCommand, Outcome, WaitCondition,
};
pub use crate::error::{ConfigError, MotionError, Result};
pub use crate::lifecycle::{CompetitionMode, CompetitionSwitch};
pub use crate::navigation::Path;
pub use crate::perception::Hardware;

use crate::config::MotionDefaults;
use crate::control::commands::QueuedCommand;
use crate::control::sync::{self, Request};

struct Inner {
    requests: mpsc::UnboundedSender<Request>,
    // id of the most recently submitted command, 0 before the first
    last_id: Mutex<u64>,
    state: watch::Receiver<ExecutionState>,
    competition: CompetitionSwitch,
    defaults: MotionDefaults,
}

/// Handle to a running chassis. Cheap to clone; the control loop stops
/// once every clone is dropped.
#[derive(Clone)]
pub struct Chassis {
    inner: Arc<Inner>,
}

impl Chassis {
    /// Create a handle and the control loop that serves it.
    ///
    /// The robot starts [`CompetitionMode::Disabled`]; motion commands run
    /// once the mode is switched to autonomous or driver control.
    pub fn new<H: Hardware>(
        hardware: H,
        config: ChassisConfig,
        initial: Pose,
    ) -> (Chassis, ControlLoop<H>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let competition = CompetitionSwitch::new(CompetitionMode::Disabled);
        let (state_tx, state_rx) =
            watch::channel(ExecutionState::new(initial, competition.get()));
        let control_loop = ControlLoop::new(
            hardware,
            &config,
            initial,
            request_rx,
            competition.subscribe(),
            state_tx,
        );
        let chassis = Chassis {
            inner: Arc::new(Inner {
                requests: request_tx,
                last_id: Mutex::new(0),
                state: state_rx,
                competition,
                defaults: config.motion,
            }),
        };
        (chassis, control_loop)
    }

    fn default_tolerances(&self, command: MotionCommand) -> MotionCommand {
        let defaults = &self.inner.defaults;
        command.with_tolerances(defaults.linear_tolerance, defaults.angular_tolerance())
    }

    /// Drive to a point, facing it on the way
    pub fn move_to_point(&self, target: Point, timeout: Duration) -> Result<CommandId> {
        self.enqueue(self.default_tolerances(MotionCommand::move_to_point(target, timeout)))
    }

    /// Drive to a point and finish on the pose's heading
    pub fn move_to_pose(&self, target: Pose, timeout: Duration) -> Result<CommandId> {
        self.enqueue(self.default_tolerances(MotionCommand::move_to_pose(target, timeout)))
    }

    pub fn turn_to_point(&self, target: Point, timeout: Duration) -> Result<CommandId> {
        self.enqueue(self.default_tolerances(MotionCommand::turn_to_point(target, timeout)))
    }

    /// Turn in place to an absolute heading in radians
    pub fn turn_to_heading(&self, heading: f64, timeout: Duration) -> Result<CommandId> {
        self.enqueue(self.default_tolerances(MotionCommand::turn_to_heading(heading, timeout)))
    }

    /// Follow `path` with pure pursuit. A `lookahead` of `None` uses the
    /// configured default.
    pub fn follow(
        &self,
        path: Arc<Path>,
        lookahead: Option<f64>,
        timeout: Duration,
    ) -> Result<CommandId> {
        let lookahead = lookahead.unwrap_or(self.inner.defaults.lookahead);
        self.enqueue(self.default_tolerances(MotionCommand::follow_path(path, lookahead, timeout)))
    }

    /// Validate and append a command; returns without waiting for it to run
    pub fn enqueue(&self, command: MotionCommand) -> Result<CommandId> {
        command.validate()?;
        self.submit(command, Request::Enqueue)
    }

    /// Drop everything queued and pre-empt the active command
    pub fn interrupt(&self, command: MotionCommand) -> Result<CommandId> {
        command.validate()?;
        self.submit(command, Request::Interrupt)
    }

    // ids are assigned under the lock that orders the sends, so they
    // follow enqueue order
    fn submit(
        &self,
        command: MotionCommand,
        wrap: fn(QueuedCommand) -> Request,
    ) -> Result<CommandId> {
        let mut last_id = self
            .inner
            .last_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = CommandId(*last_id + 1);
        self.send(wrap(QueuedCommand { id, command }))?;
        *last_id = id.0;
        Ok(id)
    }

    fn send(&self, request: Request) -> Result<()> {
        self.inner
            .requests
            .send(request)
            .map_err(|_| MotionError::LoopStopped)
    }

    /// Id of the most recently submitted command
    pub fn last_submitted(&self) -> Option<CommandId> {
        let last_id = *self
            .inner
            .last_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (last_id > 0).then_some(CommandId(last_id))
    }

    /// Cancel the active command and everything queued
    pub fn cancel(&self) -> Result<()> {
        self.send(Request::Cancel)
    }

    /// Wait until the most recently submitted command has travelled
    /// `distance` or terminated
    pub async fn wait_until(&self, distance: f64) -> Result<()> {
        match self.last_submitted() {
            Some(id) => {
                self.wait_for(WaitCondition::DistanceThreshold { id, distance })
                    .await
            }
            None => Ok(()),
        }
    }

    /// Wait until every command submitted so far has terminated
    pub async fn wait_until_done(&self) -> Result<()> {
        let last = self.last_submitted().unwrap_or_default();
        self.wait_for(WaitCondition::AllDone { last }).await
    }

    pub async fn wait_for(&self, condition: WaitCondition) -> Result<()> {
        let mut rx = self.inner.state.clone();
        sync::wait_on(&mut rx, condition).await
    }

    /// Overwrite the pose estimate. Applied at the start of the next tick.
    pub fn set_pose(&self, pose: Pose) -> Result<()> {
        self.send(Request::ResetPose(pose))
    }

    /// Latest published pose
    pub fn pose(&self) -> Pose {
        self.inner.state.borrow().pose
    }

    pub fn state(&self) -> ExecutionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.inner.state.clone()
    }

    /// Driver stick input, used in driver control while no command runs
    pub fn tank(&self, left: f64, right: f64) -> Result<()> {
        self.send(Request::Tank { left, right })
    }

    pub fn set_mode(&self, mode: CompetitionMode) {
        self.inner.competition.set(mode);
    }

    pub fn mode(&self) -> CompetitionMode {
        self.inner.competition.get()
    }

    /// Shared switch for whatever owns the competition state
    pub fn competition(&self) -> CompetitionSwitch {
        self.inner.competition.clone()
    }
}
