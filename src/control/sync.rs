//! State shared between the control loop and its callers.
//!
//! The loop is the only writer. It publishes a complete [`ExecutionState`]
//! on a watch channel after every tick; callers block on that channel
//! instead of polling.

use std::collections::VecDeque;

use tokio::sync::watch;

use super::commands::{CommandId, CommandReport, QueuedCommand};
use super::controllers::DriveOutput;
use super::executor::ActiveStatus;
use crate::common::Pose;
use crate::error::{MotionError, Result};
use crate::lifecycle::CompetitionMode;

/// Messages from [`crate::Chassis`] handles to the loop
#[derive(Debug, Clone)]
pub enum Request {
    Enqueue(QueuedCommand),
    /// Drop queued work and pre-empt the active command
    Interrupt(QueuedCommand),
    /// Cancel the active command and everything queued
    Cancel,
    ResetPose(Pose),
    /// Driver stick values in `[-1, 1]`
    Tank { left: f64, right: f64 },
}

/// Snapshot published by the loop once per tick
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState {
    pub pose: Pose,
    pub mode: CompetitionMode,
    pub active: Option<ActiveStatus>,
    pub queued: usize,
    /// Commands that reached a terminal outcome, in id order
    pub completed_count: u64,
    pub ticks: u64,
    /// False while sensor reads keep failing
    pub pose_trusted: bool,
    pub output: DriveOutput,
    /// Most recent terminal reports, oldest first
    pub recent: VecDeque<CommandReport>,
    /// Every command that ended `Cancelled`, kept past the report history
    pub cancelled: CancelledIds,
}

/// Set of cancelled command ids stored as merged inclusive ranges.
///
/// A stop cancels a run of consecutive ids, so this grows by one range per
/// stop rather than per command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancelledIds {
    ranges: Vec<(u64, u64)>,
}

impl CancelledIds {
    /// Ids must be inserted in increasing order, which completion order
    /// guarantees.
    pub fn insert(&mut self, id: CommandId) {
        match self.ranges.last_mut() {
            Some((_, end)) if id.0 <= *end => {}
            Some((_, end)) if id.0 == *end + 1 => *end = id.0,
            _ => self.ranges.push((id.0, id.0)),
        }
    }

    pub fn contains(&self, id: CommandId) -> bool {
        let after = self.ranges.partition_point(|&(start, _)| start <= id.0);
        after > 0 && id.0 <= self.ranges[after - 1].1
    }
}

impl ExecutionState {
    pub fn new(pose: Pose, mode: CompetitionMode) -> Self {
        ExecutionState {
            pose,
            mode,
            active: None,
            queued: 0,
            completed_count: 0,
            ticks: 0,
            pose_trusted: true,
            output: DriveOutput::STOPPED,
            recent: VecDeque::new(),
            cancelled: CancelledIds::default(),
        }
    }

    /// Ids are handed out from 1 and complete in order, so `id` is done
    /// once the completed count reaches it.
    pub fn is_finished(&self, id: CommandId) -> bool {
        self.completed_count >= id.0
    }

    /// Terminal report for `id`, if still in the recent history
    pub fn report(&self, id: CommandId) -> Option<&CommandReport> {
        self.recent.iter().rev().find(|report| report.id == id)
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queued == 0
    }

    fn gate(&self, condition: &WaitCondition) -> Gate {
        let open = match *condition {
            WaitCondition::DistanceThreshold { id, distance } => {
                let reached = self
                    .active
                    .is_some_and(|active| active.id == id && active.distance >= distance);
                if reached {
                    return Gate::Open;
                }
                self.is_finished(id).then_some(id)
            }
            WaitCondition::CommandCountThreshold(count) => {
                (self.completed_count >= count).then_some(CommandId(count))
            }
            WaitCondition::AllDone { last } => {
                (self.is_finished(last) && self.is_idle()).then_some(last)
            }
        };
        match open {
            None => Gate::Pending,
            Some(id) if self.cancelled.contains(id) => Gate::Cancelled(id),
            Some(_) => Gate::Open,
        }
    }
}

/// What a waiter blocks on
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitCondition {
    /// Command `id` has travelled `distance` or terminated
    DistanceThreshold { id: CommandId, distance: f64 },
    /// At least `n` commands have terminated
    CommandCountThreshold(u64),
    /// Everything up to `last` has terminated and the queue is empty
    AllDone { last: CommandId },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gate {
    Pending,
    Open,
    Cancelled(CommandId),
}

/// Block until `condition` holds in a published state
pub(crate) async fn wait_on(
    rx: &mut watch::Receiver<ExecutionState>,
    condition: WaitCondition,
) -> Result<()> {
    let gate = {
        let state = rx
            .wait_for(|state| state.gate(&condition) != Gate::Pending)
            .await
            .map_err(|_| MotionError::LoopStopped)?;
        state.gate(&condition)
    };
    match gate {
        Gate::Cancelled(id) => Err(MotionError::Cancelled(id)),
        _ => Ok(()),
    }
}
