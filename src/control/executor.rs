//! Motion executor: runs one command at a time against the current pose

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::Duration;

use nalgebra::{Rotation2, Vector2};

use super::commands::{
    CommandId, CommandReport, Direction, MotionCommand, MotionKind, MotionTarget, Outcome,
    QueuedCommand, TurnTarget,
};
use super::controllers::{DriveOutput, PdController};
use crate::common::{angle_error, normalize_angle, Point, Pose};
use crate::config::ChassisConfig;
use crate::error::{MotionError, Result};
use crate::navigation::path_follower::PurePursuit;

/// Result of one executor tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorOutput {
    pub drive: DriveOutput,
    /// The active command terminated on this tick
    pub done: bool,
    /// Distance moved since the previous tick
    pub distance_delta: f64,
    /// Set together with `done`
    pub outcome: Option<Outcome>,
}

impl ExecutorOutput {
    fn idle() -> Self {
        ExecutorOutput {
            drive: DriveOutput::STOPPED,
            done: false,
            distance_delta: 0.0,
            outcome: None,
        }
    }
}

/// Progress of the active command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveStatus {
    pub id: CommandId,
    pub kind: MotionKind,
    pub elapsed: Duration,
    pub distance: f64,
}

#[derive(Debug)]
struct ActiveMotion {
    id: CommandId,
    command: MotionCommand,
    elapsed: Duration,
    distance: f64,
    last_position: Option<Point>,
    pursuit: Option<PurePursuit>,
}

impl ActiveMotion {
    fn new(queued: QueuedCommand) -> Self {
        let pursuit = match &queued.command.target {
            MotionTarget::FollowPath { path, lookahead } => {
                Some(PurePursuit::new(path.clone(), *lookahead))
            }
            _ => None,
        };
        ActiveMotion {
            id: queued.id,
            command: queued.command,
            elapsed: Duration::ZERO,
            distance: 0.0,
            last_position: None,
            pursuit,
        }
    }

    fn report(&self, outcome: Outcome) -> CommandReport {
        CommandReport {
            id: self.id,
            kind: self.command.kind(),
            outcome,
            elapsed: self.elapsed,
            distance: self.distance,
        }
    }
}

// What a control law asks for on one tick
struct Demand {
    drive: DriveOutput,
    settled: bool,
}

/// Executes motion commands one at a time.
///
/// Starting a command while another is active pre-empts the running one.
/// Every command that leaves the executor produces a [`CommandReport`],
/// collected with [`MotionExecutor::drain_finished`].
#[derive(Debug)]
pub struct MotionExecutor {
    linear: PdController,
    angular: PdController,
    max_power: f64,
    track_width: f64,
    lead: f64,
    close_distance: f64,
    active: Option<ActiveMotion>,
    finished: VecDeque<CommandReport>,
}

impl MotionExecutor {
    pub fn new(config: &ChassisConfig) -> Self {
        MotionExecutor {
            linear: PdController::new(config.linear),
            angular: PdController::new(config.angular),
            max_power: config.drivetrain.max_power,
            track_width: config.drivetrain.track_width,
            lead: config.motion.lead,
            close_distance: config.motion.close_distance,
            active: None,
            finished: VecDeque::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<ActiveStatus> {
        self.active.as_ref().map(|a| ActiveStatus {
            id: a.id,
            kind: a.command.kind(),
            elapsed: a.elapsed,
            distance: a.distance,
        })
    }

    /// Lookahead index of an active follow-path command
    pub fn lookahead_index(&self) -> Option<usize> {
        self.active
            .as_ref()
            .and_then(|a| a.pursuit.as_ref())
            .map(PurePursuit::target_index)
    }

    /// Start `next`.
    ///
    /// If a command is already running it is pre-empted: it finishes with
    /// [`Outcome::Preempted`], `next` becomes active, and
    /// [`MotionError::CommandInProgress`] is returned for the caller to log.
    pub fn begin(&mut self, next: QueuedCommand) -> Result<()> {
        let incoming = next.id;
        log::info!(
            "Executor: starting {} {} (timeout {}ms)",
            next.command.kind(),
            incoming,
            next.command.timeout.as_millis()
        );
        let previous = self.active.replace(ActiveMotion::new(next));
        self.linear.reset();
        self.angular.reset();

        match previous {
            Some(previous) => {
                self.finished.push_back(previous.report(Outcome::Preempted));
                Err(MotionError::CommandInProgress {
                    active: previous.id,
                    incoming,
                })
            }
            None => Ok(()),
        }
    }

    /// Abort the active command with [`Outcome::Cancelled`]
    pub fn cancel(&mut self) -> Option<CommandId> {
        let id = self.active.as_ref().map(|a| a.id)?;
        self.finish(Outcome::Cancelled);
        Some(id)
    }

    /// Restart distance accounting after the pose was overwritten
    pub fn reset_distance(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.distance = 0.0;
            active.last_position = None;
        }
    }

    /// Reports of commands that left the executor since the last call
    pub fn drain_finished(&mut self) -> Vec<CommandReport> {
        self.finished.drain(..).collect()
    }

    /// Advance the active command by `dt` with the latest pose.
    ///
    /// Termination is checked in order: within tolerance (`Settled`), then
    /// elapsed time at or past the timeout (`TimedOut`).
    pub fn tick(&mut self, pose: &Pose, dt: Duration) -> ExecutorOutput {
        let dt_s = dt.as_secs_f64();
        let Some(active) = self.active.as_mut() else {
            return ExecutorOutput::idle();
        };

        active.elapsed += dt;
        let position = pose.position();
        let distance_delta = active
            .last_position
            .map(|last| last.distance(&position))
            .unwrap_or(0.0);
        active.last_position = Some(position);
        active.distance += distance_delta;

        let reverse = active.command.direction == Direction::Reverse;
        // reverse motions are computed for a robot facing backwards
        let effective = if reverse { pose.flipped() } else { *pose };
        let limit = active
            .command
            .max_speed
            .unwrap_or(1.0)
            .min(self.max_power);
        let tolerances = active.command.tolerances;
        let timed_out = active.elapsed >= active.command.timeout;

        let demand = match &active.command.target {
            MotionTarget::MoveToPoint(target) => {
                let distance = effective.position().distance(target);
                let heading_error =
                    angle_error(effective.position().angle_to(target), effective.heading);
                // hold heading near the target so the bearing can't whip around
                let turn_error = if distance < self.close_distance {
                    0.0
                } else {
                    heading_error
                };
                let linear =
                    self.linear
                        .update_bounded(distance * heading_error.cos(), dt_s, limit);
                let angular = self.angular.update_bounded(turn_error, dt_s, limit);
                Demand {
                    drive: DriveOutput::from_arcade(linear, angular, limit),
                    settled: distance <= tolerances.linear,
                }
            }
            MotionTarget::MoveToPose(target) => {
                let goal_heading = if reverse {
                    normalize_angle(target.heading + PI)
                } else {
                    target.heading
                };
                let goal = target.position();
                let distance = effective.position().distance(&goal);
                let final_error = angle_error(goal_heading, effective.heading);

                let (linear_error, turn_error) = if distance > self.close_distance {
                    // boomerang: chase a carrot set back from the goal along its heading
                    let offset =
                        Rotation2::new(goal_heading) * Vector2::new(self.lead * distance, 0.0);
                    let carrot = Point::new(goal.x - offset.x, goal.y - offset.y);
                    let carrot_error =
                        angle_error(effective.position().angle_to(&carrot), effective.heading);
                    (distance * carrot_error.cos(), carrot_error)
                } else {
                    let bearing_error =
                        angle_error(effective.position().angle_to(&goal), effective.heading);
                    (distance * bearing_error.cos(), final_error)
                };
                let linear = self.linear.update_bounded(linear_error, dt_s, limit);
                let angular = self.angular.update_bounded(turn_error, dt_s, limit);
                Demand {
                    drive: DriveOutput::from_arcade(linear, angular, limit),
                    settled: distance <= tolerances.linear
                        && final_error.abs() <= tolerances.angular,
                }
            }
            MotionTarget::TurnTo(turn) => {
                let goal_heading = match turn {
                    TurnTarget::Point(point) => effective.position().angle_to(point),
                    TurnTarget::Heading(heading) => normalize_angle(*heading),
                };
                let error = angle_error(goal_heading, effective.heading);
                let linear = self.linear.follow(0.0);
                let angular = self.angular.update_bounded(error, dt_s, limit);
                Demand {
                    drive: DriveOutput::from_arcade(linear, angular, limit),
                    settled: error.abs() <= tolerances.angular,
                }
            }
            MotionTarget::FollowPath { .. } => {
                let position = effective.position();
                let tracked = active.pursuit.as_mut().and_then(|pursuit| {
                    let lookahead_point = pursuit.update(position)?;
                    let end = pursuit.path().last()?;
                    Some((lookahead_point, end, pursuit.at_end(), pursuit.remaining(position)))
                });
                match tracked {
                    Some((lookahead_point, end, at_end, remaining)) => {
                        let curvature = PurePursuit::curvature(&effective, lookahead_point);
                        let linear = self.linear.update_bounded(remaining, dt_s, limit);
                        let angular = linear * curvature * self.track_width / 2.0;
                        Demand {
                            drive: DriveOutput::from_arcade(linear, angular, limit),
                            settled: at_end && position.distance(&end) <= tolerances.linear,
                        }
                    }
                    // nothing left to track
                    None => Demand {
                        drive: DriveOutput::STOPPED,
                        settled: true,
                    },
                }
            }
        };

        if demand.settled {
            return self.terminate(Outcome::Settled, distance_delta);
        }
        if timed_out {
            return self.terminate(Outcome::TimedOut, distance_delta);
        }

        let drive = if reverse { demand.drive.reversed() } else { demand.drive };
        log::trace!(
            "Executor: left={:.3} right={:.3} pose={}",
            drive.left,
            drive.right,
            pose
        );
        ExecutorOutput {
            drive,
            done: false,
            distance_delta,
            outcome: None,
        }
    }

    fn terminate(&mut self, outcome: Outcome, distance_delta: f64) -> ExecutorOutput {
        self.finish(outcome);
        ExecutorOutput {
            drive: DriveOutput::STOPPED,
            done: true,
            distance_delta,
            outcome: Some(outcome),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        if let Some(active) = self.active.take() {
            let report = active.report(outcome);
            log::info!(
                "Executor: {} {} {} after {}ms, {:.2} travelled",
                report.kind,
                report.id,
                outcome,
                report.elapsed.as_millis(),
                report.distance
            );
            self.finished.push_back(report);
        }
        self.linear.reset();
        self.angular.reset();
    }
}
