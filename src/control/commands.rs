//! Motion command definitions

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{Point, Pose};
use crate::error::{MotionError, Result};
use crate::navigation::path_follower::Path;

/// Sequence number assigned when a command is enqueued. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which end of the robot leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

/// What a turn should face
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnTarget {
    /// Face a point on the field
    Point(Point),
    /// Face an absolute heading in radians
    Heading(f64),
}

/// Target of a motion command
#[derive(Debug, Clone, PartialEq)]
pub enum MotionTarget {
    MoveToPoint(Point),
    MoveToPose(Pose),
    TurnTo(TurnTarget),
    FollowPath { path: Arc<Path>, lookahead: f64 },
}

/// Command type without its payload, for logs and status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionKind {
    MoveToPoint,
    MoveToPose,
    TurnTo,
    FollowPath,
}

impl fmt::Display for MotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotionKind::MoveToPoint => "move_to_point",
            MotionKind::MoveToPose => "move_to_pose",
            MotionKind::TurnTo => "turn_to",
            MotionKind::FollowPath => "follow_path",
        };
        f.write_str(name)
    }
}

/// Settling band for a command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub linear: f64,
    /// Radians
    pub angular: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            linear: 1.0,
            angular: 1f64.to_radians(),
        }
    }
}

/// A unit of motion work.
///
/// Immutable once enqueued; the executor consumes it exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionCommand {
    pub target: MotionTarget,
    pub timeout: Duration,
    pub tolerances: Tolerances,
    /// Cap on drive power in (0, 1]
    pub max_speed: Option<f64>,
    pub direction: Direction,
}

impl MotionCommand {
    fn with_target(target: MotionTarget, timeout: Duration) -> Self {
        Self {
            target,
            timeout,
            tolerances: Tolerances::default(),
            max_speed: None,
            direction: Direction::Forward,
        }
    }

    pub fn move_to_point(point: Point, timeout: Duration) -> Self {
        Self::with_target(MotionTarget::MoveToPoint(point), timeout)
    }

    pub fn move_to_pose(pose: Pose, timeout: Duration) -> Self {
        Self::with_target(MotionTarget::MoveToPose(pose), timeout)
    }

    pub fn turn_to_point(point: Point, timeout: Duration) -> Self {
        Self::with_target(MotionTarget::TurnTo(TurnTarget::Point(point)), timeout)
    }

    pub fn turn_to_heading(heading: f64, timeout: Duration) -> Self {
        Self::with_target(MotionTarget::TurnTo(TurnTarget::Heading(heading)), timeout)
    }

    pub fn follow_path(path: Arc<Path>, lookahead: f64, timeout: Duration) -> Self {
        Self::with_target(MotionTarget::FollowPath { path, lookahead }, timeout)
    }

    pub fn with_tolerances(mut self, linear: f64, angular: f64) -> Self {
        self.tolerances = Tolerances { linear, angular };
        self
    }

    pub fn with_max_speed(mut self, max_speed: f64) -> Self {
        self.max_speed = Some(max_speed);
        self
    }

    pub fn reversed(mut self) -> Self {
        self.direction = Direction::Reverse;
        self
    }

    pub fn kind(&self) -> MotionKind {
        match self.target {
            MotionTarget::MoveToPoint(_) => MotionKind::MoveToPoint,
            MotionTarget::MoveToPose(_) => MotionKind::MoveToPose,
            MotionTarget::TurnTo(_) => MotionKind::TurnTo,
            MotionTarget::FollowPath { .. } => MotionKind::FollowPath,
        }
    }

    /// Reject malformed commands before they reach the queue
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MotionError::InvalidCommand(msg));

        if self.timeout.is_zero() {
            return invalid(format!("{}: timeout must be positive", self.kind()));
        }
        if !(self.tolerances.linear.is_finite() && self.tolerances.linear > 0.0) {
            return invalid(format!(
                "{}: linear tolerance must be positive, got {}",
                self.kind(),
                self.tolerances.linear
            ));
        }
        if !(self.tolerances.angular.is_finite() && self.tolerances.angular > 0.0) {
            return invalid(format!(
                "{}: angular tolerance must be positive, got {}",
                self.kind(),
                self.tolerances.angular
            ));
        }
        if let Some(speed) = self.max_speed {
            if !(speed.is_finite() && speed > 0.0 && speed <= 1.0) {
                return invalid(format!(
                    "{}: max speed must be within (0, 1], got {speed}",
                    self.kind()
                ));
            }
        }

        match &self.target {
            MotionTarget::MoveToPoint(point) if !point.is_finite() => {
                invalid(format!("move_to_point: non-finite target {point:?}"))
            }
            MotionTarget::MoveToPose(pose) if !pose.is_finite() => {
                invalid(format!("move_to_pose: non-finite target {pose:?}"))
            }
            MotionTarget::TurnTo(TurnTarget::Point(point)) if !point.is_finite() => {
                invalid(format!("turn_to: non-finite target {point:?}"))
            }
            MotionTarget::TurnTo(TurnTarget::Heading(heading)) if !heading.is_finite() => {
                invalid(format!("turn_to: non-finite heading {heading}"))
            }
            MotionTarget::FollowPath { path, lookahead } => {
                if !(lookahead.is_finite() && *lookahead > 0.0) {
                    return invalid(format!(
                        "follow_path: lookahead must be positive, got {lookahead}"
                    ));
                }
                if path.is_empty() {
                    return invalid("follow_path: path has no points".to_string());
                }
                if path.points().iter().any(|p| !p.is_finite()) {
                    return invalid("follow_path: path contains non-finite points".to_string());
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A validated command with its sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub id: CommandId,
    pub command: MotionCommand,
}

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reached the target within tolerance
    Settled,
    /// Ran out of time; the queue moves on
    TimedOut,
    /// Aborted by a stop signal
    Cancelled,
    /// Replaced by an interrupting command
    Preempted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Settled => "settled",
            Outcome::TimedOut => "timed out",
            Outcome::Cancelled => "cancelled",
            Outcome::Preempted => "pre-empted",
        };
        f.write_str(name)
    }
}

/// Record of a finished command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandReport {
    pub id: CommandId,
    pub kind: MotionKind,
    pub outcome: Outcome,
    pub elapsed: Duration,
    pub distance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> Duration {
        Duration::from_millis(1000)
    }

    #[test]
    fn builders_set_fields() {
        let cmd = MotionCommand::move_to_point(Point::new(1.0, 2.0), timeout())
            .with_tolerances(0.5, 0.1)
            .with_max_speed(0.5)
            .reversed();
        assert_eq!(cmd.kind(), MotionKind::MoveToPoint);
        assert_eq!(cmd.direction, Direction::Reverse);
        assert_eq!(cmd.max_speed, Some(0.5));
        assert_eq!(cmd.tolerances, Tolerances { linear: 0.5, angular: 0.1 });
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn rejects_nan_target() {
        let cmd = MotionCommand::move_to_point(Point::new(f64::NAN, 0.0), timeout());
        assert!(matches!(cmd.validate(), Err(MotionError::InvalidCommand(_))));

        let cmd = MotionCommand::turn_to_heading(f64::INFINITY, timeout());
        assert!(matches!(cmd.validate(), Err(MotionError::InvalidCommand(_))));
    }

    #[test]
    fn rejects_zero_timeout_and_bad_speed() {
        let cmd = MotionCommand::move_to_point(Point::new(1.0, 0.0), Duration::ZERO);
        assert!(cmd.validate().is_err());

        let cmd = MotionCommand::move_to_point(Point::new(1.0, 0.0), timeout()).with_max_speed(1.5);
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn rejects_empty_path() {
        let cmd = MotionCommand::follow_path(Arc::new(Path::new(Vec::new())), 10.0, timeout());
        assert!(cmd.validate().is_err());

        let path = Arc::new(Path::new(vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)]));
        let cmd = MotionCommand::follow_path(path, 0.0, timeout());
        assert!(cmd.validate().is_err());
    }
}
