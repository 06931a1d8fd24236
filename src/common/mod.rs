//! Common utilities and types for the chassis

use std::f64::consts::{PI, TAU};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A point on the field, in the drivetrain's distance unit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Angle of the vector from `self` to `other`, CCW from +x
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point { x, y }
    }
}

/// 2D pose of the robot: position plus heading.
///
/// Heading is in radians, counter-clockwise from the +x axis, and is kept
/// normalized to (-π, π].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    /// Create a pose; the heading is normalized
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Pose {
            x,
            y,
            heading: normalize_angle(heading),
        }
    }

    /// Create a pose with the heading given in degrees
    pub fn from_degrees(x: f64, y: f64, heading_deg: f64) -> Self {
        Self::new(x, y, heading_deg.to_radians())
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Same position, facing the opposite way
    pub fn flipped(&self) -> Pose {
        Pose::new(self.x, self.y, self.heading + PI)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x: {:.2}, y: {:.2}, heading: {:.1}°)",
            self.x,
            self.y,
            self.heading.to_degrees()
        )
    }
}

/// Normalize an angle to (-π, π]
pub fn normalize_angle(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid maps +π onto -π; keep the upper bound inclusive
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Shortest signed rotation taking `from` onto `to`
pub fn angle_error(to: f64, from: f64) -> f64 {
    normalize_angle(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_keeps_upper_bound_inclusive() {
        assert_relative_eq!(normalize_angle(PI), PI);
        assert_relative_eq!(normalize_angle(-PI), PI);
        assert_relative_eq!(normalize_angle(2.5 * PI), 0.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn normalize_wraps_into_range() {
        assert_relative_eq!(normalize_angle(1.5 * PI), -0.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-1.5 * PI), 0.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn angle_error_takes_short_way_round() {
        let err = angle_error(170f64.to_radians(), (-170f64).to_radians());
        assert_relative_eq!(err, (-20f64).to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn flipped_pose_faces_backwards() {
        let pose = Pose::new(1.0, 2.0, 0.0);
        assert_relative_eq!(pose.flipped().heading, PI);
    }
}
