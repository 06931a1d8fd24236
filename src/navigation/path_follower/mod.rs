//! Path following: path representation and the pure pursuit tracker

pub mod pure_pursuit;

pub use pure_pursuit::PurePursuit;

use crate::common::Point;

/// Ordered waypoints for a follow-path command.
///
/// Loaded once and shared read-only (usually behind an `Arc`) for the
/// duration of the commands that follow it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    points: Vec<Point>,
}

impl Path {
    pub fn new(points: Vec<Point>) -> Self {
        Path { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Path length from `index` to the final point
    pub fn length_from(&self, index: usize) -> f64 {
        self.points
            .get(index..)
            .map(|tail| tail.windows(2).map(|w| w[0].distance(&w[1])).sum())
            .unwrap_or(0.0)
    }
}

impl From<Vec<(f64, f64)>> for Path {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Path::new(points.into_iter().map(Point::from).collect())
    }
}
