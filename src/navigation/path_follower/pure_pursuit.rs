//! Pure Pursuit lookahead tracking

use std::sync::Arc;

use super::Path;
use crate::common::{angle_error, Point, Pose};

/// Tracks progress along a path and picks the lookahead point.
///
/// Both the closest-point index and the lookahead index only move forward,
/// so an overshoot can't make the robot latch onto an earlier part of the
/// path.
#[derive(Debug, Clone)]
pub struct PurePursuit {
    path: Arc<Path>,
    lookahead: f64,
    // None until the first search
    nearest_index: Option<usize>,
    target_index: usize,
}

impl PurePursuit {
    pub fn new(path: Arc<Path>, lookahead: f64) -> Self {
        PurePursuit {
            path,
            lookahead,
            nearest_index: None,
            target_index: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn nearest_index(&self) -> Option<usize> {
        self.nearest_index
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    /// Whether the lookahead point has reached the final waypoint
    pub fn at_end(&self) -> bool {
        !self.path.is_empty() && self.target_index + 1 >= self.path.len()
    }

    /// Remaining distance: straight to the lookahead point, then along
    /// the path to the end
    pub fn remaining(&self, position: Point) -> f64 {
        let points = self.path.points();
        match points.get(self.target_index) {
            Some(target) => position.distance(target) + self.path.length_from(self.target_index),
            None => 0.0,
        }
    }

    fn search_nearest(&mut self, position: Point) -> usize {
        let points = self.path.points();
        let nearest = match self.nearest_index {
            None => {
                let mut d_min = f64::MAX;
                let mut ind_min = 0;
                for (i, point) in points.iter().enumerate() {
                    let d = position.distance(point);
                    if d < d_min {
                        d_min = d;
                        ind_min = i;
                    }
                }
                ind_min
            }
            Some(mut ind) => {
                // walk forward while the next point is no farther away
                let mut distance_this = position.distance(&points[ind]);
                while ind + 1 < points.len() {
                    let distance_next = position.distance(&points[ind + 1]);
                    if distance_this < distance_next {
                        break;
                    }
                    ind += 1;
                    distance_this = distance_next;
                }
                ind
            }
        };
        self.nearest_index = Some(nearest);
        nearest
    }

    /// Advance the search for the current position and return the
    /// lookahead point. Returns `None` for an empty path.
    pub fn update(&mut self, position: Point) -> Option<Point> {
        if self.path.is_empty() {
            return None;
        }
        let nearest = self.search_nearest(position);

        let path = Arc::clone(&self.path);
        let points = path.points();
        let mut target = nearest;
        while target + 1 < points.len() && position.distance(&points[target]) < self.lookahead {
            target += 1;
        }
        self.target_index = self.target_index.max(target);

        Some(self.path.points()[self.target_index])
    }

    /// Signed curvature of the arc from `pose` through `target`.
    /// Positive curves to the left.
    pub fn curvature(pose: &Pose, target: Point) -> f64 {
        let chord = pose.position().distance(&target);
        if chord < 1e-9 {
            return 0.0;
        }
        let alpha = angle_error(pose.position().angle_to(&target), pose.heading);
        2.0 * alpha.sin() / chord
    }
}
