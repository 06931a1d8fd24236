//! Pose estimation from heading and wheel travel

use nalgebra::{Rotation2, Vector2};

use crate::common::{angle_error, normalize_angle, Pose};
use crate::error::{MotionError, Result};
use crate::perception::sensors::SensorSample;

/// Dead-reckoning pose estimator.
///
/// The heading sensor is authoritative for orientation: each update turns
/// the pose by the change in the sensor reading. Position is integrated
/// along the arc swept by the average wheel travel.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    pose: Pose,
    // heading reading of the previous sample; None right after a reset
    reference_heading: Option<f64>,
}

impl PoseEstimator {
    pub fn new(initial: Pose) -> Self {
        PoseEstimator {
            pose: Self::normalized(initial),
            reference_heading: None,
        }
    }

    fn normalized(pose: Pose) -> Pose {
        Pose {
            heading: normalize_angle(pose.heading),
            ..pose
        }
    }

    /// Get the current pose estimate
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Overwrite the pose. The next sample becomes the new heading
    /// reference, so it contributes no rotation.
    pub fn reset(&mut self, pose: Pose) {
        self.pose = Self::normalized(pose);
        self.reference_heading = None;
    }

    /// Fold one sample into the estimate.
    ///
    /// Fails with [`MotionError::StaleSample`] when `dt_s <= 0` and with
    /// [`MotionError::InvalidSample`] on non-finite readings; the pose is
    /// left untouched in both cases.
    pub fn update(&mut self, dt_s: f64, sample: &SensorSample) -> Result<Pose> {
        if !(dt_s > 0.0) {
            return Err(MotionError::StaleSample { dt_s });
        }
        if !sample.is_finite() {
            return Err(MotionError::InvalidSample(format!("{sample:?}")));
        }

        let delta_heading = match self.reference_heading {
            Some(previous) => angle_error(sample.heading, previous),
            None => 0.0,
        };
        self.reference_heading = Some(sample.heading);

        let delta_s = (sample.left_travel + sample.right_travel) / 2.0;
        // straight-line case avoids dividing by a vanishing angle
        let chord = if delta_heading.abs() < 1e-9 {
            delta_s
        } else {
            2.0 * (delta_s / delta_heading) * (delta_heading / 2.0).sin()
        };

        let step =
            Rotation2::new(self.pose.heading + delta_heading / 2.0) * Vector2::new(chord, 0.0);
        self.pose = Pose {
            x: self.pose.x + step.x,
            y: self.pose.y + step.y,
            heading: normalize_angle(self.pose.heading + delta_heading),
        };
        Ok(self.pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::f64::consts::{FRAC_PI_2, PI};

    const DT: f64 = 0.01;

    #[test]
    fn reset_then_zero_travel_round_trips() {
        let mut estimator = PoseEstimator::new(Pose::default());
        estimator.update(DT, &SensorSample::new(0.3, 1.0, 2.0)).unwrap();

        let target = Pose::new(33.0, -53.0, 1.2);
        estimator.reset(target);
        let pose = estimator
            .update(DT, &SensorSample::stationary(-2.5))
            .unwrap();
        assert_eq!(pose, target);
    }

    #[rstest]
    #[case(0.0)]
    #[case(-0.01)]
    #[case(f64::NAN)]
    fn rejects_non_positive_dt(#[case] dt: f64) {
        let mut estimator = PoseEstimator::new(Pose::new(1.0, 2.0, 0.5));
        let result = estimator.update(dt, &SensorSample::new(0.0, 1.0, 1.0));
        assert!(matches!(result, Err(MotionError::StaleSample { .. })));
        assert_eq!(estimator.pose(), Pose::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn rejects_non_finite_sample() {
        let mut estimator = PoseEstimator::new(Pose::default());
        let result = estimator.update(DT, &SensorSample::new(f64::NAN, 1.0, 1.0));
        assert!(matches!(result, Err(MotionError::InvalidSample(_))));
        assert_eq!(estimator.pose(), Pose::default());
    }

    #[test]
    fn straight_travel_follows_heading() {
        let mut estimator = PoseEstimator::new(Pose::new(0.0, 0.0, FRAC_PI_2));
        estimator.update(DT, &SensorSample::stationary(0.0)).unwrap();
        for _ in 0..10 {
            estimator.update(DT, &SensorSample::new(0.0, 1.0, 1.0)).unwrap();
        }
        let pose = estimator.pose();
        assert_relative_eq!(pose.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y, 10.0, epsilon = 1e-9);
        assert_relative_eq!(pose.heading, FRAC_PI_2);
    }

    #[test]
    fn quarter_arc_lands_on_circle() {
        // radius 10 arc to the left, split into 90 samples
        let mut estimator = PoseEstimator::new(Pose::default());
        estimator.update(DT, &SensorSample::stationary(0.0)).unwrap();
        let steps = 90;
        let arc = 10.0 * FRAC_PI_2 / steps as f64;
        for i in 1..=steps {
            let heading = FRAC_PI_2 * i as f64 / steps as f64;
            estimator
                .update(DT, &SensorSample::new(heading, arc, arc))
                .unwrap();
        }
        let pose = estimator.pose();
        assert_relative_eq!(pose.x, 10.0, epsilon = 1e-6);
        assert_relative_eq!(pose.y, 10.0, epsilon = 1e-6);
        assert_relative_eq!(pose.heading, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn heading_wraps_through_pi() {
        let mut estimator = PoseEstimator::new(Pose::new(0.0, 0.0, PI - 0.05));
        estimator.update(DT, &SensorSample::stationary(PI - 0.05)).unwrap();
        let pose = estimator
            .update(DT, &SensorSample::stationary(-PI + 0.05))
            .unwrap();
        assert_relative_eq!(pose.heading, -PI + 0.05, epsilon = 1e-9);
    }

    #[test]
    fn same_history_gives_same_pose() {
        let samples: Vec<SensorSample> = (0..200)
            .map(|i| {
                let t = i as f64 * 0.05;
                SensorSample::new(t.sin(), 0.3 + 0.1 * t.cos(), 0.3 - 0.1 * t.cos())
            })
            .collect();
        let run = || {
            let mut estimator = PoseEstimator::new(Pose::new(5.0, -3.0, 0.2));
            for sample in &samples {
                estimator.update(DT, sample).unwrap();
            }
            estimator.pose()
        };
        assert_eq!(run(), run());
    }
}
