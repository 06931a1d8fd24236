//! Controllers for the differential drive

use crate::config::ControllerSettings;

/// Left/right drive power, normalized to `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveOutput {
    pub left: f64,
    pub right: f64,
}

impl DriveOutput {
    pub const STOPPED: DriveOutput = DriveOutput { left: 0.0, right: 0.0 };

    pub fn new(left: f64, right: f64) -> Self {
        DriveOutput { left, right }
    }

    /// Mix forward and turning power (positive turns left, CCW).
    ///
    /// If either side would exceed `max_power`, both are scaled down together
    /// so the turn ratio is preserved.
    pub fn from_arcade(linear: f64, angular: f64, max_power: f64) -> Self {
        let left = linear - angular;
        let right = linear + angular;
        let largest = left.abs().max(right.abs());
        if largest > max_power && largest > 0.0 {
            let scale = max_power / largest;
            DriveOutput::new(left * scale, right * scale)
        } else {
            DriveOutput::new(left, right)
        }
    }

    /// Swap sides and negate, turning outputs computed for a robot facing
    /// backwards into outputs for the real robot
    pub fn reversed(self) -> Self {
        DriveOutput::new(-self.right, -self.left)
    }

    /// Step each side toward `target` by at most `max_step`
    pub fn slew_toward(self, target: DriveOutput, max_step: f64) -> Self {
        DriveOutput::new(
            slew(self.left, target.left, max_step),
            slew(self.right, target.right, max_step),
        )
    }

    pub fn is_stopped(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }
}

/// Move `current` toward `target` by at most `max_step`
pub fn slew(current: f64, target: f64, max_step: f64) -> f64 {
    current + (target - current).clamp(-max_step, max_step)
}

/// Proportional-derivative controller on a single error signal
#[derive(Debug, Clone)]
pub struct PdController {
    settings: ControllerSettings,
    prev_error: Option<f64>,
    output: f64,
}

impl PdController {
    pub fn new(settings: ControllerSettings) -> Self {
        PdController {
            settings,
            prev_error: None,
            output: 0.0,
        }
    }

    /// Compute the raw PD output for `error` over a step of `dt_s` seconds.
    /// The derivative term is zero on the first update after a reset.
    pub fn update(&mut self, error: f64, dt_s: f64) -> f64 {
        let derivative = match self.prev_error {
            Some(prev) if dt_s > 0.0 => (error - prev) / dt_s,
            _ => 0.0,
        };
        self.prev_error = Some(error);
        self.settings.kp * error + self.settings.kd * derivative
    }

    /// PD output clamped to `±limit`, then slew-limited against the
    /// previous output
    pub fn update_bounded(&mut self, error: f64, dt_s: f64, limit: f64) -> f64 {
        let raw = self.update(error, dt_s).clamp(-limit, limit);
        self.output = slew(self.output, raw, self.settings.slew);
        self.output
    }

    /// Slew toward a feed-forward value without touching the PD state
    pub fn follow(&mut self, target: f64) -> f64 {
        self.output = slew(self.output, target, self.settings.slew);
        self.output
    }

    pub fn reset(&mut self) {
        self.prev_error = None;
        self.output = 0.0;
    }
}
