//! Fixed-period control loop: the single writer of pose and execution state

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use super::commands::{CommandReport, Outcome, QueuedCommand};
use super::controllers::DriveOutput;
use super::executor::MotionExecutor;
use super::sync::{CancelledIds, ExecutionState, Request};
use crate::common::Pose;
use crate::config::ChassisConfig;
use crate::lifecycle::CompetitionMode;
use crate::perception::{Hardware, PoseEstimator};

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub pose: Pose,
    pub output: DriveOutput,
    pub pose_trusted: bool,
    /// Commands that reached a terminal outcome on this tick
    pub finished: Vec<CommandReport>,
}

/// Owns the hardware, the estimator and the executor.
///
/// Created together with a [`crate::Chassis`] handle by
/// [`crate::Chassis::new`]. Drive it with [`ControlLoop::run`] on a tokio
/// runtime, or tick it by hand with [`ControlLoop::step`].
pub struct ControlLoop<H: Hardware> {
    hardware: H,
    period: Duration,
    max_untrusted_ticks: u32,
    report_history: usize,
    deadband: f64,
    output_slew: f64,
    estimator: PoseEstimator,
    executor: MotionExecutor,
    queue: VecDeque<QueuedCommand>,
    requests: mpsc::UnboundedReceiver<Request>,
    mode: watch::Receiver<CompetitionMode>,
    state: watch::Sender<ExecutionState>,
    tank: DriveOutput,
    // last output sent to the hardware
    applied: DriveOutput,
    untrusted_ticks: u32,
    ticks: u64,
    completed: u64,
    recent: VecDeque<CommandReport>,
    cancelled: CancelledIds,
    closed: bool,
}

impl<H: Hardware> ControlLoop<H> {
    pub(crate) fn new(
        hardware: H,
        config: &ChassisConfig,
        initial: Pose,
        requests: mpsc::UnboundedReceiver<Request>,
        mode: watch::Receiver<CompetitionMode>,
        state: watch::Sender<ExecutionState>,
    ) -> Self {
        ControlLoop {
            hardware,
            period: config.control_loop.period(),
            max_untrusted_ticks: config.control_loop.max_untrusted_ticks,
            report_history: config.control_loop.report_history.max(1),
            deadband: config.driver.deadband,
            output_slew: config.drivetrain.slew,
            estimator: PoseEstimator::new(initial),
            executor: MotionExecutor::new(config),
            queue: VecDeque::new(),
            requests,
            mode,
            state,
            tank: DriveOutput::STOPPED,
            applied: DriveOutput::STOPPED,
            untrusted_ticks: 0,
            ticks: 0,
            completed: 0,
            recent: VecDeque::new(),
            cancelled: CancelledIds::default(),
            closed: false,
        }
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn pose(&self) -> Pose {
        self.estimator.pose()
    }

    /// True once every `Chassis` handle has been dropped
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run one tick covering `dt` of elapsed time
    pub fn step(&mut self, dt: Duration) -> TickReport {
        self.ticks += 1;
        let mode = *self.mode.borrow_and_update();
        let mut finished = Vec::new();

        if !mode.is_enabled() {
            self.cancel_all(&mut finished);
        }
        if !mode.accepts_driver_input() {
            self.tank = DriveOutput::STOPPED;
        }
        self.apply_requests(mode, &mut finished);

        let pose_trusted = self.estimate(dt);
        let pose = self.estimator.pose();

        if mode.is_enabled() && !self.executor.is_active() {
            if let Some(next) = self.queue.pop_front() {
                if let Err(e) = self.executor.begin(next) {
                    log::warn!("ControlLoop: {}", e);
                }
            }
        }

        let motion = self.executor.tick(&pose, dt);
        finished.extend(self.executor.drain_finished());

        let target = if !mode.is_enabled() || !pose_trusted {
            DriveOutput::STOPPED
        } else if !self.executor.is_active() && !motion.done && mode.accepts_driver_input() {
            self.tank
        } else {
            motion.drive
        };
        // Stops apply at once, everything else ramps from the last output
        let output = if target.is_stopped() {
            target
        } else {
            self.applied.slew_toward(target, self.output_slew)
        };
        self.applied = output;
        self.hardware.set_drive(output);

        for report in &finished {
            self.record(*report);
        }
        self.publish(pose, mode, pose_trusted, output);
        log::trace!(
            "ControlLoop: tick {} pose={} left={:.3} right={:.3}",
            self.ticks,
            pose,
            output.left,
            output.right
        );

        TickReport {
            pose,
            output,
            pose_trusted,
            finished,
        }
    }

    /// Tick every period until all `Chassis` handles are dropped, then
    /// zero the drive and hand the hardware back.
    pub async fn run(mut self) -> H {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        let mut last = Instant::now();
        log::info!(
            "ControlLoop: running {} every {}ms",
            self.hardware.name(),
            self.period.as_millis()
        );

        while !self.closed {
            interval.tick().await;
            let now = Instant::now();
            self.step(now - last);
            last = now;
        }

        self.hardware.set_drive(DriveOutput::STOPPED);
        log::info!("ControlLoop: all handles dropped, drive stopped");
        self.hardware
    }

    fn apply_requests(&mut self, mode: CompetitionMode, finished: &mut Vec<CommandReport>) {
        loop {
            let request = match self.requests.try_recv() {
                Ok(request) => request,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            };
            match request {
                Request::Enqueue(queued) if !mode.is_enabled() => {
                    log::warn!(
                        "ControlLoop: {} {} cancelled, robot is {}",
                        queued.command.kind(),
                        queued.id,
                        mode
                    );
                    finished.push(unstarted(&queued, Outcome::Cancelled));
                }
                Request::Enqueue(queued) => {
                    log::debug!("ControlLoop: queued {} {}", queued.command.kind(), queued.id);
                    self.queue.push_back(queued);
                }
                Request::Interrupt(queued) if !mode.is_enabled() => {
                    finished.push(unstarted(&queued, Outcome::Cancelled));
                }
                Request::Interrupt(queued) => {
                    let id = queued.id;
                    if let Err(e) = self.executor.begin(queued) {
                        log::info!("ControlLoop: interrupt {}", e);
                    }
                    finished.extend(self.executor.drain_finished());
                    for dropped in self.queue.drain(..) {
                        finished.push(unstarted(&dropped, Outcome::Preempted));
                    }
                    log::info!("ControlLoop: {} took over", id);
                }
                Request::Cancel => self.cancel_all(finished),
                Request::ResetPose(pose) => {
                    log::info!("ControlLoop: pose reset to {}", pose);
                    self.estimator.reset(pose);
                    self.executor.reset_distance();
                }
                Request::Tank { left, right } if mode.accepts_driver_input() => {
                    self.tank = DriveOutput::new(self.shape(left), self.shape(right));
                }
                Request::Tank { .. } => {}
            }
        }
    }

    fn shape(&self, stick: f64) -> f64 {
        if !stick.is_finite() || stick.abs() < self.deadband {
            0.0
        } else {
            stick.clamp(-1.0, 1.0)
        }
    }

    fn cancel_all(&mut self, finished: &mut Vec<CommandReport>) {
        if self.executor.cancel().is_some() {
            finished.extend(self.executor.drain_finished());
        }
        for queued in self.queue.drain(..) {
            finished.push(unstarted(&queued, Outcome::Cancelled));
        }
    }

    // Returns whether the pose can be trusted for driving this tick
    fn estimate(&mut self, dt: Duration) -> bool {
        let result = self
            .hardware
            .read_sensors()
            .and_then(|sample| self.estimator.update(dt.as_secs_f64(), &sample));
        match result {
            Ok(_) => {
                if self.untrusted_ticks > self.max_untrusted_ticks {
                    log::info!("ControlLoop: sensors recovered");
                }
                self.untrusted_ticks = 0;
                true
            }
            Err(e) => {
                self.untrusted_ticks += 1;
                log::warn!(
                    "ControlLoop: estimation skipped ({} in a row): {}",
                    self.untrusted_ticks,
                    e
                );
                self.untrusted_ticks <= self.max_untrusted_ticks
            }
        }
    }

    fn record(&mut self, report: CommandReport) {
        self.completed += 1;
        if report.outcome == Outcome::Cancelled {
            self.cancelled.insert(report.id);
        }
        while self.recent.len() >= self.report_history {
            self.recent.pop_front();
        }
        self.recent.push_back(report);
    }

    fn publish(&self, pose: Pose, mode: CompetitionMode, pose_trusted: bool, output: DriveOutput) {
        self.state.send_replace(ExecutionState {
            pose,
            mode,
            active: self.executor.active(),
            queued: self.queue.len(),
            completed_count: self.completed,
            ticks: self.ticks,
            pose_trusted,
            output,
            recent: self.recent.clone(),
            cancelled: self.cancelled.clone(),
        });
    }
}

fn unstarted(queued: &QueuedCommand, outcome: Outcome) -> CommandReport {
    CommandReport {
        id: queued.id,
        kind: queued.command.kind(),
        outcome,
        elapsed: Duration::ZERO,
        distance: 0.0,
    }
}
