use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chassis_core::control::MotionCommand;
use chassis_core::perception::{SimConfig, SimulatedDrivetrain};
use chassis_core::{Chassis, ChassisConfig, CompetitionMode, MotionError, Path, Point, Pose};

/// Field headings in the routine are compass degrees: 0 faces +y,
/// clockwise positive
fn compass(x: f64, y: f64, degrees: f64) -> Pose {
    Pose::from_degrees(x, y, 90.0 - degrees)
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Pneumatic wings and intake roller; the simulation only logs them
#[derive(Default)]
struct Mechanisms {
    wings: bool,
    intake: i32,
}

impl Mechanisms {
    fn wings(&mut self, extended: bool) {
        if self.wings != extended {
            log::info!("Wings {}", if extended { "out" } else { "in" });
        }
        self.wings = extended;
    }

    fn intake(&mut self, power: i32) {
        if self.intake != power {
            log::info!("Intake power {}", power);
        }
        self.intake = power;
    }
}

fn path_under_hang() -> Arc<Path> {
    Arc::new(Path::from(vec![
        (11.0, -20.0),
        (14.0, -32.0),
        (20.0, -44.0),
        (30.0, -54.0),
        (42.0, -58.0),
        (56.0, -59.0),
        (70.0, -59.0),
        (82.0, -56.0),
        (90.0, -48.0),
    ]))
}

fn path_curve_goal() -> Arc<Path> {
    Arc::new(Path::from(vec![
        (30.0, -58.0),
        (42.0, -58.0),
        (52.0, -55.0),
        (59.0, -48.0),
        (62.0, -40.0),
        (62.0, -32.0),
    ]))
}

// A waypoint that got cancelled ends the routine; anything else keeps going
fn check(result: chassis_core::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(MotionError::Cancelled(id)) => {
            log::warn!("Routine stopped: command {} was cancelled", id);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn autonomous(chassis: &Chassis, mech: &mut Mechanisms) -> Result<()> {
    chassis.set_pose(compass(33.0, -53.0, 0.0))?;

    mech.wings(true);
    chassis.move_to_pose(compass(11.0, -4.0, 309.0), ms(1000))?;
    if !check(chassis.wait_until(1.0).await)? {
        return Ok(());
    }
    mech.wings(false);
    mech.intake(127);

    chassis.move_to_pose(compass(41.0, -4.0, 90.0), ms(800))?;
    if !check(chassis.wait_until(2.0).await)? {
        return Ok(());
    }
    mech.wings(true);
    if !check(chassis.wait_until(4.0).await)? {
        return Ok(());
    }
    mech.intake(-127);

    chassis.enqueue(MotionCommand::move_to_point(Point::new(20.0, -4.0), ms(600)).reversed())?;
    mech.wings(false);

    chassis.move_to_pose(compass(11.0, -20.0, 240.0), ms(700))?;
    mech.intake(127);

    chassis.follow(path_under_hang(), Some(15.0), ms(3500))?;
    if !check(chassis.wait_until(35.0).await)? {
        return Ok(());
    }
    mech.intake(-127);
    if !check(chassis.wait_until(40.0).await)? {
        return Ok(());
    }
    mech.intake(127);

    chassis.enqueue(MotionCommand::move_to_point(Point::new(30.0, -58.0), ms(300)).reversed())?;
    chassis.turn_to_point(Point::new(40.0, -58.0), ms(600))?;

    let curve = path_curve_goal();
    chassis.follow(curve.clone(), Some(10.0), ms(3000))?;
    chassis.enqueue(MotionCommand::follow_path(curve, 10.0, ms(3000)).reversed())?;
    chassis.enqueue(MotionCommand::move_to_point(Point::new(8.0, -58.0), ms(300)).reversed())?;

    check(chassis.wait_until_done().await)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => ChassisConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ChassisConfig::default(),
    };

    let sim = SimulatedDrivetrain::new(
        SimConfig {
            track_width: config.drivetrain.track_width,
            step: config.control_loop.period(),
            ..SimConfig::default()
        },
        compass(33.0, -53.0, 0.0),
    );
    let (chassis, control_loop) = Chassis::new(sim, config, Pose::default());
    let loop_task = tokio::spawn(control_loop.run());

    let telemetry = {
        let mut state = chassis.subscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ms(50));
            loop {
                interval.tick().await;
                if state.has_changed().is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                log::info!(
                    "Chassis pose: {} active: {:?} queued: {}",
                    snapshot.pose,
                    snapshot.active.map(|a| a.id),
                    snapshot.queued
                );
            }
        })
    };

    chassis.set_mode(CompetitionMode::Autonomous);
    let mut mech = Mechanisms::default();
    let started = tokio::time::Instant::now();
    autonomous(&chassis, &mut mech).await?;
    log::info!(
        "Autonomous finished in {}ms",
        started.elapsed().as_millis()
    );

    for report in &chassis.state().recent {
        log::info!(
            "{} {} {} in {}ms, {:.1} travelled",
            report.id,
            report.kind,
            report.outcome,
            report.elapsed.as_millis(),
            report.distance
        );
    }

    chassis.set_mode(CompetitionMode::Disabled);
    drop(chassis);
    let sim = loop_task.await.context("control loop task failed")?;
    telemetry.await.context("telemetry task failed")?;
    log::info!("Final true pose: {}", sim.true_pose());
    Ok(())
}
