use std::collections::HashSet;
use std::time::Duration;

use chassis_core::control::{ControlLoop, Outcome};
use chassis_core::perception::{SimConfig, SimulatedDrivetrain};
use chassis_core::{
    Chassis, ChassisConfig, CommandId, CompetitionMode, MotionError, Point, Pose, WaitCondition,
};

const PERIOD: Duration = Duration::from_millis(10);

fn rig(config: ChassisConfig) -> (Chassis, ControlLoop<SimulatedDrivetrain>) {
    let sim = SimulatedDrivetrain::new(SimConfig::default(), Pose::default());
    let (chassis, control_loop) = Chassis::new(sim, config, Pose::default());
    chassis.set_mode(CompetitionMode::Autonomous);
    (chassis, control_loop)
}

// let woken waiters run before the next tick
async fn let_waiters_run() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn wait_until_done_unblocks_on_the_settle_tick() {
    let (chassis, mut control_loop) = rig(ChassisConfig::default());
    chassis
        .move_to_point(Point::new(20.0, 0.0), Duration::from_secs(3))
        .unwrap();
    let waiter = tokio::spawn({
        let chassis = chassis.clone();
        async move { chassis.wait_until_done().await }
    });

    for _ in 0..400 {
        let tick = control_loop.step(PERIOD);
        let_waiters_run().await;
        if !tick.finished.is_empty() {
            assert_eq!(tick.finished[0].outcome, Outcome::Settled);
            break;
        }
        assert!(!waiter.is_finished());
    }

    let result = tokio::time::timeout(Duration::from_millis(100), waiter)
        .await
        .expect("waiter still blocked after the command settled")
        .unwrap();
    assert_eq!(result, Ok(()));
}

#[tokio::test]
async fn wait_until_distance_returns_within_one_tick() {
    let (chassis, mut control_loop) = rig(ChassisConfig::default());
    chassis
        .move_to_point(Point::new(48.0, 0.0), Duration::from_secs(3))
        .unwrap();
    let waiter = tokio::spawn({
        let chassis = chassis.clone();
        async move { chassis.wait_until(10.0).await }
    });

    let mut crossed_at = None;
    let mut released_at = None;
    for tick in 0..400 {
        control_loop.step(PERIOD);
        let_waiters_run().await;
        let travelled = chassis.state().active.map_or(f64::MAX, |a| a.distance);
        if crossed_at.is_none() && travelled >= 10.0 {
            crossed_at = Some(tick);
        }
        if waiter.is_finished() {
            released_at = Some(tick);
            break;
        }
    }

    let (crossed_at, released_at) = (crossed_at.unwrap(), released_at.unwrap());
    assert!(released_at >= crossed_at);
    assert!(released_at - crossed_at <= 1);
    assert_eq!(waiter.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn stop_fails_waiters_with_cancelled() {
    let (chassis, mut control_loop) = rig(ChassisConfig::default());
    let id = chassis
        .move_to_point(Point::new(100.0, 0.0), Duration::from_secs(5))
        .unwrap();
    let waiter = tokio::spawn({
        let chassis = chassis.clone();
        async move { chassis.wait_until_done().await }
    });
    for _ in 0..10 {
        control_loop.step(PERIOD);
    }

    chassis.set_mode(CompetitionMode::Disabled);
    let tick = control_loop.step(PERIOD);
    assert!(tick.output.is_stopped());

    let result = tokio::time::timeout(Duration::from_millis(100), waiter)
        .await
        .expect("waiter not released by the stop")
        .unwrap();
    assert_eq!(result, Err(MotionError::Cancelled(id)));
}

#[tokio::test]
async fn cancellation_is_reported_after_leaving_the_history() {
    let mut config = ChassisConfig::default();
    config.control_loop.report_history = 2;
    let (chassis, mut control_loop) = rig(config);
    for _ in 0..5 {
        chassis
            .move_to_point(Point::new(100.0, 0.0), Duration::from_secs(5))
            .unwrap();
    }
    control_loop.step(PERIOD);

    chassis.set_mode(CompetitionMode::Disabled);
    assert_eq!(chassis.mode(), CompetitionMode::Disabled);
    control_loop.step(PERIOD);
    let state = chassis.state();
    assert_eq!(state.completed_count, 5);
    assert!(state.report(CommandId(1)).is_none());

    assert_eq!(
        chassis
            .wait_for(WaitCondition::CommandCountThreshold(1))
            .await,
        Err(MotionError::Cancelled(CommandId(1)))
    );
    assert_eq!(
        chassis.wait_until_done().await,
        Err(MotionError::Cancelled(CommandId(5)))
    );
}

#[tokio::test]
async fn command_count_threshold() {
    let (chassis, mut control_loop) = rig(ChassisConfig::default());
    for heading in [0.5, -0.5, 0.0] {
        chassis
            .turn_to_heading(heading, Duration::from_millis(300))
            .unwrap();
    }
    let waiter = tokio::spawn({
        let chassis = chassis.clone();
        async move {
            chassis
                .wait_for(WaitCondition::CommandCountThreshold(2))
                .await
        }
    });

    for _ in 0..200 {
        control_loop.step(PERIOD);
        let_waiters_run().await;
        if waiter.is_finished() {
            break;
        }
    }
    assert_eq!(waiter.await.unwrap(), Ok(()));
    assert!(chassis.state().completed_count >= 2);
}

#[tokio::test]
async fn waits_with_nothing_submitted_return_at_once() {
    let (chassis, _control_loop) = rig(ChassisConfig::default());
    assert_eq!(chassis.wait_until(5.0).await, Ok(()));
    assert_eq!(chassis.wait_until_done().await, Ok(()));
}

#[tokio::test]
async fn dropped_loop_is_reported() {
    let (chassis, control_loop) = rig(ChassisConfig::default());
    drop(control_loop);
    let result = chassis.move_to_point(Point::new(1.0, 0.0), Duration::from_secs(1));
    assert_eq!(result, Err(MotionError::LoopStopped));
    assert_eq!(chassis.last_submitted(), None);
    assert_eq!(
        chassis
            .wait_for(WaitCondition::CommandCountThreshold(1))
            .await,
        Err(MotionError::LoopStopped)
    );
}

#[tokio::test]
async fn loop_exits_and_stops_drive_when_handles_drop() {
    let (chassis, control_loop) = rig(ChassisConfig::default());
    let handle = tokio::spawn(control_loop.run());
    chassis
        .move_to_point(Point::new(100.0, 0.0), Duration::from_secs(5))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(chassis);

    let sim = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("control loop kept running")
        .unwrap();
    assert!(sim.output().is_stopped());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_keep_one_ordered_queue() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 8;

    let mut config = ChassisConfig::default();
    config.control_loop.report_history = PRODUCERS * PER_PRODUCER;
    let (chassis, control_loop) = rig(config);
    let loop_task = tokio::spawn(control_loop.run());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let chassis = chassis.clone();
            tokio::spawn(async move {
                let mut ids = Vec::new();
                for i in 0..PER_PRODUCER {
                    let heading = 0.2 * (p * PER_PRODUCER + i) as f64;
                    ids.push(
                        chassis
                            .turn_to_heading(heading, Duration::from_millis(30))
                            .unwrap(),
                    );
                    tokio::task::yield_now().await;
                }
                ids
            })
        })
        .collect();

    let mut all_ids = HashSet::new();
    for producer in producers {
        let ids = producer.await.unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all_ids.extend(ids);
    }
    assert_eq!(all_ids.len(), PRODUCERS * PER_PRODUCER);

    tokio::time::timeout(Duration::from_secs(10), chassis.wait_until_done())
        .await
        .expect("queue did not drain")
        .unwrap();

    let state = chassis.state();
    assert_eq!(state.completed_count, (PRODUCERS * PER_PRODUCER) as u64);
    let finished: Vec<CommandId> = state.recent.iter().map(|r| r.id).collect();
    let expected: Vec<CommandId> = (1..=(PRODUCERS * PER_PRODUCER) as u64)
        .map(CommandId)
        .collect();
    assert_eq!(finished, expected);

    drop(chassis);
    loop_task.await.unwrap();
}
