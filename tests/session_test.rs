//! Thread lifecycle of a running tracking session


use robot_head_tracking::{
    config::Config,
    controller::TrackingMode,
    robot::{HeadAngles, Posture, RobotCommand, SimulatedRobot, SimulatedSession},
    session::TrackingSession,
    Error,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use test_helpers::{detector_error, right_face, wait_until, CountingFrameSource, ScriptedDetector};

fn fast_config(save_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.model.sequence_length = 3;
    config.model.hidden_size = 8;
    config.model.save_dir = save_dir.to_path_buf();
    config.timing.capture_interval_ms = 1;
    config.timing.detection_interval_ms = 1;
    config.timing.join_timeout_ms = 2000;
    config
}

#[test]
fn test_training_session_learns_and_stops_cleanly() {
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let source = CountingFrameSource::new(320, 240);
    let releases = source.releases.clone();
    let robot = Arc::new(SimulatedRobot::default());
    let robot_session = SimulatedSession::new(robot.clone(), Some(Box::new(source)));

    let mut session = TrackingSession::start(
        &config,
        &robot_session,
        Box::new(ScriptedDetector::always(vec![right_face()])),
        config.create_model(),
        TrackingMode::Training,
    )
    .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        session.stats().map_or(false, |s| s.sample_count >= 5)
    }));
    let stats = session.stats().unwrap();
    assert_eq!(stats.last_label.map(|l| l.to_string()), Some("Right".to_string()));
    assert!(stats.last_loss.is_some());

    let controller = session.stop().expect("control thread joined");
    assert!(controller.model().sample_count() >= 5);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(session.frame_buffer().is_empty());
    assert!(!session.is_running());

    // Stop is idempotent
    assert!(session.stop().is_none());
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    // Woken before tracking, resting on shutdown
    let commands = robot.commands();
    assert_eq!(commands.first(), Some(&RobotCommand::WakeUp));
    assert!(commands.ends_with(&[RobotCommand::StopMove, RobotCommand::Rest]));
    assert!(!robot.is_awake());
    let limits = config.joints.limits();
    assert!(robot.head_targets().iter().all(|t| limits.contains(*t)));
}

#[test]
fn test_detector_failures_do_not_stop_the_loop() {
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let robot_session = SimulatedSession::new(
        Arc::new(SimulatedRobot::default()),
        Some(Box::new(CountingFrameSource::new(320, 240))),
    );
    let script = vec![Err(detector_error()), Ok(vec![]), Err(detector_error())];
    let mut session = TrackingSession::start(
        &config,
        &robot_session,
        Box::new(ScriptedDetector::with_script(script, vec![right_face()])),
        config.create_model(),
        TrackingMode::Training,
    )
    .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        session.stats().map_or(false, |s| s.sample_count >= 2)
    }));
    session.stop();
}

#[test]
fn test_snapshot_request_and_save_on_exit() {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.model.save_on_exit = true;
    let robot_session = SimulatedSession::new(
        Arc::new(SimulatedRobot::default()),
        Some(Box::new(CountingFrameSource::new(320, 240))),
    );
    let mut session = TrackingSession::start(
        &config,
        &robot_session,
        Box::new(ScriptedDetector::always(vec![right_face()])),
        config.create_model(),
        TrackingMode::Training,
    )
    .unwrap();

    let path = session.request_snapshot().unwrap();
    assert!(path.starts_with(dir.path()));
    assert!(path.exists());

    // A higher sample count gives the exit snapshot a distinct name
    let at_request = session.stats().unwrap().sample_count;
    assert!(wait_until(Duration::from_secs(5), || {
        session.stats().map_or(false, |s| s.sample_count > at_request)
    }));
    session.stop();
    let saved = std::fs::read_dir(dir.path()).unwrap().count();
    assert!(saved >= 2, "expected two snapshots, found {saved}");
}

#[test]
fn test_missing_video_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let robot_session = SimulatedSession::new(Arc::new(SimulatedRobot::default()), None);
    let result = TrackingSession::start(
        &config,
        &robot_session,
        Box::new(ScriptedDetector::always(vec![])),
        config.create_model(),
        TrackingMode::Inference,
    );
    assert!(matches!(result, Err(Error::ServiceUnavailable(_))));
}

#[test]
fn test_invalid_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut config = fast_config(dir.path());
    config.model.sequence_length = 0;
    let robot_session = SimulatedSession::new(
        Arc::new(SimulatedRobot::default()),
        Some(Box::new(CountingFrameSource::new(320, 240))),
    );
    let result = TrackingSession::start(
        &config,
        &robot_session,
        Box::new(ScriptedDetector::always(vec![])),
        config.create_model(),
        TrackingMode::Inference,
    );
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[test]
fn test_drop_stops_session_and_teleop_reaches_robot() {
    let dir = TempDir::new().unwrap();
    let config = fast_config(dir.path());
    let source = CountingFrameSource::new(320, 240);
    let releases = source.releases.clone();
    let robot = Arc::new(SimulatedRobot::default());
    let robot_session = SimulatedSession::new(robot.clone(), Some(Box::new(source)));
    {
        let session = TrackingSession::start(
            &config,
            &robot_session,
            Box::new(ScriptedDetector::always(vec![])),
            config.create_model(),
            TrackingMode::Inference,
        )
        .unwrap();

        session.go_to_posture(Posture::StandZero).unwrap();
        let mut keys = robot_head_tracking::robot::KeyState::new();
        keys.press(robot_head_tracking::robot::Key::HeadLeft);
        session.submit_teleop(keys.command()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            robot.angles() == HeadAngles::new(0.05, 0.0)
        }));
    }
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert!(robot
        .commands()
        .contains(&RobotCommand::GoToPosture { posture: Posture::StandZero, speed: 0.7 }));
}
