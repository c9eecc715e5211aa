//! Head tracking harness: replays frames through the detector and drives a
//! simulated robot head in training or inference mode.

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use log::{info, warn};
use robot_head_tracking::{
    camera::{FrameSource, ImageDirSource},
    config::{Config, EXAMPLE_CONFIG},
    controller::TrackingMode,
    detector::{DetectionMode, HttpDetector},
    robot::{connect_with_retry, Key, KeyState, Posture, SimulatedRobot, SimulatedSession},
    session::TrackingSession,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Learn from the rule table instead of following the model
    #[arg(short, long)]
    training: bool,

    /// Model snapshot to load (required for inference, resumed in training)
    #[arg(short, long, required_unless_present_any = ["training", "print_config"])]
    model_path: Option<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Directory of PNG/JPEG frames to replay as the camera
    #[arg(short, long, required_unless_present = "print_config")]
    frames: Option<PathBuf>,

    /// Detection server URL (overrides the config file)
    #[arg(long)]
    detector_url: Option<String>,

    /// Detection mode (face, both)
    #[arg(long)]
    mode: Option<String>,

    /// Stop after this many seconds instead of waiting for `quit`
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Save a snapshot when the session stops
    #[arg(long)]
    save_on_exit: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(url) = &args.detector_url {
        config.detector.url = url.clone();
    }
    if let Some(mode) = &args.mode {
        config.detector.mode = mode.parse::<DetectionMode>()?;
    }
    if args.save_on_exit {
        config.model.save_on_exit = true;
    }
    config.validate()?;
    Ok(config)
}

/// Lines typed by the operator
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line.trim().to_string()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Handle one operator line; returns false to quit
fn handle_command(session: &TrackingSession, line: &str) -> bool {
    match line {
        "" => {}
        "quit" | "exit" => return false,
        "save" => match session.request_snapshot() {
            Ok(path) => info!("Saved model to {}", path.display()),
            Err(e) => warn!("Snapshot failed: {}", e),
        },
        "sit" | "stand" | "standzero" | "crouch" => {
            let posture = match line {
                "sit" => Posture::Sit,
                "stand" => Posture::Stand,
                "standzero" => Posture::StandZero,
                _ => Posture::Crouch,
            };
            if let Err(e) = session.go_to_posture(posture) {
                warn!("Posture change failed: {}", e);
            }
        }
        keys => {
            // One tick with the listed keys held, then release
            let mut state = KeyState::new();
            for name in keys.split_whitespace() {
                match Key::from_name(name) {
                    Some(key) => state.press(key),
                    None => warn!("Unknown command or key: {}", name),
                }
            }
            for command in [state.command(), KeyState::new().command()] {
                if let Err(e) = session.submit_teleop(command) {
                    warn!("Teleop dropped: {}", e);
                }
            }
        }
    }
    true
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", EXAMPLE_CONFIG);
        return Ok(());
    }

    let config = load_config(&args)?;
    let mode = if args.training {
        TrackingMode::Training
    } else {
        TrackingMode::Inference
    };
    info!("Robot head tracking ({} mode)", mode);

    let mut model = config.create_model();
    if let Some(path) = &args.model_path {
        let report = model.restore(path);
        if report.success {
            info!("Resuming from {} samples", report.sample_count);
        } else if mode == TrackingMode::Inference {
            bail!("Could not load model {}", path.display());
        } else {
            warn!("Starting training from an untrained model");
        }
    }

    let Some(frames_dir) = &args.frames else {
        bail!("--frames is required");
    };
    let mut frames: Option<Box<dyn FrameSource>> = Some(Box::new(ImageDirSource::open(frames_dir, true)?));
    let robot_session = connect_with_retry(
        config.robot.connect_attempts,
        config.robot.connect_retry(),
        |attempt| {
            info!(
                "Connecting to robot at {}:{} (attempt {})",
                config.robot.address, config.robot.port, attempt
            );
            let robot = Arc::new(SimulatedRobot::new(config.joints.limits()));
            Ok(SimulatedSession::new(robot, frames.take()))
        },
    )?;

    let detector = HttpDetector::new(&config.detector)?;
    let mut session = TrackingSession::start(
        &config,
        &robot_session,
        Box::new(detector),
        model,
        mode,
    )?;
    info!("Type key names (w a s d q e up down left right), a posture, 'save' or 'quit'");

    let input = spawn_stdin_reader();
    let deadline = args.duration_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut last_status = Instant::now();
    loop {
        if deadline.map_or(false, |d| Instant::now() >= d) {
            info!("Run duration reached");
            break;
        }
        match input.recv_timeout(Duration::from_millis(200)) {
            Ok(line) => {
                if !handle_command(&session, &line) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed: keep running until the deadline, if any
            Err(RecvTimeoutError::Disconnected) if deadline.is_some() => {
                thread::sleep(Duration::from_millis(200));
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if last_status.elapsed() >= STATUS_INTERVAL {
            last_status = Instant::now();
            if let Some(stats) = session.stats() {
                info!(
                    "{} cycles, {} samples, last position {}, last loss {}",
                    stats.cycles,
                    stats.sample_count,
                    stats.last_label.map_or_else(|| "-".to_string(), |l| l.to_string()),
                    stats.last_loss.map_or_else(|| "-".to_string(), |l| format!("{l:.6}"))
                );
            }
        }
    }

    session.stop();
    Ok(())
}
