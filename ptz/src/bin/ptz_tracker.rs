//! Target-following PTZ tracker.
//!
//! Plays frames from an image directory through the tracking pipeline with
//! recorded detections and streams the result as MJPEG. With `--gimbal` the
//! selected target is followed by steering the gimbal instead of cropping.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hardware::gimbal::{Gimbal, GimbalWorker};
use hardware::thermal::ThermalZone;
use ptz::detector::NoDetector;
use ptz::{Detector, ImageSequence, MjpegSink, PtzConfig, PtzPipeline, ReplayDetector};
use tracing::info;

/// Target-following virtual PTZ / gimbal controller
#[derive(Parser, Debug)]
#[command(name = "ptz_tracker")]
#[command(about = "Follow a detected target with a virtual PTZ crop or a physical gimbal")]
#[command(version)]
struct Args {
    /// JSON config file (defaults are used for anything missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of frames to play
    #[arg(short, long)]
    frames: PathBuf,

    /// JSON-lines detection recording, one array per frame
    #[arg(short, long)]
    detections: Option<PathBuf>,

    /// Minimum detection confidence
    #[arg(long, default_value = "0.5")]
    min_confidence: f32,

    /// Restart frames and detections when they run out
    #[arg(long = "loop")]
    looping: bool,

    /// Stream host (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Stream port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Stream frame rate (overrides config)
    #[arg(long)]
    fps: Option<u32>,

    /// Draw the FPS/temperature overlay
    #[arg(long)]
    overlay: bool,

    /// Steer the physical gimbal instead of cropping
    #[arg(long)]
    gimbal: bool,

    /// Gimbal IP address (overrides config)
    #[arg(long)]
    gimbal_ip: Option<String>,

    /// Do not probe for Sense HAT joystick and LED matrix
    #[arg(long)]
    no_sense_hat: bool,

    /// Write the effective config to this path and exit
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn effective_config(args: &Args) -> Result<PtzConfig> {
    let mut config = match &args.config {
        Some(path) => PtzConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PtzConfig::default(),
    };

    if let Some(host) = &args.host {
        config.stream.host = host.clone();
    }
    if let Some(port) = args.port {
        config.stream.port = port;
    }
    if let Some(fps) = args.fps {
        config.stream.fps = fps;
    }
    if args.overlay {
        config.telemetry.overlay = true;
    }
    if args.gimbal {
        config.gimbal.enabled = true;
    }
    if let Some(ip) = &args.gimbal_ip {
        config.gimbal.ip = ip.clone();
    }
    if args.no_sense_hat {
        config.hardware.sense_hat = false;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(target_os = "linux")]
fn attach_sense_hat(pipeline: PtzPipeline) -> PtzPipeline {
    use hardware::sense_hat::{open_joystick, open_led_matrix};
    pipeline
        .with_input(open_joystick())
        .with_radar(open_led_matrix())
}

#[cfg(not(target_os = "linux"))]
fn attach_sense_hat(pipeline: PtzPipeline) -> PtzPipeline {
    info!("Sense HAT support requires Linux");
    pipeline
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = effective_config(&args)?;

    if let Some(path) = &args.save_config {
        config
            .save_to_file(path)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        info!("Wrote config to {}", path.display());
        return Ok(());
    }

    let source = ImageSequence::open(&args.frames)
        .with_context(|| format!("failed to read frames from {}", args.frames.display()))?
        .looping(args.looping);

    let detector: Box<dyn Detector> = match &args.detections {
        Some(path) => Box::new(
            ReplayDetector::open(path)?
                .looping(args.looping)
                .with_min_confidence(args.min_confidence),
        ),
        None => {
            info!("No detections given, every frame is empty");
            Box::new(NoDetector)
        }
    };

    let sink = MjpegSink::new(config.stream.jpeg_quality);
    let thermal = ThermalZone::new(&config.hardware.thermal_path);
    if !thermal.is_present() {
        info!("No thermal zone at {}", thermal.path().display());
    }

    let mut pipeline = PtzPipeline::new(config.clone(), Box::new(source), detector, Box::new(sink))
        .with_temperature(Box::new(thermal));

    if config.hardware.sense_hat {
        pipeline = attach_sense_hat(pipeline);
    }

    if config.gimbal.enabled {
        let address = config.gimbal.address();
        let mut gimbal = Gimbal::connect(&address)
            .with_context(|| format!("failed to open gimbal socket to {address}"))?;
        gimbal.set_timeout(config.gimbal.timeout());
        pipeline = pipeline.with_gimbal(GimbalWorker::spawn(gimbal, config.gimbal.attempts));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::Relaxed))
        .context("failed to install Ctrl-C handler")?;

    let stats = pipeline.run(&stop);
    info!(
        "Processed {} frames, {} empty polls",
        stats.frames, stats.empty_polls
    );
    Ok(())
}
