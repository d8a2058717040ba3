//! Per-frame actuation loop
//!
//! [`PtzPipeline::step`] runs one cycle in a fixed order:
//!
//! 1. acquire a frame (none available: report [`CycleOutcome::NoFrame`])
//! 2. run the detector and convert its output to [`Detection`]s
//! 3. poll manual input and update the target selection
//! 4. update zoom from the same input
//! 5. show the radar
//! 6. render (virtual PTZ crop) or, in gimbal mode, submit an angular correction
//! 7. draw the telemetry overlay
//! 8. start the sink if needed and push the frame
//!
//! Collaborator faults (detector, sink) are logged and never end the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use hardware::gimbal::{AngleOffset, GimbalWorker};
use shared::{
    Detection, ImageSize, ManualInput, ManualInputSource, NoDisplay, NoInput, NoTemperature,
    RadarDisplay, TemperatureSource, TrackIdentity,
};
use tracing::{debug, info, warn};

use crate::config::PtzConfig;
use crate::detector::{to_detections, Detector};
use crate::geometry::angular_offset;
use crate::overlay::{overlay_lines, FpsEstimator, TextOverlay};
use crate::radar::radar_frame;
use crate::render::{render, RenderMode};
use crate::selector::TargetSelector;
use crate::sink::{StreamTarget, VideoSink};
use crate::source::FrameSource;
use crate::zoom::ZoomState;

/// Pause before retrying when the source has no frame.
pub const NO_FRAME_BACKOFF: Duration = Duration::from_millis(10);

/// What one processed frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub frame_size: ImageSize,
    pub detections: Vec<Detection>,
    /// Index of the followed detection in `detections`
    pub selected: Option<usize>,
    pub active: Option<TrackIdentity>,
    pub zoom: f64,
    pub mode: RenderMode,
    /// Correction handed to the gimbal worker this frame
    pub gimbal_offset: Option<AngleOffset>,
    /// Frame reached a started sink
    pub pushed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The source had no frame this time
    NoFrame,
    /// Detector failed; the frame was dropped
    DetectorFailed,
    Processed(Box<CycleReport>),
}

/// Counters returned by [`PtzPipeline::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub empty_polls: u64,
    pub detector_failures: u64,
}

pub struct PtzPipeline {
    config: PtzConfig,
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    sink: Box<dyn VideoSink>,
    input: Box<dyn ManualInputSource>,
    radar: Box<dyn RadarDisplay>,
    temperature: Box<dyn TemperatureSource>,
    gimbal: Option<GimbalWorker>,
    selector: TargetSelector,
    zoom: ZoomState,
    fps: FpsEstimator,
    text: Option<TextOverlay>,
}

impl PtzPipeline {
    /// Pipeline with no manual input, radar, temperature or gimbal.
    pub fn new(
        config: PtzConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        sink: Box<dyn VideoSink>,
    ) -> Self {
        let zoom = ZoomState::new(config.ptz.clone());
        let text = config.telemetry.overlay.then(TextOverlay::new);
        Self {
            config,
            source,
            detector,
            sink,
            input: Box::new(NoInput),
            radar: Box::new(NoDisplay),
            temperature: Box::new(NoTemperature),
            gimbal: None,
            selector: TargetSelector::new(),
            zoom,
            fps: FpsEstimator::new(),
            text,
        }
    }

    pub fn with_input(mut self, input: Box<dyn ManualInputSource>) -> Self {
        self.input = input;
        self
    }

    pub fn with_radar(mut self, radar: Box<dyn RadarDisplay>) -> Self {
        self.radar = radar;
        self
    }

    pub fn with_temperature(mut self, temperature: Box<dyn TemperatureSource>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Drive a physical gimbal instead of cropping.
    pub fn with_gimbal(mut self, worker: GimbalWorker) -> Self {
        self.gimbal = Some(worker);
        self
    }

    pub fn selector(&self) -> &TargetSelector {
        &self.selector
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn gimbal(&self) -> Option<&GimbalWorker> {
        self.gimbal.as_ref()
    }

    /// Forget the active target.
    pub fn reset_target(&mut self) {
        self.selector.reset();
    }

    fn stream_target(&self, size: ImageSize) -> StreamTarget {
        StreamTarget {
            host: self.config.stream.host.clone(),
            port: self.config.stream.port,
            width: size.width,
            height: size.height,
            fps: self.config.stream.fps,
        }
    }

    fn gimbal_correction(
        &self,
        detection: Option<&Detection>,
        size: ImageSize,
    ) -> Option<AngleOffset> {
        let worker = self.gimbal.as_ref()?;
        let cfg = &self.config.gimbal;
        let offset = angular_offset(&detection?.bbox, size, cfg.fov_h_deg, cfg.fov_v_deg);
        if offset.pan_deg.abs() < cfg.deadband_deg && offset.tilt_deg.abs() < cfg.deadband_deg {
            return None;
        }
        worker.submit(offset);
        Some(offset)
    }

    fn temperature_for_overlay(&mut self) -> Option<f64> {
        let telemetry = &self.config.telemetry;
        if telemetry.overlay && telemetry.show_temp {
            self.temperature.read_temperature()
        } else {
            None
        }
    }

    fn draw_overlay(&mut self, frame: &mut image::RgbImage, fps: f64) {
        let temperature = self.temperature_for_overlay();
        let Some(text) = &self.text else {
            return;
        };
        let lines = overlay_lines(&self.config.telemetry, fps, temperature);
        if let Err(e) = text.draw(frame, &lines) {
            warn!("Failed to draw overlay: {e}");
        }
    }

    /// Run one cycle.
    pub fn step(&mut self) -> CycleOutcome {
        let Some(mut frame) = self.source.next_frame() else {
            return CycleOutcome::NoFrame;
        };
        let fps = self.fps.tick();
        let size = ImageSize::from_width_height(frame.width(), frame.height());

        let raw = match self.detector.detect(&frame) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Detector failed, skipping frame: {e}");
                return CycleOutcome::DetectorFailed;
            }
        };
        let detections = to_detections(&raw);

        let input: ManualInput = self.input.poll();
        if !input.is_neutral() {
            debug!("Manual input: {input:?}");
        }
        let selection = self.selector.update(&input, &detections);
        let target = selection.index.map(|i| &detections[i]);
        self.zoom.apply(&input, selection.cycled);

        self.radar
            .show(&radar_frame(&detections, self.selector.active(), size));

        let (mode, gimbal_offset) = if self.gimbal.is_some() {
            (RenderMode::Wide, self.gimbal_correction(target, size))
        } else {
            (render(&mut frame, target.map(|d| &d.bbox), &self.zoom), None)
        };

        self.draw_overlay(&mut frame, fps);

        let pushed = self.forward(&frame);

        CycleOutcome::Processed(Box::new(CycleReport {
            frame_size: size,
            selected: selection.index,
            detections,
            active: self.selector.active(),
            zoom: self.zoom.zoom(),
            mode,
            gimbal_offset,
            pushed,
        }))
    }

    fn forward(&mut self, frame: &image::RgbImage) -> bool {
        if !self.sink.is_started() {
            let size = ImageSize::from_width_height(frame.width(), frame.height());
            let target = self.stream_target(size);
            if let Err(e) = self.sink.start(&target) {
                warn!("Failed to start video sink: {e}");
                return false;
            }
        }
        match self.sink.push(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("Video sink push failed: {e}");
                false
            }
        }
    }

    /// Cycle until `stop` is set or a finite source runs out.
    pub fn run(&mut self, stop: &AtomicBool) -> RunStats {
        let mut stats = RunStats::default();
        info!(
            "PTZ loop running ({} mode)",
            if self.gimbal.is_some() { "gimbal" } else { "virtual" }
        );

        while !stop.load(Ordering::Relaxed) {
            if self.source.is_exhausted() {
                info!("Frame source exhausted");
                break;
            }
            match self.step() {
                CycleOutcome::NoFrame => {
                    stats.empty_polls += 1;
                    thread::sleep(NO_FRAME_BACKOFF);
                }
                CycleOutcome::DetectorFailed => stats.detector_failures += 1,
                CycleOutcome::Processed(_) => stats.frames += 1,
            }
        }

        self.sink.stop();
        self.radar.clear();
        info!(
            "PTZ loop stopped after {} frames ({} detector failures)",
            stats.frames, stats.detector_failures
        );
        stats
    }
}
