//! Target-following PTZ controller.
//!
//! Selects a target from per-frame detections and follows it, either by cropping
//! and zooming the video (virtual PTZ) or by steering a physical gimbal.
//!
//! # Modules
//!
//! - [`selector`] - active target identity across frames
//! - [`zoom`], [`geometry`], [`render`] - virtual PTZ state, crop math and rendering
//! - [`overlay`], [`radar`] - on-frame telemetry and the 8×8 target radar
//! - [`detector`], [`source`], [`sink`], [`mjpeg`] - external collaborators
//! - [`pipeline`] - the per-frame actuation loop
//! - [`config`] - JSON configuration

pub mod config;
pub mod detector;
pub mod geometry;
pub mod mjpeg;
pub mod overlay;
pub mod pipeline;
pub mod radar;
pub mod render;
pub mod selector;
pub mod sink;
pub mod source;
pub mod zoom;

pub use config::{ConfigError, PtzConfig};
pub use detector::{Detector, DetectorError, RawDetection, ReplayDetector};
pub use pipeline::{CycleOutcome, CycleReport, PtzPipeline, RunStats};
pub use selector::{Selection, TargetSelector};
pub use sink::{MjpegSink, NullSink, SinkError, StreamTarget, VideoSink};
pub use source::{FrameSource, ImageSequence};
pub use zoom::ZoomState;
