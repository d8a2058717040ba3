//! Object detector seam and detector-output conversion
//!
//! A [`Detector`] returns [`RawDetection`]s in whatever loose shape the model
//! produced; [`to_detections`] turns them into validated [`Detection`]s for the
//! selector. [`ReplayDetector`] plays back recorded detections from a JSON-lines
//! file, one JSON array per frame.

use std::fs;
use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use shared::{BoundingBox, Detection};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad detection record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Detector failed: {0}")]
    Failed(String),
}

/// Class label as reported by a detector: a name, or a numeric (COCO) class id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawClass {
    Label(String),
    Id(i64),
}

impl RawClass {
    pub fn label(&self) -> String {
        match self {
            RawClass::Label(name) => name.clone(),
            RawClass::Id(0) => "person".to_string(),
            RawClass::Id(id) => format!("class_{id}"),
        }
    }
}

impl Default for RawClass {
    fn default() -> Self {
        RawClass::Id(-1)
    }
}

/// One detector output record before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(default)]
    pub id: Option<i64>,
    /// `[x1, y1, x2, y2]` in pixels
    pub bbox: [f64; 4],
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub class: RawClass,
}

impl RawDetection {
    /// Validated detection, or `None` for a degenerate box.
    pub fn to_detection(&self) -> Option<Detection> {
        let [x1, y1, x2, y2] = self.bbox;
        let bbox = BoundingBox::new(x1, y1, x2, y2)?;
        Some(Detection::new(self.id, bbox, self.confidence, &self.class.label()))
    }
}

/// Convert one frame of detector output, dropping records with degenerate boxes.
///
/// Order is preserved; positional identities refer to the returned list.
pub fn to_detections(raw: &[RawDetection]) -> Vec<Detection> {
    raw.iter()
        .filter_map(|r| {
            let det = r.to_detection();
            if det.is_none() {
                debug!("Dropping detection with degenerate box {:?}", r.bbox);
            }
            det
        })
        .collect()
}

/// External object detector.
pub trait Detector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<RawDetection>, DetectorError>;
}

/// Detector that never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDetector;

impl Detector for NoDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
        Ok(Vec::new())
    }
}

/// Plays back recorded detections, one frame per call.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    frames: Vec<Vec<RawDetection>>,
    next: usize,
    looping: bool,
    min_confidence: f32,
}

impl ReplayDetector {
    pub fn new(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames,
            next: 0,
            looping: false,
            min_confidence: 0.0,
        }
    }

    /// Parse JSON lines; blank lines are frames without detections.
    pub fn from_jsonl(text: &str) -> Result<Self, DetectorError> {
        let frames = text
            .lines()
            .enumerate()
            .map(|(i, line)| {
                if line.trim().is_empty() {
                    return Ok(Vec::new());
                }
                serde_json::from_str(line).map_err(|source| DetectorError::Parse {
                    line: i + 1,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(frames))
    }

    pub fn open(path: &Path) -> Result<Self, DetectorError> {
        let replay = Self::from_jsonl(&fs::read_to_string(path)?)?;
        info!(
            "Loaded {} recorded detection frames from {}",
            replay.len(),
            path.display()
        );
        Ok(replay)
    }

    /// Start over from the first frame after the last one.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Drop records below this confidence.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
        if self.next >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return Ok(Vec::new());
            }
            self.next = 0;
        }
        let frame = &self.frames[self.next];
        self.next += 1;
        Ok(frame
            .iter()
            .filter(|r| r.confidence >= self.min_confidence)
            .cloned()
            .collect())
    }
}
