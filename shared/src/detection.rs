//! Detector output types.
//!
//! A [`Detection`] is one object instance reported by the external detector for a
//! single frame. Detections are rebuilt every frame and never outlive the cycle
//! that produced them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box in pixel coordinates.
///
/// Invariant: `x1 < x2` and `y1 < y2`. Use [`BoundingBox::new`] to construct a
/// validated box from untrusted detector output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Build a box, returning `None` for degenerate or non-finite corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Option<Self> {
        let finite = [x1, y1, x2, y2].iter().all(|v| v.is_finite());
        if !finite || x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point `(cx, cy)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Identity used to follow a detection across frames.
///
/// `Stable` identities come from the detector's tracker and persist across frames.
/// `Positional` identities are the detection's index in this frame's list and are
/// only meaningful for that frame; selection logic tolerates them churning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackIdentity {
    Stable(i64),
    Positional(usize),
}

impl TrackIdentity {
    pub fn is_stable(&self) -> bool {
        matches!(self, TrackIdentity::Stable(_))
    }
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackIdentity::Stable(id) => write!(f, "#{id}"),
            TrackIdentity::Positional(idx) => write!(f, "[{idx}]"),
        }
    }
}

/// One detector output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Persistent track id, when the detector provides one
    pub id: Option<i64>,
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`
    pub confidence: f32,
    /// Class label
    pub class: String,
}

impl Detection {
    pub fn new(id: Option<i64>, bbox: BoundingBox, confidence: f32, class: &str) -> Self {
        Self {
            id,
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            class: class.to_string(),
        }
    }

    /// Identity of this detection given its position in the frame's list.
    pub fn identity(&self, index: usize) -> TrackIdentity {
        match self.id {
            Some(id) => TrackIdentity::Stable(id),
            None => TrackIdentity::Positional(index),
        }
    }
}

/// Identities of every detection, in list order.
pub fn identities(detections: &[Detection]) -> Vec<TrackIdentity> {
    detections
        .iter()
        .enumerate()
        .map(|(idx, det)| det.identity(idx))
        .collect()
}
