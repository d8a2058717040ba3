//! Manual operator input (joystick-style).

use serde::{Deserialize, Serialize};

/// One poll worth of manual input.
///
/// The default value is the neutral input: no target cycling, no zoom change,
/// no reset to wide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualInput {
    /// Cycle the active target by this many positions (-1, 0 or 1 per press)
    pub target_delta: i32,
    /// Zoom steps to apply (positive zooms in)
    pub zoom_delta: i32,
    /// Reset to the wide view
    pub wide: bool,
}

impl ManualInput {
    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Fold another poll into this one.
    pub fn merge(&mut self, other: ManualInput) {
        self.target_delta += other.target_delta;
        self.zoom_delta += other.zoom_delta;
        self.wide |= other.wide;
    }
}

/// Source of manual input events.
///
/// `poll` must not block. Implementations backed by absent hardware return
/// [`ManualInput::default`].
pub trait ManualInputSource {
    fn poll(&mut self) -> ManualInput;
}

/// Input source used when no input device is present.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl ManualInputSource for NoInput {
    fn poll(&mut self) -> ManualInput {
        ManualInput::default()
    }
}
