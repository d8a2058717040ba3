//! Digital zoom state driven by manual input.

use shared::ManualInput;

use crate::config::ZoomConfig;

/// Zoom below this is treated as no zoom at all.
pub const NO_ZOOM_THRESHOLD: f64 = 1.01;

#[derive(Debug, Clone, PartialEq)]
pub struct ZoomState {
    zoom: f64,
    force_wide: bool,
    limits: ZoomConfig,
}

impl ZoomState {
    /// Start fully zoomed out.
    pub fn new(limits: ZoomConfig) -> Self {
        Self {
            zoom: limits.zoom_min,
            force_wide: false,
            limits,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn force_wide(&self) -> bool {
        self.force_wide
    }

    /// Zoom to render with: `zoom_min` while wide is forced.
    pub fn effective_zoom(&self) -> f64 {
        if self.force_wide {
            self.limits.zoom_min
        } else {
            self.zoom
        }
    }

    /// True when rendering should pass the frame through untouched.
    pub fn is_wide(&self) -> bool {
        self.force_wide || self.zoom <= NO_ZOOM_THRESHOLD
    }

    /// Apply one frame of input.
    ///
    /// `wide` resets to `zoom_min` first; a zoom step in the same input then
    /// steps from there and leaves wide mode. `target_cycled` also leaves wide
    /// mode so a newly chosen target is zoomed on.
    pub fn apply(&mut self, input: &ManualInput, target_cycled: bool) {
        if input.wide {
            self.force_wide = true;
            self.zoom = self.limits.zoom_min;
        }
        if input.zoom_delta != 0 {
            self.force_wide = false;
            self.zoom = (self.zoom + input.zoom_delta as f64 * self.limits.zoom_step)
                .clamp(self.limits.zoom_min, self.limits.zoom_max);
        }
        if target_cycled {
            self.force_wide = false;
        }
    }
}
