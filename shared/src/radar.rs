//! Target radar display interface.
//!
//! The radar is an 8x8 grid where each lit cell marks a detection's position in
//! the frame. Producing the grid is done by the pipeline; this module only defines
//! the pixel buffer and the display seam.

/// Side length of the radar grid
pub const RADAR_SIZE: usize = 8;

/// RGB color of a radar cell
pub type RadarColor = [u8; 3];

pub const RADAR_OFF: RadarColor = [0, 0, 0];
pub const RADAR_ACTIVE: RadarColor = [255, 0, 0];
pub const RADAR_OTHER: RadarColor = [255, 255, 255];

/// Row-major radar pixels, `pixels[row * RADAR_SIZE + col]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarFrame {
    pub pixels: [RadarColor; RADAR_SIZE * RADAR_SIZE],
}

impl RadarFrame {
    pub fn blank() -> Self {
        Self {
            pixels: [RADAR_OFF; RADAR_SIZE * RADAR_SIZE],
        }
    }

    pub fn get(&self, col: usize, row: usize) -> RadarColor {
        self.pixels[row * RADAR_SIZE + col]
    }

    pub fn set(&mut self, col: usize, row: usize, color: RadarColor) {
        self.pixels[row * RADAR_SIZE + col] = color;
    }
}

impl Default for RadarFrame {
    fn default() -> Self {
        Self::blank()
    }
}

/// A device that can show a [`RadarFrame`].
pub trait RadarDisplay {
    fn show(&mut self, frame: &RadarFrame);
    fn clear(&mut self) {
        self.show(&RadarFrame::blank());
    }
}

/// Display used when no radar hardware is present.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDisplay;

impl RadarDisplay for NoDisplay {
    fn show(&mut self, _frame: &RadarFrame) {}
}
