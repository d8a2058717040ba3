//! Frame dimensions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame dimensions structure
///
/// Represents the width and height of a video frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Frame center in pixel coordinates
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from(dimensions: (u32, u32)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl From<ImageSize> for (u32, u32) {
    fn from(size: ImageSize) -> Self {
        size.to_tuple()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_display() {
        let size = ImageSize::from_width_height(640, 480);
        assert_eq!(size.center(), (320.0, 240.0));
        assert_eq!(size.pixel_count(), 307_200);
        assert_eq!(size.to_string(), "640x480");
        assert!(!size.is_empty());
        assert!(ImageSize::from((0, 10)).is_empty());
    }
}
