//! Virtual PTZ geometry: crop windows and angular offsets.

use hardware::gimbal::AngleOffset;
use shared::{BoundingBox, ImageSize};

/// Pixel rectangle `[x1, x2) × [y1, y2)`, always inside the frame it was computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::from_width_height(self.width(), self.height())
    }
}

fn crop_axis(center: f64, extent: u32, zoom: f64) -> (u32, u32) {
    let extent = extent as i64;
    let len = ((extent as f64 / zoom).round() as i64).clamp(1, extent);
    let start = ((center - len as f64 / 2.0).round() as i64).clamp(0, extent - len);
    (start as u32, (start + len) as u32)
}

/// Crop window of `1/zoom` the frame, centered on `center` and shifted to stay
/// inside the frame.
///
/// Returns `None` for an empty frame.
pub fn compute_crop(center: (f64, f64), frame: ImageSize, zoom: f64) -> Option<CropRect> {
    if frame.is_empty() {
        return None;
    }
    let (x1, x2) = crop_axis(center.0, frame.width, zoom);
    let (y1, y2) = crop_axis(center.1, frame.height, zoom);
    Some(CropRect { x1, y1, x2, y2 })
}

/// Relative pan/tilt that would bring `bbox` to the frame center.
///
/// The field of view is spread linearly over the frame. Tilt is positive when the
/// target is above center.
pub fn angular_offset(
    bbox: &BoundingBox,
    frame: ImageSize,
    fov_h_deg: f64,
    fov_v_deg: f64,
) -> AngleOffset {
    if frame.is_empty() {
        return AngleOffset::default();
    }
    let (cx, cy) = bbox.center();
    let (w, h) = (frame.width as f64, frame.height as f64);
    AngleOffset::new(
        (cx - w / 2.0) / w * fov_h_deg,
        -(cy - h / 2.0) / h * fov_v_deg,
    )
}
