//! Virtual PTZ rendering: crop around the target and scale back to full size.

use image::imageops::{self, FilterType};
use image::RgbImage;
use shared::{BoundingBox, ImageSize};

use crate::geometry::{compute_crop, CropRect};
use crate::zoom::ZoomState;

/// What [`render`] did to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Frame passed through unmodified
    Wide,
    /// Frame cropped to this window and resized back
    Cropped(CropRect),
}

/// Crop window for this frame, or `None` when the frame should pass through.
pub fn plan_crop(
    frame: ImageSize,
    target: Option<&BoundingBox>,
    zoom: &ZoomState,
) -> Option<CropRect> {
    if zoom.is_wide() {
        return None;
    }
    compute_crop(target?.center(), frame, zoom.effective_zoom())
}

/// Render the output frame in place.
///
/// Passes through when wide is forced, no target is active, or the zoom is
/// effectively 1. Otherwise the crop is resampled (bilinear) back to the input
/// dimensions.
pub fn render(frame: &mut RgbImage, target: Option<&BoundingBox>, zoom: &ZoomState) -> RenderMode {
    let size = ImageSize::from_width_height(frame.width(), frame.height());
    let Some(crop) = plan_crop(size, target, zoom) else {
        return RenderMode::Wide;
    };

    let cropped =
        imageops::crop_imm(frame, crop.x1, crop.y1, crop.width(), crop.height()).to_image();
    *frame = imageops::resize(&cropped, size.width, size.height, FilterType::Triangle);
    RenderMode::Cropped(crop)
}
