//! Target radar: detections projected onto the 8×8 grid.

use shared::radar::{RADAR_ACTIVE, RADAR_OTHER};
use shared::{Detection, ImageSize, RadarFrame, TrackIdentity, RADAR_SIZE};

/// Grid cell for a pixel position; the frame is spread over cells `0..=7`.
pub fn radar_cell(x: f64, y: f64, frame: ImageSize) -> (usize, usize) {
    if frame.is_empty() {
        return (0, 0);
    }
    let max = (RADAR_SIZE - 1) as f64;
    let cell = |v: f64, extent: u32| ((v / extent as f64) * max).trunc().clamp(0.0, max) as usize;
    (cell(x, frame.width), cell(y, frame.height))
}

/// One radar frame: the active target red, every other detection white.
///
/// Detections sharing a cell overwrite each other in list order.
pub fn radar_frame(
    detections: &[Detection],
    active: Option<TrackIdentity>,
    frame: ImageSize,
) -> RadarFrame {
    let mut radar = RadarFrame::blank();
    for (i, det) in detections.iter().enumerate() {
        let (cx, cy) = det.bbox.center();
        let (col, row) = radar_cell(cx, cy, frame);
        let color = if Some(det.identity(i)) == active {
            RADAR_ACTIVE
        } else {
            RADAR_OTHER
        };
        radar.set(col, row, color);
    }
    radar
}
