//! Active target selection
//!
//! The selector remembers which [`TrackIdentity`] is being followed and resolves
//! it against each frame's detections.
//!
//! Rules, applied once per frame:
//! - Manual cycling (`target_delta != 0`, non-empty frame): if the active identity
//!   is missing from this frame it snaps to the first detection, otherwise it steps
//!   circularly through the frame's identities in detector order.
//! - Resolution: the detection carrying the active identity wins. If there is none,
//!   the largest bounding box is chosen (first one on ties) and its identity becomes
//!   the active one.
//! - Empty frames resolve to nothing and leave the active identity untouched.
//!
//! `wide` input never touches the active identity.

use shared::{identities, Detection, ManualInput, TrackIdentity};
use tracing::debug;

/// Result of one selection step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Index into this frame's detections, `None` when the frame is empty
    pub index: Option<usize>,
    /// Manual cycling moved the active identity to a different detection
    pub cycled: bool,
}

/// Index of the detection with the largest box area; earlier wins ties.
pub fn largest_target(detections: &[Detection]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, det) in detections.iter().enumerate() {
        let area = det.bbox.area();
        match best {
            Some((_, best_area)) if area <= best_area => {}
            _ => best = Some((i, area)),
        }
    }
    best.map(|(i, _)| i)
}

#[derive(Debug, Default, Clone)]
pub struct TargetSelector {
    active: Option<TrackIdentity>,
}

impl TargetSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<TrackIdentity> {
        self.active
    }

    /// Forget the followed target; the next frame falls back to the largest box.
    pub fn reset(&mut self) {
        self.active = None;
    }

    pub fn set_active(&mut self, identity: Option<TrackIdentity>) {
        self.active = identity;
    }

    /// Apply a cycle request. Returns true when the active identity advanced.
    pub fn cycle(&mut self, target_delta: i32, detections: &[Detection]) -> bool {
        if target_delta == 0 || detections.is_empty() {
            return false;
        }
        let ids = identities(detections);
        let current = self
            .active
            .and_then(|active| ids.iter().position(|id| *id == active));

        match current {
            None => {
                debug!("Active target lost, snapping to {}", ids[0]);
                self.active = Some(ids[0]);
                false
            }
            Some(pos) => {
                let next = (pos as i64 + target_delta as i64).rem_euclid(ids.len() as i64) as usize;
                debug!("Cycling target {} -> {}", ids[pos], ids[next]);
                self.active = Some(ids[next]);
                true
            }
        }
    }

    /// Resolve the active identity against this frame's detections.
    pub fn resolve(&mut self, detections: &[Detection]) -> Option<usize> {
        if let Some(active) = self.active {
            if let Some(i) = detections
                .iter()
                .enumerate()
                .position(|(i, det)| det.identity(i) == active)
            {
                return Some(i);
            }
        }

        let fallback = largest_target(detections)?;
        let identity = detections[fallback].identity(fallback);
        if self.active != Some(identity) {
            debug!("Auto-selecting largest target {identity}");
        }
        self.active = Some(identity);
        Some(fallback)
    }

    /// One frame's worth of selection: manual cycling, then resolution.
    pub fn update(&mut self, input: &ManualInput, detections: &[Detection]) -> Selection {
        let cycled = self.cycle(input.target_delta, detections);
        Selection {
            index: self.resolve(detections),
            cycled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::BoundingBox;

    fn det(id: Option<i64>, x1: f64, y1: f64, x2: f64, y2: f64) -> Detection {
        Detection::new(id, BoundingBox::new(x1, y1, x2, y2).unwrap(), 0.9, "person")
    }

    fn boxes(ids: &[i64]) -> Vec<Detection> {
        ids.iter()
            .enumerate()
            .map(|(i, &id)| det(Some(id), i as f64 * 50.0, 0.0, i as f64 * 50.0 + 10.0, 10.0))
            .collect()
    }

    fn step(delta: i32) -> ManualInput {
        ManualInput {
            target_delta: delta,
            ..Default::default()
        }
    }

    #[test]
    fn test_cycle_forward_and_wrap() {
        let dets = boxes(&[3, 7, 9]);
        let mut sel = TargetSelector::new();
        sel.set_active(Some(TrackIdentity::Stable(7)));

        let s = sel.update(&step(1), &dets);
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(9)));
        assert_eq!(s.index, Some(2));
        assert!(s.cycled);

        let s = sel.update(&step(1), &dets);
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(3)));
        assert_eq!(s.index, Some(0));
    }

    #[test]
    fn test_cycle_backward_wraps() {
        let dets = boxes(&[3, 7, 9]);
        let mut sel = TargetSelector::new();
        sel.set_active(Some(TrackIdentity::Stable(3)));
        sel.update(&step(-1), &dets);
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(9)));
    }

    #[test]
    fn test_lost_target_snaps_to_first() {
        let dets = boxes(&[2, 5]);
        let mut sel = TargetSelector::new();
        sel.set_active(Some(TrackIdentity::Stable(7)));

        let s = sel.update(&step(1), &dets);
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(2)));
        assert_eq!(s.index, Some(0));
        assert!(!s.cycled);
    }

    #[test]
    fn test_active_target_kept_without_input() {
        // Id 5 is the small box; it stays selected while present.
        let dets = vec![
            det(Some(1), 0.0, 0.0, 100.0, 100.0),
            det(Some(5), 200.0, 200.0, 210.0, 210.0),
        ];
        let mut sel = TargetSelector::new();
        sel.set_active(Some(TrackIdentity::Stable(5)));
        assert_eq!(sel.update(&ManualInput::default(), &dets).index, Some(1));
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(5)));
    }

    #[test]
    fn test_fallback_largest_area_first_wins_ties() {
        let dets = vec![
            det(Some(10), 0.0, 0.0, 10.0, 10.0),
            det(Some(11), 0.0, 0.0, 20.0, 20.0),
            det(Some(12), 50.0, 50.0, 70.0, 70.0),
        ];
        assert_eq!(largest_target(&dets), Some(1));

        let mut sel = TargetSelector::new();
        assert_eq!(sel.update(&ManualInput::default(), &dets).index, Some(1));
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(11)));
        assert_eq!(largest_target(&[]), None);
    }

    #[test]
    fn test_empty_frame_keeps_identity() {
        let mut sel = TargetSelector::new();
        sel.set_active(Some(TrackIdentity::Stable(4)));
        let s = sel.update(&step(1), &[]);
        assert_eq!(s, Selection::default());
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(4)));
    }

    #[test]
    fn test_wide_does_not_clear_identity() {
        let dets = boxes(&[3, 7]);
        let mut sel = TargetSelector::new();
        sel.set_active(Some(TrackIdentity::Stable(7)));
        let wide = ManualInput {
            wide: true,
            ..Default::default()
        };
        assert_eq!(sel.update(&wide, &dets).index, Some(1));
        assert_eq!(sel.active(), Some(TrackIdentity::Stable(7)));
    }

    #[test]
    fn test_positional_identities_cycle_by_index() {
        let dets = vec![
            det(None, 0.0, 0.0, 30.0, 30.0),
            det(None, 40.0, 0.0, 50.0, 10.0),
        ];
        let mut sel = TargetSelector::new();
        assert_eq!(sel.update(&ManualInput::default(), &dets).index, Some(0));
        assert_eq!(sel.active(), Some(TrackIdentity::Positional(0)));

        assert_eq!(sel.update(&step(1), &dets).index, Some(1));
        assert_eq!(sel.active(), Some(TrackIdentity::Positional(1)));
        assert!(!sel.active().unwrap().is_stable());
    }

    #[test]
    fn test_reset_falls_back() {
        let dets = boxes(&[3, 7]);
        let mut sel = TargetSelector::new();
        sel.set_active(Some(TrackIdentity::Stable(7)));
        sel.reset();
        assert_eq!(sel.active(), None);
        assert_eq!(sel.update(&ManualInput::default(), &dets).index, Some(0));
    }
}
