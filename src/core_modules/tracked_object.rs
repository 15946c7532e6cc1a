// THEORY:
// A `TrackedObject` is one persistent identity: the same physical object seen over
// many frames. Unlike a `Detection`, it has memory.
//
// Two kinds of update exist:
// 1.  **Real updates** come from a matched detection. They replace the stored shape,
//     record the new position, reset the miss counter and advance the confirmation
//     counter.
// 2.  **Synthetic updates** are applied on frames where nothing matched. The object
//     is assumed to be standing still: its last position is recorded again so the
//     trajectory keeps one entry per frame, but neither counter is touched.
//
// Only the association engine creates or mutates these; everything else reads them.

use crate::core_modules::detection::Detection;
use crate::core_modules::geometry::{Point2, RotatedRect};
use crate::core_modules::position_history::PositionHistory;
use std::fmt;

/// A process-unique, never-reused identity. Ordering follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID{}", self.0)
    }
}

/// The shape an object was last seen with.
#[derive(Debug, Clone, PartialEq)]
pub struct LastShape {
    pub position: Point2,
    pub oriented_box: RotatedRect,
    pub area: f64,
}

impl From<&Detection> for LastShape {
    fn from(detection: &Detection) -> Self {
        Self {
            position: detection.position,
            oriented_box: detection.oriented_box,
            area: detection.area,
        }
    }
}

/// A single identity tracked across frames.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    /// Unique identity assigned at creation.
    pub id: ObjectId,
    /// Shape from the most recent update, real or synthetic.
    pub last_shape: LastShape,
    /// Bounded trajectory, oldest first.
    pub position_history: PositionHistory,
    /// Consecutive frames since the last real match. Zero means matched this frame.
    pub frames_since_detection: u32,
    /// Number of real matches ever applied. Never decreases.
    pub confirmed_detection_count: u32,
}

impl TrackedObject {
    /// Creates an object from its first detection. The first detection counts as a
    /// real update, so the object starts with one confirmation and no misses.
    pub(crate) fn new(id: ObjectId, detection: &Detection, history_window_size: usize) -> Self {
        let mut object = Self {
            id,
            last_shape: LastShape::from(detection),
            position_history: PositionHistory::new(history_window_size),
            frames_since_detection: 0,
            confirmed_detection_count: 0,
        };
        object.apply_real_update(detection);
        object
    }

    pub(crate) fn apply_real_update(&mut self, detection: &Detection) {
        self.last_shape = LastShape::from(detection);
        self.position_history.push(detection.position);
        self.frames_since_detection = 0;
        self.confirmed_detection_count = self.confirmed_detection_count.saturating_add(1);
    }

    pub(crate) fn apply_synthetic_update(&mut self) {
        self.position_history.push(self.last_shape.position);
    }

    pub(crate) fn mark_missed(&mut self) {
        self.frames_since_detection = self.frames_since_detection.saturating_add(1);
    }

    /// Most recent recorded position, used as the match anchor.
    pub fn latest_position(&self) -> Point2 {
        self.position_history
            .latest()
            .copied()
            .unwrap_or(self.last_shape.position)
    }

    pub fn is_confirmed(&self, confirmation_threshold: u32) -> bool {
        self.confirmed_detection_count > confirmation_threshold
    }

    pub fn seen_this_frame(&self) -> bool {
        self.frames_since_detection == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection_at(x: f64, y: f64, area: f64) -> Detection {
        Detection::new(
            Point2::new(x, y),
            RotatedRect::axis_aligned(x - 5.0, y - 5.0, 10.0, 10.0),
            area,
        )
    }

    #[test]
    fn new_object_counts_first_detection() {
        let object = TrackedObject::new(ObjectId(0), &detection_at(1.0, 2.0, 100.0), 4);
        assert_eq!(object.confirmed_detection_count, 1);
        assert_eq!(object.frames_since_detection, 0);
        assert_eq!(object.position_history.len(), 1);
        assert_eq!(object.latest_position(), Point2::new(1.0, 2.0));
    }

    #[test]
    fn synthetic_update_repeats_last_position_without_touching_counters() {
        let mut object = TrackedObject::new(ObjectId(0), &detection_at(1.0, 2.0, 100.0), 4);
        object.mark_missed();
        object.apply_synthetic_update();
        assert_eq!(object.frames_since_detection, 1);
        assert_eq!(object.confirmed_detection_count, 1);
        assert_eq!(object.position_history.len(), 2);
        assert!(object.position_history.iter().all(|p| *p == Point2::new(1.0, 2.0)));
    }

    #[test]
    fn real_update_resets_misses() {
        let mut object = TrackedObject::new(ObjectId(0), &detection_at(1.0, 2.0, 100.0), 4);
        object.mark_missed();
        object.mark_missed();
        object.apply_real_update(&detection_at(3.0, 2.0, 110.0));
        assert_eq!(object.frames_since_detection, 0);
        assert_eq!(object.confirmed_detection_count, 2);
        assert_eq!(object.last_shape.area, 110.0);
    }

    #[test]
    fn confirmation_is_strictly_above_threshold() {
        let mut object = TrackedObject::new(ObjectId(0), &detection_at(0.0, 0.0, 100.0), 4);
        assert!(!object.is_confirmed(1));
        object.apply_real_update(&detection_at(0.0, 0.0, 100.0));
        assert!(!object.is_confirmed(2));
        assert!(object.is_confirmed(1));
    }

    #[test]
    fn ids_display_like_labels() {
        assert_eq!(ObjectId(7).to_string(), "ID7");
        assert!(ObjectId(1) < ObjectId(2));
    }
}
