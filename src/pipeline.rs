// THEORY:
// The `pipeline` module is the top-level, single-stream API. It couples the
// reference `BlobDetector` to the `Tracker` so a caller can hand in a foreground
// mask per frame and read back identities. Callers with their own detector skip
// the mask stage and feed detections directly.
//
// One `TrackingPipeline` serves exactly one video stream and processes one frame at
// a time. Hosts that watch several streams keep one pipeline per stream (see
// `parallel_pipeline`).

use crate::config::{DetectorConfig, TrackerConfig};
use crate::core_modules::blob_detector::BlobDetector;
use crate::core_modules::detection::Detection;
use crate::core_modules::geometry::PixelBlobGeometry;
use crate::core_modules::tracker::Tracker;
use crate::error::Result;
use image::GrayImage;

// Re-export key data structures for the public API.
pub use crate::core_modules::tracked_object::{ObjectId, TrackedObject};
pub use crate::core_modules::tracker::FrameSummary;

/// The per-frame output of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Zero-based index of the frame since construction or the last reset.
    pub frame_index: u64,
    /// Number of detections the frame carried.
    pub detection_count: usize,
    pub summary: FrameSummary,
    /// Confirmed objects matched in this frame, in creation order.
    pub seen_now: Vec<ObjectId>,
}

impl FrameReport {
    pub fn has_activity(&self) -> bool {
        !self.seen_now.is_empty()
    }
}

/// The main, top-level struct for a single tracked stream.
pub struct TrackingPipeline {
    detector: BlobDetector,
    tracker: Tracker<PixelBlobGeometry>,
    frame_count: u64,
}

impl TrackingPipeline {
    pub fn new(tracker_config: TrackerConfig, detector_config: DetectorConfig) -> Result<Self> {
        Ok(Self {
            detector: BlobDetector::new(detector_config)?,
            tracker: Tracker::with_geometry(tracker_config, PixelBlobGeometry)?,
            frame_count: 0,
        })
    }

    /// Extracts blobs from a foreground mask and tracks them.
    pub fn process_mask(&mut self, mask: &GrayImage) -> Result<FrameReport> {
        let detections = self.detector.detect(mask)?;
        self.process_detections(&detections)
    }

    /// Tracks detections produced by an external detector.
    pub fn process_detections(&mut self, detections: &[Detection]) -> Result<FrameReport> {
        let summary = self.tracker.update(detections)?;
        let frame_index = self.frame_count;
        self.frame_count += 1;

        let seen_now = self
            .tracker
            .store()
            .confirmed_objects_seen_now()
            .iter()
            .map(|object| object.id)
            .collect();

        Ok(FrameReport {
            frame_index,
            detection_count: detections.len(),
            summary,
            seen_now,
        })
    }

    /// Confirmed objects, optionally only those matched in the latest frame.
    pub fn tracked_objects(&self, only_seen_now: bool) -> Vec<&TrackedObject> {
        let store = self.tracker.store();
        if only_seen_now {
            store.confirmed_objects_seen_now()
        } else {
            store.confirmed_objects()
        }
    }

    /// Every object in the store, confirmed or not.
    pub fn all_objects(&self) -> impl Iterator<Item = &TrackedObject> {
        self.tracker.store().iter()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Starts over from an empty store, e.g. after a scene cut.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.frame_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GapFilling;
    use image::Luma;

    fn mask_with_square(x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn pipeline() -> TrackingPipeline {
        TrackingPipeline::new(
            TrackerConfig {
                history_window_size: 8,
                confirmation_threshold: 2,
                eviction_threshold: 3,
                area_similarity_tolerance: 0.3,
            },
            DetectorConfig {
                min_object_area: 4.0,
                noise_filter_radius: 0,
                gap_filling: GapFilling::None,
            },
        )
        .expect("valid config")
    }

    #[test]
    fn moving_square_keeps_identity_and_gets_confirmed() {
        let mut pipeline = pipeline();
        let mut last = None;
        for step in 0..4 {
            last = Some(pipeline.process_mask(&mask_with_square(10 + step, 10, 8)).expect("frame"));
        }
        let report = last.expect("report");
        assert_eq!(report.frame_index, 3);
        assert_eq!(report.seen_now, vec![ObjectId(0)]);
        assert!(report.has_activity());
        assert_eq!(pipeline.all_objects().count(), 1);
    }

    #[test]
    fn unconfirmed_objects_are_hidden_from_queries() {
        let mut pipeline = pipeline();
        let report = pipeline.process_mask(&mask_with_square(10, 10, 8)).expect("frame");
        assert!(report.seen_now.is_empty());
        assert!(pipeline.tracked_objects(false).is_empty());
        assert_eq!(pipeline.all_objects().count(), 1);
    }

    #[test]
    fn missed_frame_hides_object_from_seen_now_only() {
        let mut pipeline = pipeline();
        for _ in 0..3 {
            pipeline.process_mask(&mask_with_square(10, 10, 8)).expect("frame");
        }
        pipeline.process_mask(&GrayImage::new(64, 64)).expect("frame");
        assert_eq!(pipeline.tracked_objects(false).len(), 1);
        assert!(pipeline.tracked_objects(true).is_empty());
    }

    #[test]
    fn reset_clears_frames_and_objects() {
        let mut pipeline = pipeline();
        pipeline.process_mask(&mask_with_square(10, 10, 8)).expect("frame");
        pipeline.reset();
        assert_eq!(pipeline.frame_count(), 0);
        assert_eq!(pipeline.all_objects().count(), 0);
        let report = pipeline.process_mask(&mask_with_square(30, 30, 8)).expect("frame");
        assert_eq!(report.summary.spawned, vec![(0, ObjectId(0))]);
    }
}
