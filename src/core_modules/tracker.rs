// THEORY:
// The `tracker` module is the association engine. It adds "object permanence" to
// the system: it takes the stateless list of `Detection`s for one frame and decides
// which of them are objects it has seen before.
//
// Every frame runs the same five phases, in order:
// 1.  **Aging**: every known object's miss counter goes up by one. Doing this first
//     lets a match later in the frame reset it to exactly zero.
// 2.  **Matching**: detections are handled one at a time, in the order given. For
//     each one, the candidates are the objects whose last box intersects the
//     detection's box and whose area is within tolerance. The candidate whose most
//     recent position is nearest wins; on equal distance the older id wins. An
//     object already claimed in this frame is not a candidate again. A detection
//     with no candidate becomes a new object.
// 3.  **Eviction**: objects that have now missed too many frames are removed. This
//     runs after matching so an object can still be rescued on its last frame.
// 4.  **Synthetic updates**: every surviving object that was not matched is assumed
//     to be standing still, and its last position is recorded again.
// 5.  **Report**: a `FrameSummary` says what happened to every detection.
//
// The matching is greedy and local: an earlier detection can take an object that a
// later detection was closer to. That order dependence is intended; this is not a
// global assignment solver.

use crate::config::TrackerConfig;
use crate::core_modules::detection::Detection;
use crate::core_modules::geometry::{ContourGeometry, Geometry};
use crate::core_modules::object_store::TrackedObjectStore;
use crate::core_modules::tracked_object::{ObjectId, TrackedObject};
use crate::error::Result;
use log::{debug, info, trace, warn};

/// What one call to `Tracker::update` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// `(detection index, object)` pairs for detections matched to an existing object.
    pub matched: Vec<(usize, ObjectId)>,
    /// `(detection index, object)` pairs for detections that started a new object.
    pub spawned: Vec<(usize, ObjectId)>,
    /// Objects removed at the end of the frame, in creation order.
    pub evicted: Vec<ObjectId>,
}

impl FrameSummary {
    /// The object a detection ended up attached to.
    pub fn object_for(&self, detection_index: usize) -> Option<ObjectId> {
        self.matched
            .iter()
            .chain(self.spawned.iter())
            .find(|(index, _)| *index == detection_index)
            .map(|(_, id)| *id)
    }
}

/// True when two areas are within the relative tolerance. A zero (or otherwise
/// unusable) reference area never counts as similar.
fn area_similar(detection_area: f64, object_area: f64, tolerance: f64) -> bool {
    if object_area == 0.0 || !object_area.is_finite() {
        return false;
    }
    (1.0 - detection_area / object_area).abs() < tolerance
}

/// Associates per-frame detections with persistent identities.
pub struct Tracker<G: Geometry = ContourGeometry> {
    store: TrackedObjectStore,
    config: TrackerConfig,
    geometry: G,
}

impl Tracker<ContourGeometry> {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        Self::with_geometry(config, ContourGeometry)
    }
}

impl<G: Geometry> Tracker<G> {
    pub fn with_geometry(config: TrackerConfig, geometry: G) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: TrackedObjectStore::new(config.confirmation_threshold),
            config,
            geometry,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &TrackedObjectStore {
        &self.store
    }

    /// Runs one frame. If any detection is malformed the frame is rejected and the
    /// store is left exactly as it was.
    pub fn update(&mut self, detections: &[Detection]) -> Result<FrameSummary> {
        // --- 0. Contract Check ---
        for (index, detection) in detections.iter().enumerate() {
            if let Err(err) = detection.validate(index) {
                warn!("Rejecting frame with {} detections: {}", detections.len(), err);
                return Err(err);
            }
        }

        let mut summary = FrameSummary::default();

        // --- 1. Aging ---
        for object in self.store.iter_mut() {
            object.mark_missed();
        }

        // --- 2. Matching ---
        for (index, detection) in detections.iter().enumerate() {
            match self.find_match(detection) {
                Some(id) => {
                    if let Some(object) = self.store.get_mut(id) {
                        object.apply_real_update(detection);
                    }
                    trace!("Detection {} matched {}", index, id);
                    summary.matched.push((index, id));
                }
                None => {
                    let id = self.store.allocate_id();
                    self.store
                        .insert(TrackedObject::new(id, detection, self.config.history_window_size));
                    trace!("Detection {} spawned {}", index, id);
                    summary.spawned.push((index, id));
                }
            }
        }

        // --- 3. Eviction ---
        summary.evicted = self.store.evict_stale(self.config.eviction_threshold);

        // --- 4. Synthetic Updates ---
        for object in self.store.iter_mut().filter(|object| !object.seen_this_frame()) {
            object.apply_synthetic_update();
        }

        debug!(
            "Frame processed: {} matched, {} spawned, {} evicted, {} tracked",
            summary.matched.len(),
            summary.spawned.len(),
            summary.evicted.len(),
            self.store.len()
        );
        Ok(summary)
    }

    /// Nearest eligible object for `detection`, if any. Objects are visited in id
    /// order and only a strictly smaller distance replaces the current best, so ties
    /// go to the oldest object.
    fn find_match(&self, detection: &Detection) -> Option<ObjectId> {
        let mut best: Option<(ObjectId, f64)> = None;

        for object in self.store.iter() {
            // Already claimed (or created) in this frame.
            if object.seen_this_frame() {
                continue;
            }
            if !self
                .geometry
                .intersects(&detection.oriented_box, &object.last_shape.oriented_box)
            {
                continue;
            }
            if !area_similar(
                detection.area,
                object.last_shape.area,
                self.config.area_similarity_tolerance,
            ) {
                continue;
            }

            let dist = detection.position.distance(&object.latest_position());
            if best.is_none_or(|(_, best_dist)| dist < best_dist) {
                best = Some((object.id, dist));
            }
        }

        best.map(|(id, _)| id)
    }

    /// Drops every tracked object and restarts id allocation.
    pub fn reset(&mut self) {
        info!("Resetting tracker ({} objects dropped)", self.store.len());
        self.store.reset();
    }
}
