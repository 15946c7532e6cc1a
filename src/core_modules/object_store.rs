// THEORY:
// The `TrackedObjectStore` is the passive container for every identity the tracker
// currently knows about. It holds no matching logic. Its jobs are:
// 1.  **Ownership**: it owns the `TrackedObject`s, keyed by id. The map is ordered, so
//     iteration always visits objects in creation order, which is what makes
//     tie-breaking in the engine deterministic.
// 2.  **Identity allocation**: it hands out ids from a counter that only ever grows
//     until an explicit reset.
// 3.  **Queries**: consumers ask for confirmed objects, optionally restricted to
//     those matched in the current frame.
//
// Removal goes through `evict_stale`, a single keyed pass, so no caller ever prunes
// a collection while iterating it.

use crate::core_modules::tracked_object::{ObjectId, TrackedObject};
use std::collections::BTreeMap;

const FIRST_OBJECT_ID: u64 = 0;

/// The set of currently tracked identities.
#[derive(Debug, Clone)]
pub struct TrackedObjectStore {
    objects: BTreeMap<ObjectId, TrackedObject>,
    next_id: u64,
    confirmation_threshold: u32,
}

impl TrackedObjectStore {
    pub fn new(confirmation_threshold: u32) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: FIRST_OBJECT_ID,
            confirmation_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: ObjectId) -> Option<&TrackedObject> {
        self.objects.get(&id)
    }

    /// All tracked objects, confirmed or not, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedObject> {
        self.objects.values()
    }

    /// Objects whose real-match count exceeds the confirmation threshold.
    pub fn confirmed_objects(&self) -> Vec<&TrackedObject> {
        self.objects
            .values()
            .filter(|object| object.is_confirmed(self.confirmation_threshold))
            .collect()
    }

    /// Confirmed objects that were matched to a detection in the current frame.
    pub fn confirmed_objects_seen_now(&self) -> Vec<&TrackedObject> {
        self.objects
            .values()
            .filter(|object| object.is_confirmed(self.confirmation_threshold) && object.seen_this_frame())
            .collect()
    }

    /// Empties the store and restarts id allocation.
    pub fn reset(&mut self) {
        self.objects.clear();
        self.next_id = FIRST_OBJECT_ID;
    }

    pub(crate) fn allocate_id(&mut self) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, object: TrackedObject) {
        debug_assert!(!self.objects.contains_key(&object.id));
        self.objects.insert(object.id, object);
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut TrackedObject> {
        self.objects.get_mut(&id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedObject> {
        self.objects.values_mut()
    }

    /// Removes every object that has missed at least `eviction_threshold` frames and
    /// returns their ids in creation order.
    pub(crate) fn evict_stale(&mut self, eviction_threshold: u32) -> Vec<ObjectId> {
        let stale: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|object| object.frames_since_detection >= eviction_threshold)
            .map(|object| object.id)
            .collect();
        for id in &stale {
            self.objects.remove(id);
        }
        stale
    }
}
