// THEORY:
// This file is the entry point for the `blobtrack` library crate. It exposes the
// association engine and its data model, plus two convenience layers built on top:
// the single-stream `TrackingPipeline` and the multi-stream `StreamHub`.
//
// Layering, leaves first:
// 1.  `core_modules::geometry` answers shape questions (center, area, rotated box,
//     box intersection).
// 2.  `core_modules::detection` and `core_modules::tracked_object` are the data
//     model: per-frame snapshots and persistent identities.
// 3.  `core_modules::object_store` holds the identities; `core_modules::tracker`
//     is the only thing that changes them.
// 4.  `pipeline` and `parallel_pipeline` wire a detector and the tracker together
//     for one stream or many.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::{DetectorConfig, GapFilling, TrackerConfig};
pub use core_modules::detection::Detection;
pub use core_modules::geometry::{
    Contour, ContourGeometry, Geometry, PixelBlob, PixelBlobGeometry, Point2, RotatedRect,
};
pub use core_modules::object_store::TrackedObjectStore;
pub use core_modules::tracked_object::{ObjectId, TrackedObject};
pub use core_modules::tracker::{FrameSummary, Tracker};
pub use error::{Result, TrackingError};
pub use parallel_pipeline::{StreamHandle, StreamHub};
pub use pipeline::{FrameReport, TrackingPipeline};
