pub mod blob_detector;
pub mod detection;
pub mod geometry;
pub mod object_store;
pub mod position_history;
pub mod tracked_object;
pub mod tracker;
