// THEORY:
// A `Detection` is the tracker's only view of a single frame: where a blob is, how
// it is oriented, and how big it is. It is a stateless snapshot, distinct from a
// `TrackedObject`, which carries identity and memory across frames.
//
// Detections are produced by an external detector. The tracker does not clean them
// up; it checks them and refuses the whole frame if any one is malformed, so a
// detector bug shows up as an error instead of as silently missing objects.

use crate::core_modules::geometry::{Geometry, Point2, RotatedRect};
use crate::error::{Result, TrackingError};

/// One object observed in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Center of mass of the detected shape.
    pub position: Point2,
    /// Minimal rotated rectangle enclosing the shape.
    pub oriented_box: RotatedRect,
    /// Area of the shape in pixels.
    pub area: f64,
}

impl Detection {
    pub fn new(position: Point2, oriented_box: RotatedRect, area: f64) -> Self {
        Self {
            position,
            oriented_box,
            area,
        }
    }

    /// Builds a detection from a raw shape through the geometry collaborator.
    /// `index` is the shape's position in the frame and is only used for error reporting.
    pub fn from_shape<G: Geometry>(geometry: &G, shape: &G::Shape, index: usize) -> Result<Self> {
        let position = geometry
            .center_of(shape)
            .ok_or_else(|| TrackingError::invalid_detection(index, "center of mass is undefined"))?;
        let detection = Self::new(
            position,
            geometry.oriented_bounding_box_of(shape),
            geometry.area_of(shape),
        );
        detection.validate(index)?;
        Ok(detection)
    }

    /// Checks the engine's input contract.
    pub fn validate(&self, index: usize) -> Result<()> {
        if !self.position.is_finite() {
            return Err(TrackingError::invalid_detection(index, "position is not finite"));
        }
        if !self.area.is_finite() || self.area <= 0.0 {
            return Err(TrackingError::invalid_detection(
                index,
                format!("area must be positive, got {}", self.area),
            ));
        }
        if !self.oriented_box.is_well_formed() {
            return Err(TrackingError::invalid_detection(index, "oriented box is degenerate"));
        }
        Ok(())
    }
}
