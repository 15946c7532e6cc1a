// THEORY:
// The `BlobDetector` is a reference detector: it turns a binary foreground mask
// (any non-zero pixel is foreground) into the list of `Detection`s the tracker
// consumes. How the mask is produced (background subtraction, thresholding, shadow
// removal) is left to the caller.
//
// Steps:
// 1.  **Noise Removal**: a morphological opening strips foreground specks smaller
//     than its structuring element while leaving solid regions in place.
// 2.  **Gap Filling**: a median or bilateral pass closes pinholes and small cracks
//     so one physical object does not fall apart into many small components. The
//     bilateral output is greyscale and is thresholded back to a binary mask.
// 3.  **Region Growing**: every unvisited foreground pixel seeds a flood fill over
//     its 4-connected neighbours. A `visited` grid ensures each pixel belongs to
//     exactly one component.
// 4.  **Size Filter**: components at or below the configured minimum area are noise.
// 5.  **Measurement**: surviving components are measured through
//     `PixelBlobGeometry` and packaged as detections.
//
// Like the geometry it relies on, the detector is stateless: it has no memory of
// previous frames.

use crate::config::{DetectorConfig, GapFilling};
use crate::core_modules::detection::Detection;
use crate::core_modules::geometry::{Geometry, PixelBlob, PixelBlobGeometry};
use crate::error::Result;
use image::GrayImage;
use imageproc::contrast::{ThresholdType, threshold};
use imageproc::distance_transform::Norm;
use imageproc::filter::bilateral::{GaussianEuclideanColorDistance, bilateral_filter};
use imageproc::filter::median_filter;
use imageproc::morphology;

/// Grey level above which a filtered pixel counts as foreground again.
const REBINARIZE_LEVEL: u8 = 127;

/// Extracts blob detections from foreground masks.
#[derive(Debug, Clone)]
pub struct BlobDetector {
    config: DetectorConfig,
    geometry: PixelBlobGeometry,
}

impl BlobDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            geometry: PixelBlobGeometry,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Finds every sufficiently large connected foreground region, in raster order
    /// of the region's first pixel.
    pub fn detect(&self, mask: &GrayImage) -> Result<Vec<Detection>> {
        let mask = self.clean_mask(mask);

        find_blobs(&mask)
            .into_iter()
            .filter(|blob| self.geometry.area_of(blob) > self.config.min_object_area)
            .enumerate()
            .map(|(index, blob)| Detection::from_shape(&self.geometry, &blob, index))
            .collect()
    }

    /// Binarizes the mask, then runs noise removal and gap filling.
    pub fn clean_mask(&self, mask: &GrayImage) -> GrayImage {
        let mut mask = threshold(mask, 0, ThresholdType::Binary);

        if self.config.noise_filter_radius > 0 {
            // The L1 ball of radius 1 is the 3x3 ellipse.
            mask = morphology::open(&mask, Norm::L1, self.config.noise_filter_radius);
        }

        match self.config.gap_filling {
            GapFilling::None => mask,
            GapFilling::Median { kernel_size } => {
                let radius = kernel_size / 2;
                median_filter(&mask, radius, radius)
            }
            GapFilling::Bilateral {
                diameter,
                sigma_color,
                sigma_space,
            } => {
                let radius = u8::try_from(diameter / 2).unwrap_or(u8::MAX);
                let smoothed = bilateral_filter(
                    &mask,
                    radius,
                    sigma_space,
                    GaussianEuclideanColorDistance::new(sigma_color),
                );
                threshold(&smoothed, REBINARIZE_LEVEL, ThresholdType::Binary)
            }
        }
    }
}

/// Splits the mask's foreground into 4-connected components.
pub fn find_blobs(mask: &GrayImage) -> Vec<PixelBlob> {
    let (width, height) = mask.dimensions();
    let mut visited = vec![false; (width as usize) * (height as usize)];
    let mut blobs = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let index = (y * width + x) as usize;
            if visited[index] || mask.get_pixel(x, y)[0] == 0 {
                continue;
            }
            blobs.push(grow_blob(mask, &mut visited, x, y));
        }
    }

    blobs
}

/// Depth-first flood fill from a seed pixel.
fn grow_blob(mask: &GrayImage, visited: &mut [bool], seed_x: u32, seed_y: u32) -> PixelBlob {
    let (width, height) = mask.dimensions();
    let mut pixels = Vec::new();
    let mut stack = vec![(seed_x, seed_y)];
    visited[(seed_y * width + seed_x) as usize] = true;

    while let Some((x, y)) = stack.pop() {
        pixels.push((x, y));

        for (dx, dy) in [(0i64, 1i64), (0, -1), (1, 0), (-1, 0)] {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            let index = (ny * width + nx) as usize;
            if !visited[index] && mask.get_pixel(nx, ny)[0] != 0 {
                visited[index] = true;
                stack.push((nx, ny));
            }
        }
    }

    PixelBlob { pixels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Luma;

    fn mask_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = rects
                .iter()
                .any(|&(rx, ry, rw, rh)| x >= rx && x < rx + rw && y >= ry && y < ry + rh);
            Luma([if inside { 255 } else { 0 }])
        })
    }

    fn detector(min_object_area: f64, noise_filter_radius: u8, gap_filling: GapFilling) -> BlobDetector {
        BlobDetector::new(DetectorConfig {
            min_object_area,
            noise_filter_radius,
            gap_filling,
        })
        .expect("valid config")
    }

    #[test]
    fn separates_disjoint_regions() {
        let mask = mask_with_rects(40, 20, &[(2, 2, 5, 5), (20, 10, 6, 4)]);
        let blobs = find_blobs(&mask);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].pixels.len(), 25);
        assert_eq!(blobs[1].pixels.len(), 24);
    }

    #[test]
    fn diagonal_neighbours_are_separate_components() {
        let mask = mask_with_rects(4, 4, &[(0, 0, 1, 1), (1, 1, 1, 1)]);
        assert_eq!(find_blobs(&mask).len(), 2);
    }

    #[test]
    fn detect_measures_blobs_and_filters_small_ones() {
        let mask = mask_with_rects(60, 60, &[(10, 10, 10, 20), (40, 40, 2, 2)]);
        let detections = detector(10.0, 0, GapFilling::None).detect(&mask).expect("detections");
        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_abs_diff_eq!(detection.area, 200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(detection.position.x, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(detection.position.y, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(detection.oriented_box.area(), 200.0, epsilon = 1e-6);
    }

    #[test]
    fn median_filter_removes_speckle_and_fills_pinholes() {
        let mut mask = mask_with_rects(40, 40, &[(10, 10, 12, 12), (32, 32, 1, 1)]);
        mask.put_pixel(15, 15, Luma([0]));
        let cleaned = detector(0.0, 0, GapFilling::median()).clean_mask(&mask);
        assert_eq!(cleaned.get_pixel(15, 15)[0], 255);
        assert_eq!(cleaned.get_pixel(32, 32)[0], 0);

        // A 5x5 median also rounds off three pixels at each corner.
        let detections = detector(0.0, 0, GapFilling::median()).detect(&mask).expect("detections");
        assert_eq!(detections.len(), 1);
        assert_abs_diff_eq!(detections[0].area, 144.0 - 12.0, epsilon = 1e-9);
    }

    #[test]
    fn opening_removes_small_speckle() {
        let mask = mask_with_rects(40, 40, &[(5, 5, 10, 10), (30, 30, 2, 2)]);
        let raw = detector(0.0, 0, GapFilling::None).detect(&mask).expect("detections");
        assert_eq!(raw.len(), 2);

        let opened = detector(0.0, 1, GapFilling::None).detect(&mask).expect("detections");
        assert_eq!(opened.len(), 1);
        assert_abs_diff_eq!(opened[0].position.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(opened[0].position.y, 10.0, epsilon = 1e-9);
        // Only the four corner pixels are lost to the cross-shaped element.
        assert_abs_diff_eq!(opened[0].area, 96.0, epsilon = 1e-9);
    }

    #[test]
    fn bilateral_keeps_solid_square_intact() {
        let mask = mask_with_rects(40, 40, &[(12, 12, 12, 12)]);
        let cleaned = detector(0.0, 0, GapFilling::bilateral()).clean_mask(&mask);
        assert_eq!(cleaned, mask);

        let detections = detector(0.0, 0, GapFilling::bilateral()).detect(&mask).expect("detections");
        assert_eq!(detections.len(), 1);
        assert_abs_diff_eq!(detections[0].area, 144.0, epsilon = 1e-9);
        assert_abs_diff_eq!(detections[0].position.x, 18.0, epsilon = 1e-9);
    }

    #[test]
    fn any_non_zero_pixel_is_foreground() {
        let mut mask = GrayImage::new(20, 20);
        for y in 4..10 {
            for x in 4..10 {
                mask.put_pixel(x, y, Luma([1]));
            }
        }
        let detections = detector(0.0, 0, GapFilling::None).detect(&mask).expect("detections");
        assert_eq!(detections.len(), 1);
        assert_abs_diff_eq!(detections[0].area, 36.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_mask_yields_nothing() {
        let mask = GrayImage::new(16, 16);
        assert!(detector(0.0, 1, GapFilling::median()).detect(&mask).expect("ok").is_empty());
    }
}
