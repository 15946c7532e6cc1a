// THEORY:
// Configuration for the tracker and its reference detector. Every value here is
// fixed at construction time: the engine never re-derives or mutates a threshold
// while frames are flowing. Both structs deserialize from JSON so a host can keep
// its tuning in a file next to the video source it watches.

use crate::error::{Result, TrackingError};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_HISTORY_WINDOW_SIZE: usize = 30;
const DEFAULT_CONFIRMATION_THRESHOLD: u32 = 3;
const DEFAULT_EVICTION_THRESHOLD: u32 = 10;
const DEFAULT_AREA_SIMILARITY_TOLERANCE: f64 = 0.5;
const DEFAULT_MIN_OBJECT_AREA: f64 = 100.0;
const DEFAULT_NOISE_FILTER_RADIUS: u8 = 1;
const DEFAULT_MEDIAN_KERNEL_SIZE: u32 = 5;
const DEFAULT_BILATERAL_DIAMETER: u32 = 9;
const DEFAULT_BILATERAL_SIGMA: f32 = 75.0;
const MAX_FILTER_SIZE: u32 = 255;

/// Tunable thresholds for the association engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum number of positions kept per tracked object (K).
    pub history_window_size: usize,
    /// An object is confirmed once its real-match count exceeds this value (C).
    pub confirmation_threshold: u32,
    /// An object is evicted once it has gone this many frames without a real match (R).
    pub eviction_threshold: u32,
    /// Maximum relative area change `|1 - new/old|` accepted for a match (T).
    pub area_similarity_tolerance: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_window_size: DEFAULT_HISTORY_WINDOW_SIZE,
            confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
            eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
            area_similarity_tolerance: DEFAULT_AREA_SIMILARITY_TOLERANCE,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_window_size == 0 {
            return Err(TrackingError::config("history_window_size must be at least 1"));
        }
        if self.eviction_threshold == 0 {
            return Err(TrackingError::config("eviction_threshold must be at least 1"));
        }
        if !self.area_similarity_tolerance.is_finite() || self.area_similarity_tolerance <= 0.0 {
            return Err(TrackingError::config(format!(
                "area_similarity_tolerance must be a positive finite number, got {}",
                self.area_similarity_tolerance
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Gap filling applied to the foreground mask after noise removal, so one physical
/// object does not fall apart into several components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFilling {
    /// Use the mask as-is.
    None,
    /// Square median filter of side `kernel_size` (odd).
    Median { kernel_size: u32 },
    /// Edge-preserving bilateral filter over a `diameter` wide window. The result is
    /// re-binarized at half intensity.
    Bilateral {
        diameter: u32,
        sigma_color: f32,
        sigma_space: f32,
    },
}

impl GapFilling {
    /// 5x5 median.
    pub const fn median() -> Self {
        Self::Median {
            kernel_size: DEFAULT_MEDIAN_KERNEL_SIZE,
        }
    }

    /// 9 pixel window, sigma 75 in both intensity and space.
    pub const fn bilateral() -> Self {
        Self::Bilateral {
            diameter: DEFAULT_BILATERAL_DIAMETER,
            sigma_color: DEFAULT_BILATERAL_SIGMA,
            sigma_space: DEFAULT_BILATERAL_SIGMA,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::None => Ok(()),
            Self::Median { kernel_size } => {
                if kernel_size % 2 == 0 || kernel_size > MAX_FILTER_SIZE {
                    return Err(TrackingError::config(format!(
                        "median kernel_size must be odd and at most {MAX_FILTER_SIZE}, got {kernel_size}"
                    )));
                }
                Ok(())
            }
            Self::Bilateral {
                diameter,
                sigma_color,
                sigma_space,
            } => {
                if diameter == 0 || diameter > MAX_FILTER_SIZE {
                    return Err(TrackingError::config(format!(
                        "bilateral diameter must be between 1 and {MAX_FILTER_SIZE}, got {diameter}"
                    )));
                }
                if !(sigma_color.is_finite() && sigma_color > 0.0 && sigma_space.is_finite() && sigma_space > 0.0) {
                    return Err(TrackingError::config(format!(
                        "bilateral sigmas must be positive finite numbers, got {sigma_color} and {sigma_space}"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl Default for GapFilling {
    fn default() -> Self {
        Self::median()
    }
}

/// Settings for the reference mask-based detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Components with an area at or below this value are discarded as noise.
    pub min_object_area: f64,
    /// Radius of the morphological opening that strips sparse foreground pixels.
    /// 0 disables the stage.
    pub noise_filter_radius: u8,
    pub gap_filling: GapFilling,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_object_area: DEFAULT_MIN_OBJECT_AREA,
            noise_filter_radius: DEFAULT_NOISE_FILTER_RADIUS,
            gap_filling: GapFilling::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_object_area.is_finite() || self.min_object_area < 0.0 {
            return Err(TrackingError::config(format!(
                "min_object_area must be a non-negative finite number, got {}",
                self.min_object_area
            )));
        }
        self.gap_filling.validate()
    }
}
