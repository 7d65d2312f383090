// THEORY:
// `PipelineConfig` is the single tunable surface of the engine. Every stage reads
// its own slice of it (extraction settings, tracker limits, overlay style), but
// callers configure and validate it as one document. Validation happens once,
// up front: a rejected value is an error for that configuration attempt and is
// never replaced by a default behind the caller's back.

use serde::{Deserialize, Serialize};

use crate::core_modules::color::Rgb;
use crate::core_modules::overlay::{DEFAULT_PALETTE, OverlayStyle};
use crate::core_modules::region_extractor::ExtractionSettings;
use crate::error::ConfigError;

pub use crate::core_modules::region_extractor::Segmentation;
pub use crate::core_modules::tracker::TrackerConfig;

/// Configuration for the VisionPipeline.
///
/// Missing fields in a JSON document take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmentation: Segmentation,
    /// Intensity cutoff; luma strictly above it is foreground.
    pub threshold_level: f64,
    /// Contours enclosing less area than this are treated as noise.
    pub min_contour_area: f64,
    /// Keep only this many of the largest objects per frame.
    pub max_objects: Option<usize>,
    pub max_match_distance: f64,
    pub max_frames_lost: u32,
    pub stroke_width: u32,
    pub palette: Vec<Rgb>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmentation: Segmentation::Threshold,
            threshold_level: 127.0,
            min_contour_area: 16.0,
            max_objects: None,
            max_match_distance: 25.0,
            max_frames_lost: 5,
            stroke_width: 2,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold_level.is_finite() || !(0.0..=255.0).contains(&self.threshold_level) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold_level));
        }
        if !self.min_contour_area.is_finite() || self.min_contour_area < 0.0 {
            return Err(ConfigError::NegativeMinArea(self.min_contour_area));
        }
        if let Segmentation::Canny {
            low_threshold,
            high_threshold,
        } = self.segmentation
        {
            let ordered = low_threshold.is_finite()
                && high_threshold.is_finite()
                && 0.0 <= low_threshold
                && low_threshold <= high_threshold;
            if !ordered {
                return Err(ConfigError::InvalidCanny {
                    low: low_threshold,
                    high: high_threshold,
                });
            }
        }
        if self.max_objects == Some(0) {
            return Err(ConfigError::ZeroMaxObjects);
        }
        self.tracker_config().validate()?;
        if self.stroke_width == 0 {
            return Err(ConfigError::ZeroStrokeWidth);
        }
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        Ok(())
    }

    pub fn extraction(&self) -> ExtractionSettings {
        ExtractionSettings {
            segmentation: self.segmentation,
            threshold_level: self.threshold_level,
            min_contour_area: self.min_contour_area,
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            max_match_distance: self.max_match_distance,
            max_frames_lost: self.max_frames_lost,
        }
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            stroke_width: self.stroke_width,
            palette: self.palette.clone(),
        }
    }
}
