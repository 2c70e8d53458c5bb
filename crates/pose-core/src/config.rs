//! Validated detector configuration.
//!
//! `DetectionConfig` is only constructed through [`DetectionConfig::new`] or
//! the [`RawDetectionConfig`] conversion, so an instance in hand is always in
//! range. Out-of-range values are rejected, never clamped.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Detector quality/speed tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ModelComplexity {
    Lite,
    Full,
    Heavy,
}

impl ModelComplexity {
    /// Square input edge fed to the landmark model for this tier.
    pub fn input_edge(self) -> u32 {
        match self {
            ModelComplexity::Lite => 192,
            ModelComplexity::Full | ModelComplexity::Heavy => 256,
        }
    }
}

impl TryFrom<u8> for ModelComplexity {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ModelComplexity::Lite),
            1 => Ok(ModelComplexity::Full),
            2 => Ok(ModelComplexity::Heavy),
            other => Err(ConfigError::ModelComplexity(other)),
        }
    }
}

impl From<ModelComplexity> for u8 {
    fn from(value: ModelComplexity) -> Self {
        match value {
            ModelComplexity::Lite => 0,
            ModelComplexity::Full => 1,
            ModelComplexity::Heavy => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDetectionConfig")]
pub struct DetectionConfig {
    model_complexity: ModelComplexity,
    detection_confidence: f32,
    tracking_confidence: f32,
    segmentation: bool,
    smooth_landmarks: bool,
}

impl DetectionConfig {
    pub fn new(
        model_complexity: u8,
        detection_confidence: f32,
        tracking_confidence: f32,
        segmentation: bool,
        smooth_landmarks: bool,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            model_complexity: ModelComplexity::try_from(model_complexity)?,
            detection_confidence: unit_interval("detection_confidence", detection_confidence)?,
            tracking_confidence: unit_interval("tracking_confidence", tracking_confidence)?,
            segmentation,
            smooth_landmarks,
        })
    }

    pub fn model_complexity(&self) -> ModelComplexity {
        self.model_complexity
    }

    pub fn detection_confidence(&self) -> f32 {
        self.detection_confidence
    }

    pub fn tracking_confidence(&self) -> f32 {
        self.tracking_confidence
    }

    pub fn segmentation(&self) -> bool {
        self.segmentation
    }

    pub fn smooth_landmarks(&self) -> bool {
        self.smooth_landmarks
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_complexity: ModelComplexity::Full,
            detection_confidence: 0.5,
            tracking_confidence: 0.5,
            segmentation: false,
            smooth_landmarks: true,
        }
    }
}

fn unit_interval(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    // NaN fails the range check as well.
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Confidence { field, value })
    }
}

/// Unvalidated configuration as read from a JSON file or assembled from CLI
/// flags. Missing fields take the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawDetectionConfig {
    pub model_complexity: u8,
    #[serde(alias = "min_detection_confidence")]
    pub detection_confidence: f32,
    #[serde(alias = "min_tracking_confidence")]
    pub tracking_confidence: f32,
    #[serde(alias = "enable_segmentation")]
    pub segmentation: bool,
    pub smooth_landmarks: bool,
}

impl Default for RawDetectionConfig {
    fn default() -> Self {
        DetectionConfig::default().into()
    }
}

impl From<DetectionConfig> for RawDetectionConfig {
    fn from(config: DetectionConfig) -> Self {
        Self {
            model_complexity: config.model_complexity.into(),
            detection_confidence: config.detection_confidence,
            tracking_confidence: config.tracking_confidence,
            segmentation: config.segmentation,
            smooth_landmarks: config.smooth_landmarks,
        }
    }
}

impl TryFrom<RawDetectionConfig> for DetectionConfig {
    type Error = ConfigError;

    fn try_from(raw: RawDetectionConfig) -> Result<Self, Self::Error> {
        DetectionConfig::new(
            raw.model_complexity,
            raw.detection_confidence,
            raw.tracking_confidence,
            raw.segmentation,
            raw.smooth_landmarks,
        )
    }
}
