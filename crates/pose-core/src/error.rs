use std::path::PathBuf;

use thiserror::Error;

/// Rejected `DetectionConfig` value. Configuration is never clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("model complexity must be 0, 1 or 2 (got {0})")]
    ModelComplexity(u8),
    #[error("{field} must be within [0, 1] (got {value})")]
    Confidence { field: &'static str, value: f32 },
}

/// A pose that violates the data model invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("expected {expected} landmarks, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },
    #[error("landmark {index} has a non-finite {field}")]
    NonFiniteLandmark { index: usize, field: &'static str },
    #[error("landmark {index} {field}={value} is outside [0, 1]")]
    LandmarkOutOfRange {
        index: usize,
        field: &'static str,
        value: f32,
    },
    #[error("pose confidence {0} is outside [0, 1]")]
    Confidence(f32),
    #[error("timestamp {0} must be finite and non-negative")]
    Timestamp(f64),
}

/// Per-frame detector failure. Recoverable: the frame is skipped.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("frame rejected by detector: {0}")]
    InvalidFrame(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Detector construction failure. Fatal for the run.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to load pose model {path:?}: {message}")]
    Model { path: PathBuf, message: String },
    #[error("no pose model given; pass --model <path>")]
    MissingModel,
    #[error("pose detector unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
