//! Pose data model and the detector capability.
//!
//! - `landmark`: keypoints, anatomical order and skeleton edges.
//! - `result`: validated per-frame poses and raw detector output.
//! - `stats`: frozen run statistics.
//! - `config`: validated detector configuration.
//! - `detector`: the `PoseDetector` trait, scoped sessions and threshold
//!   tracking.
//! - `smoothing`: temporal landmark smoothing.
//! - `torch` (feature `with-tch`): TorchScript landmark model.

pub mod config;
pub mod detector;
pub mod error;
pub mod landmark;
pub mod result;
pub mod smoothing;
pub mod stats;
#[cfg(feature = "with-tch")]
pub mod torch;

pub use config::{DetectionConfig, ModelComplexity, RawDetectionConfig};
pub use detector::{ConfidenceGate, DetectorSession, PoseDetector, TrackedDetector};
pub use error::{ConfigError, DetectionError, InitError, ValidationError};
pub use landmark::{LANDMARK_COUNT, LANDMARK_FIELDS, LandmarkPoint, POSE_CONNECTIONS, PoseLandmark};
pub use result::{PoseResult, RawPose, mean_visibility};
pub use smoothing::LandmarkSmoother;
pub use stats::ProcessingStats;

#[cfg(feature = "with-tch")]
pub use tch;
#[cfg(feature = "with-tch")]
pub use torch::TorchPoseDetector;
