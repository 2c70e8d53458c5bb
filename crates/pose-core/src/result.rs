use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    landmark::{LANDMARK_COUNT, LandmarkPoint},
};

/// One frame's detected pose. Only built through [`PoseResult::new`] or
/// [`RawPose::into_result`], so every instance carries exactly
/// [`LANDMARK_COUNT`] in-range landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PoseResultRecord")]
pub struct PoseResult {
    frame_id: u64,
    timestamp: f64,
    confidence: f32,
    source_file: String,
    landmarks: Vec<LandmarkPoint>,
}

impl PoseResult {
    pub fn new(
        frame_id: u64,
        timestamp: f64,
        confidence: f32,
        source_file: impl Into<String>,
        landmarks: Vec<LandmarkPoint>,
    ) -> Result<Self, ValidationError> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(ValidationError::Timestamp(timestamp));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ValidationError::Confidence(confidence));
        }
        if landmarks.len() != LANDMARK_COUNT {
            return Err(ValidationError::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: landmarks.len(),
            });
        }
        for (index, landmark) in landmarks.iter().enumerate() {
            landmark.validate(index)?;
        }

        Ok(Self {
            frame_id,
            timestamp,
            confidence,
            source_file: source_file.into(),
            landmarks,
        })
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Seconds from the start of the input; always 0 for still images.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    /// Landmarks in [`crate::PoseLandmark`] order.
    pub fn landmarks(&self) -> &[LandmarkPoint] {
        &self.landmarks
    }
}

#[derive(Deserialize)]
struct PoseResultRecord {
    frame_id: u64,
    timestamp: f64,
    confidence: f32,
    source_file: String,
    landmarks: Vec<LandmarkPoint>,
}

impl TryFrom<PoseResultRecord> for PoseResult {
    type Error = ValidationError;

    fn try_from(record: PoseResultRecord) -> Result<Self, Self::Error> {
        PoseResult::new(
            record.frame_id,
            record.timestamp,
            record.confidence,
            record.source_file,
            record.landmarks,
        )
    }
}

/// Unvalidated detector output for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPose {
    pub landmarks: Vec<LandmarkPoint>,
    /// Overall pose score; the mean landmark visibility is used when absent.
    pub confidence: Option<f32>,
}

impl RawPose {
    pub fn new(landmarks: Vec<LandmarkPoint>) -> Self {
        Self {
            landmarks,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Normalize into a [`PoseResult`]: wrong landmark counts and non-finite
    /// values are rejected, finite out-of-range values are clamped.
    pub fn into_result(
        self,
        frame_id: u64,
        timestamp: f64,
        source_file: impl Into<String>,
    ) -> Result<PoseResult, ValidationError> {
        if self.landmarks.len() != LANDMARK_COUNT {
            return Err(ValidationError::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: self.landmarks.len(),
            });
        }

        let landmarks = self
            .landmarks
            .into_iter()
            .enumerate()
            .map(|(index, landmark)| landmark.clamped(index))
            .collect::<Result<Vec<_>, _>>()?;

        let confidence = match self.confidence {
            Some(score) if !score.is_finite() => {
                return Err(ValidationError::Confidence(score));
            }
            Some(score) => score.clamp(0.0, 1.0),
            None => mean_visibility(&landmarks),
        };

        PoseResult::new(frame_id, timestamp, confidence, source_file, landmarks)
    }
}

/// Mean landmark visibility, the fallback pose score.
pub fn mean_visibility(landmarks: &[LandmarkPoint]) -> f32 {
    if landmarks.is_empty() {
        return 0.0;
    }
    let sum: f32 = landmarks.iter().map(|lm| lm.visibility).sum();
    (sum / landmarks.len() as f32).clamp(0.0, 1.0)
}
