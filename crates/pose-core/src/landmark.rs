//! Skeletal keypoints and the fixed 33-point anatomical ordering.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of landmarks in every pose.
pub const LANDMARK_COUNT: usize = 33;

/// Per-landmark fields, in export column order.
pub const LANDMARK_FIELDS: [&str; 5] = ["x", "y", "z", "visibility", "presence"];

/// One skeletal keypoint. `x`/`y` are normalized image coordinates, `z` is a
/// unitless relative depth that may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
    pub presence: f32,
}

impl LandmarkPoint {
    pub const fn new(x: f32, y: f32, z: f32, visibility: f32, presence: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
            presence,
        }
    }

    /// Field values in [`LANDMARK_FIELDS`] order.
    pub fn values(&self) -> [f32; 5] {
        [self.x, self.y, self.z, self.visibility, self.presence]
    }

    /// Strict check used for constructed and parsed poses.
    pub fn validate(&self, index: usize) -> Result<(), ValidationError> {
        self.check_finite(index)?;
        for (field, value) in self.bounded_fields() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::LandmarkOutOfRange {
                    index,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Normalization used for raw detector output: non-finite values are
    /// rejected, finite values are clamped into range. `z` is left as is.
    pub fn clamped(self, index: usize) -> Result<Self, ValidationError> {
        self.check_finite(index)?;
        Ok(Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
            z: self.z,
            visibility: self.visibility.clamp(0.0, 1.0),
            presence: self.presence.clamp(0.0, 1.0),
        })
    }

    fn check_finite(&self, index: usize) -> Result<(), ValidationError> {
        for (field, value) in LANDMARK_FIELDS.iter().zip(self.values()) {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteLandmark { index, field });
            }
        }
        Ok(())
    }

    fn bounded_fields(&self) -> [(&'static str, f32); 4] {
        [
            ("x", self.x),
            ("y", self.y),
            ("visibility", self.visibility),
            ("presence", self.presence),
        ]
    }
}

/// Anatomical landmark order. Consumers index landmarks positionally, so the
/// discriminants are part of the output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl PoseLandmark {
    pub const ALL: [PoseLandmark; LANDMARK_COUNT] = [
        PoseLandmark::Nose,
        PoseLandmark::LeftEyeInner,
        PoseLandmark::LeftEye,
        PoseLandmark::LeftEyeOuter,
        PoseLandmark::RightEyeInner,
        PoseLandmark::RightEye,
        PoseLandmark::RightEyeOuter,
        PoseLandmark::LeftEar,
        PoseLandmark::RightEar,
        PoseLandmark::MouthLeft,
        PoseLandmark::MouthRight,
        PoseLandmark::LeftShoulder,
        PoseLandmark::RightShoulder,
        PoseLandmark::LeftElbow,
        PoseLandmark::RightElbow,
        PoseLandmark::LeftWrist,
        PoseLandmark::RightWrist,
        PoseLandmark::LeftPinky,
        PoseLandmark::RightPinky,
        PoseLandmark::LeftIndex,
        PoseLandmark::RightIndex,
        PoseLandmark::LeftThumb,
        PoseLandmark::RightThumb,
        PoseLandmark::LeftHip,
        PoseLandmark::RightHip,
        PoseLandmark::LeftKnee,
        PoseLandmark::RightKnee,
        PoseLandmark::LeftAnkle,
        PoseLandmark::RightAnkle,
        PoseLandmark::LeftHeel,
        PoseLandmark::RightHeel,
        PoseLandmark::LeftFootIndex,
        PoseLandmark::RightFootIndex,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Skeleton edges drawn on overlays, as landmark index pairs.
pub const POSE_CONNECTIONS: [(usize, usize); 35] = [
    // face
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    // arms and torso
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    (11, 23),
    (12, 24),
    (23, 24),
    // legs
    (23, 25),
    (25, 27),
    (27, 29),
    (27, 31),
    (29, 31),
    (24, 26),
    (26, 28),
    (28, 30),
    (28, 32),
    (30, 32),
];
