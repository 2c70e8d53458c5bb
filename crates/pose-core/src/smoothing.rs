use crate::landmark::LandmarkPoint;

const DEFAULT_ALPHA: f32 = 0.5;

/// Exponential smoothing of landmark coordinates across consecutive
/// detections. Scores are passed through untouched.
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
    alpha: f32,
    previous: Option<Vec<LandmarkPoint>>,
}

impl Default for LandmarkSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl LandmarkSmoother {
    /// `alpha` is the weight of the newest sample, clamped to (0, 1].
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            previous: None,
        }
    }

    /// Blend `landmarks` with the history. A sample with a non-finite
    /// coordinate is returned as is and clears the history.
    pub fn smooth(&mut self, landmarks: Vec<LandmarkPoint>) -> Vec<LandmarkPoint> {
        let finite = landmarks
            .iter()
            .all(|lm| lm.x.is_finite() && lm.y.is_finite() && lm.z.is_finite());
        if !finite {
            self.reset();
            return landmarks;
        }

        let smoothed = match self.previous.as_ref() {
            Some(prev) if prev.len() == landmarks.len() => landmarks
                .iter()
                .zip(prev)
                .map(|(cur, old)| LandmarkPoint {
                    x: self.blend(cur.x, old.x),
                    y: self.blend(cur.y, old.y),
                    z: self.blend(cur.z, old.z),
                    ..*cur
                })
                .collect(),
            _ => landmarks,
        };
        self.previous = Some(smoothed.clone());
        smoothed
    }

    /// Forget history, e.g. after a frame without a pose.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    fn blend(&self, current: f32, previous: f32) -> f32 {
        self.alpha * current + (1.0 - self.alpha) * previous
    }
}
