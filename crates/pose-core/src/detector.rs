//! Detector capability consumed by the frame processor.

use image::RgbImage;
use tracing::debug;

use crate::{
    config::DetectionConfig,
    error::{DetectionError, ValidationError},
    result::{RawPose, mean_visibility},
    smoothing::LandmarkSmoother,
};

/// A single-person pose model. Implementations are driven from one thread,
/// one frame at a time, in frame order.
pub trait PoseDetector {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// `Ok(None)` means no person was found, which is an expected outcome and
    /// not an error.
    fn detect(&mut self, image: &RgbImage) -> Result<Option<RawPose>, DetectionError>;

    /// Release model resources. Called exactly once by [`DetectorSession`].
    fn close(&mut self) {}
}

impl<D: PoseDetector + ?Sized> PoseDetector for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Option<RawPose>, DetectionError> {
        (**self).detect(image)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Owns an initialized detector and guarantees `close` runs once, either on
/// an explicit [`DetectorSession::close`] or when the session is dropped.
pub struct DetectorSession<D: PoseDetector> {
    detector: D,
    closed: bool,
}

impl<D: PoseDetector> DetectorSession<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            closed: false,
        }
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            debug!(detector = self.detector.name(), "closing pose detector");
            self.detector.close();
        }
    }
}

impl<D: PoseDetector> Drop for DetectorSession<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Chooses between the detection and tracking thresholds: while a pose was
/// found on the previous frame the (usually lower) tracking threshold applies.
#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    detection: f32,
    tracking: f32,
    tracking_active: bool,
}

impl ConfidenceGate {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            detection: config.detection_confidence(),
            tracking: config.tracking_confidence(),
            tracking_active: false,
        }
    }

    pub fn threshold(&self) -> f32 {
        if self.tracking_active {
            self.tracking
        } else {
            self.detection
        }
    }

    /// Returns whether `score` is accepted and updates the tracking state.
    pub fn admit(&mut self, score: f32) -> bool {
        let accepted = score >= self.threshold();
        self.tracking_active = accepted;
        accepted
    }

    pub fn reset(&mut self) {
        self.tracking_active = false;
    }
}

/// Applies the detection/tracking thresholds and optional landmark smoothing
/// on top of a raw landmark model.
///
/// A frame whose score falls below the active threshold becomes `Ok(None)`.
/// Non-finite landmarks or scores are rejected before they reach the
/// smoother. Any frame without an accepted pose resets both the gate and the
/// smoothing history.
pub struct TrackedDetector<D> {
    inner: D,
    gate: ConfidenceGate,
    smoother: Option<LandmarkSmoother>,
}

impl<D: PoseDetector> TrackedDetector<D> {
    pub fn new(inner: D, config: &DetectionConfig) -> Self {
        Self {
            inner,
            gate: ConfidenceGate::new(config),
            smoother: config.smooth_landmarks().then(LandmarkSmoother::default),
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    fn forget(&mut self) {
        self.gate.reset();
        if let Some(smoother) = self.smoother.as_mut() {
            smoother.reset();
        }
    }

    fn track(&mut self, pose: RawPose) -> Result<Option<RawPose>, DetectionError> {
        let landmarks = pose
            .landmarks
            .into_iter()
            .enumerate()
            .map(|(index, landmark)| landmark.clamped(index))
            .collect::<Result<Vec<_>, _>>()?;
        let score = pose
            .confidence
            .unwrap_or_else(|| mean_visibility(&landmarks));
        if !score.is_finite() {
            return Err(ValidationError::Confidence(score).into());
        }

        if !self.gate.admit(score) {
            debug!(score, "pose below confidence threshold");
            return Ok(None);
        }

        let landmarks = match self.smoother.as_mut() {
            Some(smoother) => smoother.smooth(landmarks),
            None => landmarks,
        };
        Ok(Some(RawPose {
            landmarks,
            confidence: Some(score),
        }))
    }
}

impl<D: PoseDetector> PoseDetector for TrackedDetector<D> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Option<RawPose>, DetectionError> {
        let tracked = match self.inner.detect(image) {
            Ok(Some(pose)) => self.track(pose),
            other => other,
        };
        if !matches!(tracked, Ok(Some(_))) {
            self.forget();
        }
        tracked
    }

    fn close(&mut self) {
        self.forget();
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::VecDeque, rc::Rc};

    use approx::assert_relative_eq;

    use super::*;
    use crate::landmark::{LANDMARK_COUNT, LandmarkPoint};

    /// Replays queued raw poses; an empty queue means no pose.
    struct QueuedDetector {
        queue: VecDeque<Option<RawPose>>,
        closes: Rc<Cell<u32>>,
    }

    impl QueuedDetector {
        fn new(queue: Vec<Option<RawPose>>) -> Self {
            Self {
                queue: queue.into(),
                closes: Rc::new(Cell::new(0)),
            }
        }
    }

    impl PoseDetector for QueuedDetector {
        fn name(&self) -> &str {
            "queued"
        }

        fn detect(&mut self, _image: &RgbImage) -> Result<Option<RawPose>, DetectionError> {
            Ok(self.queue.pop_front().flatten())
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    fn raw(x: f32, score: f32) -> Option<RawPose> {
        let landmarks = vec![LandmarkPoint::new(x, 0.5, 0.0, 0.9, 0.9); LANDMARK_COUNT];
        Some(RawPose::new(landmarks).with_confidence(score))
    }

    struct CountingDetector {
        closes: Rc<Cell<u32>>,
    }

    impl PoseDetector for CountingDetector {
        fn name(&self) -> &str {
            "counting"
        }

        fn detect(&mut self, _image: &RgbImage) -> Result<Option<RawPose>, DetectionError> {
            Ok(None)
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    #[test]
    fn session_closes_once_on_explicit_close() {
        let closes = Rc::new(Cell::new(0));
        let session = DetectorSession::new(CountingDetector {
            closes: closes.clone(),
        });
        session.close();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn session_closes_on_drop() {
        let closes = Rc::new(Cell::new(0));
        {
            let mut session = DetectorSession::new(CountingDetector {
                closes: closes.clone(),
            });
            let image = RgbImage::new(2, 2);
            assert!(session.detector_mut().detect(&image).unwrap().is_none());
        }
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn gate_switches_to_tracking_threshold() {
        let config = DetectionConfig::new(1, 0.8, 0.3, false, true).unwrap();
        let mut gate = ConfidenceGate::new(&config);
        assert!(!gate.admit(0.5));
        assert!(gate.admit(0.9));
        assert_eq!(gate.threshold(), 0.3);
        assert!(gate.admit(0.5));
        assert!(!gate.admit(0.2));
        assert_eq!(gate.threshold(), 0.8);
    }

    #[test]
    fn tracked_detector_smooths_and_resets_after_miss() {
        let config = DetectionConfig::new(1, 0.5, 0.5, false, true).unwrap();
        let mut detector = TrackedDetector::new(
            QueuedDetector::new(vec![raw(0.2, 0.9), raw(0.6, 0.9), None, raw(0.8, 0.9)]),
            &config,
        );
        let image = RgbImage::new(2, 2);
        let mut next_x = || {
            detector
                .detect(&image)
                .unwrap()
                .map(|pose| pose.landmarks[0].x)
        };

        assert_relative_eq!(next_x().unwrap(), 0.2);
        assert_relative_eq!(next_x().unwrap(), 0.4, epsilon = 1e-6);
        assert_eq!(next_x(), None);
        assert_relative_eq!(next_x().unwrap(), 0.8);
    }

    #[test]
    fn tracked_detector_uses_tracking_threshold_after_a_hit() {
        let config = DetectionConfig::new(1, 0.8, 0.3, false, false).unwrap();
        let mut detector = TrackedDetector::new(
            QueuedDetector::new(vec![
                raw(0.5, 0.5),
                raw(0.5, 0.9),
                raw(0.5, 0.5),
                raw(0.5, 0.2),
                raw(0.5, 0.5),
            ]),
            &config,
        );
        let image = RgbImage::new(2, 2);
        let admitted: Vec<bool> = (0..5)
            .map(|_| detector.detect(&image).unwrap().is_some())
            .collect();
        assert_eq!(admitted, vec![false, true, true, false, false]);
    }

    #[test]
    fn tracked_detector_rejects_non_finite_landmarks() {
        let config = DetectionConfig::new(1, 0.5, 0.5, false, true).unwrap();
        let mut detector = TrackedDetector::new(
            QueuedDetector::new(vec![raw(0.2, 0.9), raw(f32::NAN, 0.9), raw(0.6, 0.9)]),
            &config,
        );
        let image = RgbImage::new(2, 2);

        assert!(detector.detect(&image).unwrap().is_some());
        assert!(matches!(
            detector.detect(&image),
            Err(DetectionError::Validation(ValidationError::NonFiniteLandmark { .. }))
        ));
        let pose = detector.detect(&image).unwrap().unwrap();
        assert_relative_eq!(pose.landmarks[0].x, 0.6);
    }

    #[test]
    fn tracked_detector_closes_inner_once() {
        let config = DetectionConfig::new(1, 0.5, 0.5, false, true).unwrap();
        let inner = QueuedDetector::new(Vec::new());
        let closes = inner.closes.clone();
        DetectorSession::new(TrackedDetector::new(inner, &config)).close();
        assert_eq!(closes.get(), 1);
    }
}
