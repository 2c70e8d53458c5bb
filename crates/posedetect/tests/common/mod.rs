#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use image::RgbImage;
use pose_core::{DetectionError, LANDMARK_COUNT, LandmarkPoint, PoseDetector, RawPose};
use video_ingest::{CaptureError, Frame};

/// What the scripted detector does on a given call.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Pose(f32),
    /// Every landmark at horizontal position `x`.
    At { x: f32, confidence: f32 },
    NoPose,
    Fail,
}

/// Replays a fixed list of outcomes, one per `detect` call. Calls past the
/// end of the script find no pose.
pub struct ScriptedDetector {
    script: Vec<Step>,
    calls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    interrupt: Option<(usize, Arc<AtomicBool>)>,
    delay: Option<Duration>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            interrupt: None,
            delay: None,
        }
    }

    /// Detect a pose on every call.
    pub fn always(count: usize) -> Self {
        Self::new(vec![Step::Pose(0.9); count])
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Sleep for `delay` inside every `detect` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Raise `flag` once `after` frames have been seen.
    pub fn interrupt_after(mut self, after: usize, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some((after, flag));
        self
    }
}

impl PoseDetector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&mut self, _image: &RgbImage) -> Result<Option<RawPose>, DetectionError> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.get(call).copied().unwrap_or(Step::NoPose);
        if let Some((after, flag)) = &self.interrupt {
            if call + 1 >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
        match step {
            Step::Pose(confidence) => {
                Ok(Some(RawPose::new(landmarks()).with_confidence(confidence)))
            }
            Step::At { x, confidence } => {
                let points = vec![LandmarkPoint::new(x, 0.5, 0.0, 0.7, 0.9); LANDMARK_COUNT];
                Ok(Some(RawPose::new(points).with_confidence(confidence)))
            }
            Step::NoPose => Ok(None),
            Step::Fail => Err(DetectionError::Inference("scripted failure".into())),
        }
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Landmark 0 is distinctive; the rest sit in the middle of the frame.
pub fn landmarks() -> Vec<LandmarkPoint> {
    let mut points = vec![LandmarkPoint::new(0.5, 0.5, 0.0, 0.7, 0.9); LANDMARK_COUNT];
    points[0] = LandmarkPoint::new(0.5, 0.3, 0.1, 0.9, 0.8);
    points
}

pub fn frame(frame_id: u64, timestamp: f64, source: &str) -> Frame {
    Frame {
        frame_id,
        timestamp,
        image: RgbImage::from_pixel(64, 48, image::Rgb([40, 40, 40])),
        source: source.to_string(),
    }
}

/// `count` video frames at 30 fps.
pub fn video_frames(count: u64) -> Vec<Result<Frame, CaptureError>> {
    (0..count)
        .map(|id| Ok(frame(id, id as f64 / 30.0, "video.mp4")))
        .collect()
}
