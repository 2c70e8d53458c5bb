use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use pose_core::{PoseDetector, PoseResult, ProcessingStats};
use tracing::{debug, debug_span, info, warn};
use video_ingest::{Frame, FrameStream};

use crate::{
    artifacts::{ArtifactCounts, ArtifactWriter},
    pipeline::{
        progress::{ProgressReporter, ProgressTick},
        stats::{FrameOutcome, StatsAggregator},
    },
};

/// Everything the frame loop produced.
#[derive(Debug)]
pub struct ProcessorOutput {
    /// Detected poses in frame order.
    pub results: Vec<PoseResult>,
    pub stats: ProcessingStats,
    /// Stopped early on an interrupt request.
    pub interrupted: bool,
    /// Non-recoverable source error that ended the stream early.
    pub source_error: Option<String>,
    pub artifacts: ArtifactCounts,
}

#[derive(Default)]
struct LoopState {
    total: Option<u64>,
    stats: StatsAggregator,
    results: Vec<PoseResult>,
    last_frame_id: Option<u64>,
    failure_streak: u64,
}

/// Drives detection over a frame stream, one frame at a time.
///
/// Per-frame failures (decode errors, detector errors, rejected output, no
/// pose) are counted and logged, and the loop moves on. Frames are never
/// retried.
pub struct FrameProcessor<'a> {
    progress: &'a mut dyn ProgressReporter,
    artifacts: Option<ArtifactWriter>,
    shutdown: Option<&'a AtomicBool>,
    failure_warn_threshold: u64,
}

impl<'a> FrameProcessor<'a> {
    pub fn new(progress: &'a mut dyn ProgressReporter) -> Self {
        Self {
            progress,
            artifacts: None,
            shutdown: None,
            failure_warn_threshold: 0,
        }
    }

    pub fn with_artifacts(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    /// Checked between frames; once set the loop stops and keeps what it has.
    pub fn with_shutdown(mut self, flag: &'a AtomicBool) -> Self {
        self.shutdown = Some(flag);
        self
    }

    /// Warn each time this many consecutive frames fail (0 disables).
    pub fn with_failure_warn_threshold(mut self, threshold: u64) -> Self {
        self.failure_warn_threshold = threshold;
        self
    }

    pub fn process<S, D>(mut self, mut source: S, detector: &mut D) -> ProcessorOutput
    where
        S: FrameStream,
        D: PoseDetector + ?Sized,
    {
        let mut state = LoopState {
            total: source.total_count(),
            ..LoopState::default()
        };
        let mut interrupted = false;
        let mut source_error = None;

        loop {
            if self
                .shutdown
                .is_some_and(|flag| flag.load(Ordering::SeqCst))
            {
                info!(
                    frames = state.stats.snapshot().total_frames,
                    "interrupt received; stopping before the next frame"
                );
                interrupted = true;
                break;
            }
            state.stats.begin_frame();
            let Some(item) = source.next() else {
                break;
            };

            let outcome = match item {
                Ok(frame) => self.handle_frame(frame, detector, &mut state),
                Err(err) if err.is_recoverable() => {
                    warn!(frame_id = ?err.frame_id(), error = %err, "frame skipped");
                    FrameOutcome::Failed
                }
                Err(err) => {
                    warn!(error = %err, "frame source failed; keeping results gathered so far");
                    source_error = Some(err.to_string());
                    break;
                }
            };
            self.record(outcome, &mut state);
        }

        let snapshot = state.stats.snapshot();
        self.progress.finish(&ProgressTick {
            done: snapshot.total_frames,
            total: state.total,
            elapsed: snapshot.elapsed,
        });

        ProcessorOutput {
            results: state.results,
            stats: state.stats.finalize(),
            interrupted,
            source_error,
            artifacts: self
                .artifacts
                .as_ref()
                .map(ArtifactWriter::counts)
                .unwrap_or_default(),
        }
    }

    fn handle_frame<D>(&mut self, frame: Frame, detector: &mut D, state: &mut LoopState) -> FrameOutcome
    where
        D: PoseDetector + ?Sized,
    {
        let span = debug_span!("frame", frame_id = frame.frame_id);
        let _entered = span.enter();

        if let Some(previous) = state.last_frame_id {
            if frame.frame_id <= previous {
                warn!(previous, "out-of-order frame skipped");
                return FrameOutcome::Failed;
            }
        }
        state.last_frame_id = Some(frame.frame_id);

        if let Some(writer) = self.artifacts.as_mut() {
            writer.write_frame(frame.frame_id, &frame.image);
        }

        let started = Instant::now();
        let detection = detector.detect(&frame.image);
        metrics::histogram!("pose_detect_seconds").record(started.elapsed().as_secs_f64());

        match detection {
            Ok(Some(raw)) => match raw.into_result(frame.frame_id, frame.timestamp, frame.source) {
                Ok(pose) => {
                    debug!(confidence = pose.confidence(), "pose detected");
                    if let Some(writer) = self.artifacts.as_mut() {
                        writer.write_overlay(&frame.image, &pose);
                    }
                    state.results.push(pose);
                    FrameOutcome::Detected
                }
                Err(err) => {
                    warn!(error = %err, "detector output rejected");
                    FrameOutcome::Failed
                }
            },
            Ok(None) => {
                debug!("no pose found");
                FrameOutcome::NoPose
            }
            Err(err) => {
                warn!(error = %err, "pose detection failed");
                FrameOutcome::Failed
            }
        }
    }

    fn record(&mut self, outcome: FrameOutcome, state: &mut LoopState) {
        state.stats.observe(outcome);
        metrics::counter!("pose_frames_total", "outcome" => outcome.label()).increment(1);

        let threshold = self.failure_warn_threshold;
        if outcome.is_success() {
            if threshold > 0 && state.failure_streak >= threshold {
                info!(after = state.failure_streak, "detections resumed");
            }
            state.failure_streak = 0;
        } else {
            state.failure_streak += 1;
            if threshold > 0 && state.failure_streak % threshold == 0 {
                warn!(
                    consecutive = state.failure_streak,
                    "consecutive frames without a pose"
                );
            }
        }

        let snapshot = state.stats.snapshot();
        self.progress.tick(&ProgressTick {
            done: snapshot.total_frames,
            total: state.total,
            elapsed: snapshot.elapsed,
        });
    }
}
