use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pose_core::ProcessingStats;

/// Classification of one observed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A validated pose was emitted.
    Detected,
    /// The detector found nobody. Counted as failed.
    NoPose,
    /// Decode, detector or validation error. Counted as failed.
    Failed,
}

impl FrameOutcome {
    pub fn label(self) -> &'static str {
        match self {
            FrameOutcome::Detected => "detected",
            FrameOutcome::NoPose => "no_pose",
            FrameOutcome::Failed => "failed",
        }
    }

    pub fn is_success(self) -> bool {
        self == FrameOutcome::Detected
    }
}

/// Point-in-time view of the running counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub total_frames: u64,
    pub processed_frames: u64,
    pub failed_frames: u64,
    /// Wall clock since the first frame was pulled from the source.
    pub elapsed: Duration,
}

/// Sole writer of the run counters. The clock starts when the first frame is
/// pulled ([`StatsAggregator::begin_frame`]) and stops at
/// [`StatsAggregator::finalize`].
#[derive(Debug, Default)]
pub struct StatsAggregator {
    processed: u64,
    failed: u64,
    started: Option<(Instant, DateTime<Utc>)>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark that a frame is about to be decoded and detected. Only the first
    /// call starts the clock.
    pub fn begin_frame(&mut self) {
        if self.started.is_none() {
            self.started = Some((Instant::now(), Utc::now()));
        }
    }

    pub fn observe(&mut self, outcome: FrameOutcome) {
        self.begin_frame();
        if outcome.is_success() {
            self.processed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_frames: self.processed + self.failed,
            processed_frames: self.processed,
            failed_frames: self.failed,
            elapsed: self
                .started
                .map(|(instant, _)| instant.elapsed())
                .unwrap_or_default(),
        }
    }

    pub fn finalize(self) -> ProcessingStats {
        let elapsed = self
            .started
            .map(|(instant, _)| instant.elapsed())
            .unwrap_or_default();
        self.finish(elapsed, Utc::now())
    }

    fn finish(self, elapsed: Duration, end_time: DateTime<Utc>) -> ProcessingStats {
        let start_time = self.started.map(|(_, wall)| wall).unwrap_or(end_time);
        ProcessingStats::new(
            self.processed,
            self.failed,
            elapsed.as_secs_f64(),
            start_time,
            end_time,
        )
    }
}
