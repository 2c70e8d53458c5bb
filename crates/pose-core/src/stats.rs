use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frozen run-level aggregate. `processed_frames + failed_frames ==
/// total_frames` holds by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_frames: u64,
    pub processed_frames: u64,
    pub failed_frames: u64,
    pub success_rate: f64,
    pub processing_time_seconds: f64,
    pub fps: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ProcessingStats {
    pub fn new(
        processed_frames: u64,
        failed_frames: u64,
        processing_time_seconds: f64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let total_frames = processed_frames + failed_frames;
        let processing_time_seconds = processing_time_seconds.max(0.0);
        Self {
            total_frames,
            processed_frames,
            failed_frames,
            success_rate: ratio(processed_frames as f64, total_frames as f64),
            processing_time_seconds,
            fps: ratio(processed_frames as f64, processing_time_seconds),
            start_time,
            end_time,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
