use std::{fs, path::Path};

use chrono::{DateTime, Utc};
use pose_core::{PoseResult, ProcessingStats};
use serde::{Deserialize, Serialize};

use super::{ExportBatch, ExportError, ExportFormat};

/// `metadata` section: the run statistics plus the export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub export_timestamp: DateTime<Utc>,
    pub total_frames: u64,
    pub processed_frames: u64,
    pub failed_frames: u64,
    pub success_rate: f64,
    pub processing_time_seconds: f64,
    pub fps: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ExportMetadata {
    pub fn new(stats: &ProcessingStats, export_timestamp: DateTime<Utc>) -> Self {
        Self {
            export_timestamp,
            total_frames: stats.total_frames,
            processed_frames: stats.processed_frames,
            failed_frames: stats.failed_frames,
            success_rate: stats.success_rate,
            processing_time_seconds: stats.processing_time_seconds,
            fps: stats.fps,
            start_time: stats.start_time,
            end_time: stats.end_time,
        }
    }

    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats {
            total_frames: self.total_frames,
            processed_frames: self.processed_frames,
            failed_frames: self.failed_frames,
            success_rate: self.success_rate,
            processing_time_seconds: self.processing_time_seconds,
            fps: self.fps,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Owned form of an exported JSON file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    pub results: Vec<PoseResult>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    metadata: ExportMetadata,
    results: &'a [PoseResult],
}

pub(crate) fn render(batch: &ExportBatch<'_>) -> Result<Vec<u8>, ExportError> {
    let document = DocumentRef {
        metadata: ExportMetadata::new(batch.stats, batch.exported_at),
        results: batch.results,
    };
    let mut bytes =
        serde_json::to_vec_pretty(&document).map_err(|err| ExportError::Serialize {
            format: ExportFormat::Json,
            message: err.to_string(),
        })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse a previously exported file. Every result is re-validated.
pub fn read_document(path: &Path) -> Result<ExportDocument, ExportError> {
    let read_err = |message: String| ExportError::Read {
        path: path.to_path_buf(),
        message,
    };
    let text = fs::read_to_string(path).map_err(|err| read_err(err.to_string()))?;
    serde_json::from_str(&text).map_err(|err| read_err(err.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pose_core::{LANDMARK_COUNT, LandmarkPoint};
    use serde_json::Value;

    use super::*;

    fn sample() -> (Vec<PoseResult>, ProcessingStats) {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 2).unwrap();
        let landmarks = vec![LandmarkPoint::new(0.5, 0.25, -0.1, 0.9, 0.8); LANDMARK_COUNT];
        let results = vec![PoseResult::new(3, 0.1, 0.75, "clip.mp4", landmarks).unwrap()];
        (results, ProcessingStats::new(1, 1, 2.0, start, end))
    }

    #[test]
    fn document_layout() {
        let (results, stats) = sample();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 1, 0).unwrap();
        let bytes = render(&ExportBatch::new(&results, &stats).at(at)).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        let metadata = &value["metadata"];
        assert_eq!(metadata["export_timestamp"], "2024-05-01T12:01:00Z");
        assert_eq!(metadata["total_frames"], 2);
        assert_eq!(metadata["success_rate"], 0.5);
        assert_eq!(metadata["fps"], 0.5);

        let first = &value["results"][0];
        assert_eq!(first["frame_id"], 3);
        assert!(first["frame_id"].is_u64());
        assert_eq!(first["source_file"], "clip.mp4");
        let landmarks = first["landmarks"].as_array().unwrap();
        assert_eq!(landmarks.len(), LANDMARK_COUNT);
        let keys: Vec<_> = landmarks[0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(landmarks[0]["presence"], 0.8);
    }

    #[test]
    fn metadata_round_trips_stats() {
        let (_, stats) = sample();
        let metadata = ExportMetadata::new(&stats, Utc::now());
        assert_eq!(metadata.stats(), stats);
    }
}
