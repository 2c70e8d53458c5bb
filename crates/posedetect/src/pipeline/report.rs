use std::{fmt::Write as _, path::PathBuf};

use pose_core::ProcessingStats;
use serde::Serialize;
use video_ingest::InputKind;

use crate::{
    artifacts::ArtifactCounts,
    error::{EXIT_INTERRUPTED, EXIT_LOW_SUCCESS},
    export::ExportFormat,
    monitor::ResourceSummary,
    output::OutputPaths,
};

/// What a finished run produced, printed as the final summary.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub input_kind: InputKind,
    pub stats: ProcessingStats,
    pub outputs: OutputPaths,
    pub exported: Vec<(ExportFormat, PathBuf)>,
    pub artifacts: ArtifactCounts,
    pub interrupted: bool,
    pub source_error: Option<String>,
    pub resources: Option<ResourceSummary>,
}

impl RunReport {
    pub fn exported_path(&self, format: ExportFormat) -> Option<&PathBuf> {
        self.exported
            .iter()
            .find(|(exported, _)| *exported == format)
            .map(|(_, path)| path)
    }

    /// `0` on success, `130` when interrupted, `1` when the success rate
    /// stayed below `min_success_rate`.
    pub fn exit_code(&self, min_success_rate: f64) -> i32 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.stats.success_rate < min_success_rate {
            EXIT_LOW_SUCCESS
        } else {
            0
        }
    }

    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let mut out = String::new();
        let _ = writeln!(out, "Input: {} ({})", self.input.display(), self.input_kind);
        let _ = writeln!(
            out,
            "Frames: {} total, {} with pose, {} failed",
            stats.total_frames, stats.processed_frames, stats.failed_frames
        );
        let _ = writeln!(out, "Success rate: {:.1}%", stats.success_rate * 100.0);
        let _ = writeln!(
            out,
            "Processing time: {:.2}s ({:.2} fps)",
            stats.processing_time_seconds, stats.fps
        );
        for (format, path) in &self.exported {
            let _ = writeln!(out, "{} export: {}", format.extension().to_uppercase(), path.display());
        }
        if self.artifacts.frames_written > 0 {
            let _ = writeln!(
                out,
                "Frames saved: {} in {}",
                self.artifacts.frames_written,
                self.outputs.frames_dir.display()
            );
        }
        if self.artifacts.overlays_written > 0 {
            let _ = writeln!(
                out,
                "Overlays saved: {} in {}",
                self.artifacts.overlays_written,
                self.outputs.overlay_dir.display()
            );
        }
        if self.artifacts.failures > 0 {
            let _ = writeln!(out, "Artifact write failures: {}", self.artifacts.failures);
        }
        if let Some(resources) = &self.resources {
            let _ = writeln!(
                out,
                "CPU: avg {:.1}%, peak {:.1}%; memory: avg {:.1} MB, peak {:.1} MB",
                resources.avg_cpu_percent,
                resources.peak_cpu_percent,
                resources.avg_memory_mb,
                resources.peak_memory_mb
            );
        }
        if let Some(error) = &self.source_error {
            let _ = writeln!(out, "Input ended early: {error}");
        }
        if self.interrupted {
            let _ = writeln!(out, "Interrupted: partial results were exported");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn report(processed: u64, failed: u64) -> RunReport {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        RunReport {
            input: PathBuf::from("clip.mp4"),
            input_kind: InputKind::Video,
            stats: ProcessingStats::new(processed, failed, 2.0, now, now),
            outputs: OutputPaths::derive(Path::new("out"), Path::new("clip.mp4"), None, None, &now),
            exported: vec![(ExportFormat::Json, PathBuf::from("out/poses.json"))],
            artifacts: ArtifactCounts::default(),
            interrupted: false,
            source_error: None,
            resources: None,
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(report(8, 2).exit_code(0.5), 0);
        assert_eq!(report(2, 8).exit_code(0.5), EXIT_LOW_SUCCESS);
        assert_eq!(report(0, 0).exit_code(0.0), 0);

        let mut interrupted = report(8, 2);
        interrupted.interrupted = true;
        assert_eq!(interrupted.exit_code(0.5), EXIT_INTERRUPTED);
    }

    #[test]
    fn summary_lists_counts_and_exports() {
        let text = report(8, 2).summary();
        assert!(text.contains("Frames: 10 total, 8 with pose, 2 failed"));
        assert!(text.contains("Success rate: 80.0%"));
        assert!(text.contains("(4.00 fps)"));
        assert!(text.contains("JSON export: out/poses.json"));
        assert!(!text.contains("Interrupted"));
    }

    #[test]
    fn looks_up_exported_paths() {
        let report = report(1, 0);
        assert_eq!(
            report.exported_path(ExportFormat::Json),
            Some(&PathBuf::from("out/poses.json"))
        );
        assert_eq!(report.exported_path(ExportFormat::Csv), None);
    }
}
