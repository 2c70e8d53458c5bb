use std::{io, path::PathBuf};

use pose_core::InitError;
use thiserror::Error;
use video_ingest::CaptureError;

use crate::export::ExportError;

/// Exit code for a run that completed but stayed below the success threshold.
pub const EXIT_LOW_SUCCESS: i32 = 1;
/// Exit code for fatal run-level errors (input, detector, output directory).
pub const EXIT_FATAL: i32 = 2;
/// Exit code when detection finished but results could not be exported.
pub const EXIT_EXPORT: i32 = 3;
/// Exit code after Ctrl+C; partial results were still exported.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Run-level failures. Per-frame failures never surface here; they are
/// absorbed by the frame processor and only change statistics.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot read input: {0}")]
    Input(#[from] CaptureError),
    #[error("pose detector failed to initialize: {0}")]
    DetectorInit(#[from] InitError),
    #[error("output location {path:?} is not writable: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "detection finished ({processed} of {total} frames with a pose) but export failed: {source}"
    )]
    Export {
        processed: u64,
        total: u64,
        #[source]
        source: ExportError,
    },
}

impl PipelineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Export { .. } => EXIT_EXPORT,
            _ => EXIT_FATAL,
        }
    }
}
