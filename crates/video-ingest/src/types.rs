use std::path::PathBuf;

use image::RgbImage;
use thiserror::Error;

/// One decoded input frame in RGB8.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequential, starting at 0, never reused within a source.
    pub frame_id: u64,
    /// Seconds from the start of the input; 0 for still images.
    pub timestamp: f64,
    pub image: RgbImage,
    /// Path of the file the frame was decoded from.
    pub source: String,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open input {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("unsupported input {path:?}: expected an image, a video or a directory of images")]
    Unsupported { path: PathBuf },
    #[error("no supported images found in {path:?}")]
    EmptyDirectory { path: PathBuf },
    #[error("failed to probe video {path:?}: {reason}")]
    Probe { path: PathBuf, reason: String },
    #[error("failed to decode frame {frame_id} from {source_file}: {reason}")]
    Decode {
        frame_id: u64,
        source_file: String,
        reason: String,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    /// A decode failure only affects its own frame; every other variant ends
    /// the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CaptureError::Decode { .. })
    }

    /// Frame the error belongs to, when it belongs to one.
    pub fn frame_id(&self) -> Option<u64> {
        match self {
            CaptureError::Decode { frame_id, .. } => Some(*frame_id),
            _ => None,
        }
    }
}
