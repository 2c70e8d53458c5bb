use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use pose_core::PoseResult;
use serde::Serialize;
use tracing::{debug, warn};

use crate::overlay::OverlayRenderer;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArtifactCounts {
    pub frames_written: u64,
    pub overlays_written: u64,
    pub failures: u64,
}

/// Persists raw frames and pose overlays as `frame_NNNNNN.jpg` and
/// `overlay_NNNNNN.jpg`, numbered by frame id. Write failures are logged and
/// counted, never propagated.
pub struct ArtifactWriter {
    frames_dir: Option<PathBuf>,
    overlays_dir: Option<PathBuf>,
    renderer: Box<dyn OverlayRenderer>,
    jpeg_quality: u8,
    counts: ArtifactCounts,
}

impl ArtifactWriter {
    pub fn new(
        frames_dir: Option<PathBuf>,
        overlays_dir: Option<PathBuf>,
        renderer: Box<dyn OverlayRenderer>,
    ) -> Self {
        Self {
            frames_dir,
            overlays_dir,
            renderer,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            counts: ArtifactCounts::default(),
        }
    }

    /// `quality` must already be within 1..=100; `RunConfig` rejects
    /// anything else.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        debug_assert!(
            (1..=100).contains(&quality),
            "jpeg quality {quality} outside 1..=100"
        );
        self.jpeg_quality = quality;
        self
    }

    pub fn counts(&self) -> ArtifactCounts {
        self.counts
    }

    pub fn frame_path(&self, frame_id: u64) -> Option<PathBuf> {
        self.frames_dir
            .as_ref()
            .map(|dir| dir.join(format!("frame_{frame_id:06}.jpg")))
    }

    pub fn overlay_path(&self, frame_id: u64) -> Option<PathBuf> {
        self.overlays_dir
            .as_ref()
            .map(|dir| dir.join(format!("overlay_{frame_id:06}.jpg")))
    }

    /// Save the raw frame, if frame extraction is enabled.
    pub fn write_frame(&mut self, frame_id: u64, image: &RgbImage) {
        let Some(path) = self.frame_path(frame_id) else {
            return;
        };
        match write_jpeg(&path, image, self.jpeg_quality) {
            Ok(()) => {
                self.counts.frames_written += 1;
                metrics::counter!("pose_artifacts_written_total", "kind" => "frame").increment(1);
            }
            Err(err) => self.record_failure(frame_id, "frame", &err),
        }
    }

    /// Render and save the overlay for a detected pose, if enabled.
    pub fn write_overlay(&mut self, image: &RgbImage, pose: &PoseResult) {
        let Some(path) = self.overlay_path(pose.frame_id()) else {
            return;
        };
        let annotated = self.renderer.render(image, pose);
        match write_jpeg(&path, &annotated, self.jpeg_quality) {
            Ok(()) => {
                self.counts.overlays_written += 1;
                metrics::counter!("pose_artifacts_written_total", "kind" => "overlay")
                    .increment(1);
            }
            Err(err) => self.record_failure(pose.frame_id(), "overlay", &err),
        }
    }

    fn record_failure(&mut self, frame_id: u64, kind: &'static str, err: &anyhow::Error) {
        self.counts.failures += 1;
        metrics::counter!("pose_artifact_failures_total", "kind" => kind).increment(1);
        warn!(frame_id, kind, error = %format!("{err:#}"), "failed to write artifact");
    }
}

fn write_jpeg(path: &Path, image: &RgbImage, quality: u8) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(image)
        .with_context(|| format!("encoding {}", path.display()))?;
    out.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    debug!(path = %path.display(), "artifact written");
    Ok(())
}
