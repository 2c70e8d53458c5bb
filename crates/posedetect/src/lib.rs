//! Batch pose estimation over videos, single images and image directories.
//!
//! The `posedetect` binary is a thin wrapper around [`pipeline::run`]; the
//! library surface is what integration tests and embedders drive directly.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod export;
pub mod monitor;
pub mod output;
pub mod overlay;
pub mod pipeline;
pub mod telemetry;

pub use artifacts::{ArtifactCounts, ArtifactWriter};
pub use config::{ArtifactOptions, PoseCliArgs, ProgressMode, RunConfig};
pub use error::PipelineError;
pub use export::{ExportBatch, ExportError, ExportFormat};
pub use output::OutputPaths;
pub use overlay::{OverlayRenderer, SkeletonOverlay};
pub use pipeline::{FrameProcessor, RunReport, execute, process, run};
