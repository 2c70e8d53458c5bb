//! Configuration parsing for a pose run.
//!
//! Translates CLI arguments (and an optional detection config file) into a
//! validated [`RunConfig`] that the pipeline uses without re-parsing flags.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args};
use pose_core::{DetectionConfig, RawDetectionConfig};

use crate::{artifacts::DEFAULT_JPEG_QUALITY, export::ExportFormat, telemetry::TelemetryOptions};

pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const DEFAULT_FAILURE_WARN_THRESHOLD: u64 = 30;
pub const DEFAULT_MIN_SUCCESS_RATE: f64 = 0.5;

/// How progress is surfaced while frames are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Redrawn progress bar on stderr.
    Console,
    /// Periodic log lines.
    Log,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactOptions {
    pub save_frames: bool,
    pub save_overlays: bool,
    pub jpeg_quality: u8,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            save_frames: true,
            save_overlays: true,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Video file, image file or directory of images.
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Custom JSON file name inside `output_dir`.
    pub json_name: Option<String>,
    /// Custom CSV file name inside `output_dir`.
    pub csv_name: Option<String>,
    /// Export formats, sorted and deduplicated.
    pub formats: Vec<ExportFormat>,
    /// TorchScript pose model.
    pub model_path: Option<PathBuf>,
    pub detection: DetectionConfig,
    /// Force CPU inference.
    pub use_cpu: bool,
    pub artifacts: ArtifactOptions,
    pub progress: ProgressMode,
    /// Warn after this many consecutive failed frames (0 disables).
    pub failure_warn_threshold: u64,
    /// Runs below this success rate exit non-zero.
    pub min_success_rate: f64,
    /// Sample process CPU and memory during the run.
    pub monitor: bool,
    pub telemetry: TelemetryOptions,
}

impl RunConfig {
    /// Defaults for `input`, as if no flags were given.
    pub fn for_input(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            json_name: None,
            csv_name: None,
            formats: ExportFormat::ALL.to_vec(),
            model_path: None,
            detection: DetectionConfig::default(),
            use_cpu: false,
            artifacts: ArtifactOptions::default(),
            progress: ProgressMode::Off,
            failure_warn_threshold: DEFAULT_FAILURE_WARN_THRESHOLD,
            min_success_rate: DEFAULT_MIN_SUCCESS_RATE,
            monitor: false,
            telemetry: TelemetryOptions::default(),
        }
    }
}

/// CLI arguments accepted by `posedetect`.
#[derive(Debug, Clone, Default, Args)]
pub struct PoseCliArgs {
    /// Video file, image file, or directory of images.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Directory receiving exports and artifacts.
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Custom JSON file name.
    #[arg(long = "json", value_name = "NAME")]
    pub json_name: Option<String>,
    /// Custom CSV file name.
    #[arg(long = "csv", value_name = "NAME")]
    pub csv_name: Option<String>,
    /// Export format; repeat for several (default: json and csv).
    #[arg(long = "format", value_enum, value_name = "FORMAT")]
    pub formats: Vec<ExportFormat>,

    /// TorchScript pose model path.
    #[arg(long = "model", value_name = "PATH")]
    pub model_path: Option<PathBuf>,
    /// Detection config JSON; explicit flags override its values.
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
    /// Model complexity tier (0 lite, 1 full, 2 heavy).
    #[arg(long = "model-complexity", value_name = "0|1|2")]
    pub model_complexity: Option<u8>,
    /// Minimum score to accept a new detection.
    #[arg(long = "detection-confidence", value_name = "SCORE")]
    pub detection_confidence: Option<f32>,
    /// Minimum score to keep tracking a pose between frames.
    #[arg(long = "tracking-confidence", value_name = "SCORE")]
    pub tracking_confidence: Option<f32>,
    /// Request segmentation masks from the model.
    #[arg(long = "segmentation", action = ArgAction::SetTrue)]
    pub segmentation: bool,
    /// Disable temporal landmark smoothing.
    #[arg(long = "no-smooth", action = ArgAction::SetTrue)]
    pub no_smooth: bool,
    /// Force CPU inference.
    #[arg(long = "cpu", action = ArgAction::SetTrue)]
    pub use_cpu: bool,

    /// Do not save extracted frames.
    #[arg(long = "no-frames", action = ArgAction::SetTrue)]
    pub no_frames: bool,
    /// Do not save pose overlays.
    #[arg(long = "no-overlays", action = ArgAction::SetTrue)]
    pub no_overlays: bool,
    /// JPEG quality for saved artifacts (1-100).
    #[arg(long = "jpeg-quality", value_name = "QUALITY")]
    pub jpeg_quality: Option<u8>,

    /// Hide the progress bar.
    #[arg(long = "no-progress", action = ArgAction::SetTrue)]
    pub no_progress: bool,
    /// Report progress as log lines instead of a progress bar.
    #[arg(long = "progress-log", action = ArgAction::SetTrue, conflicts_with = "no_progress")]
    pub progress_log: bool,
    /// Warn after this many consecutive failed frames (0 disables).
    #[arg(long = "failure-warn-threshold", value_name = "N")]
    pub failure_warn_threshold: Option<u64>,
    /// Exit with status 1 when the success rate ends below this value.
    #[arg(long = "min-success-rate", value_name = "RATE")]
    pub min_success_rate: Option<f64>,
    /// Disable CPU/memory sampling.
    #[arg(long = "no-monitor", action = ArgAction::SetTrue)]
    pub no_monitor: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
    /// Only log errors.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    pub quiet: bool,
    /// Also write logs to this file.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
    /// Write Prometheus metrics to this file at the end of the run.
    #[arg(long = "metrics-out", value_name = "PATH")]
    pub metrics_out: Option<PathBuf>,
}

impl TryFrom<PoseCliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: PoseCliArgs) -> Result<Self> {
        if args.input.as_os_str().is_empty() {
            bail!("Missing input. Provide a video, an image, or a directory of images.");
        }

        let mut raw = match args.config_file.as_deref() {
            Some(path) => load_detection_file(path)?,
            None => RawDetectionConfig::default(),
        };
        if let Some(complexity) = args.model_complexity {
            raw.model_complexity = complexity;
        }
        if let Some(score) = args.detection_confidence {
            raw.detection_confidence = score;
        }
        if let Some(score) = args.tracking_confidence {
            raw.tracking_confidence = score;
        }
        if args.segmentation {
            raw.segmentation = true;
        }
        if args.no_smooth {
            raw.smooth_landmarks = false;
        }
        let detection = DetectionConfig::try_from(raw).context("invalid detection settings")?;

        let jpeg_quality = args.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY);
        if !(1..=100).contains(&jpeg_quality) {
            bail!("--jpeg-quality must be an integer between 1 and 100");
        }

        let min_success_rate = args.min_success_rate.unwrap_or(DEFAULT_MIN_SUCCESS_RATE);
        if !(0.0..=1.0).contains(&min_success_rate) {
            bail!("--min-success-rate must be within [0, 1]");
        }

        for name in [&args.json_name, &args.csv_name].into_iter().flatten() {
            validate_file_name(name)?;
        }

        let mut formats = if args.formats.is_empty() {
            ExportFormat::ALL.to_vec()
        } else {
            args.formats
        };
        formats.sort();
        formats.dedup();

        let progress = if args.no_progress {
            ProgressMode::Off
        } else if args.progress_log {
            ProgressMode::Log
        } else {
            ProgressMode::Console
        };

        let verbosity = if args.quiet {
            -1
        } else {
            args.verbose.min(i8::MAX as u8) as i8
        };

        Ok(Self {
            input: args.input,
            output_dir: args
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            json_name: args.json_name,
            csv_name: args.csv_name,
            formats,
            model_path: args.model_path,
            detection,
            use_cpu: args.use_cpu,
            artifacts: ArtifactOptions {
                save_frames: !args.no_frames,
                save_overlays: !args.no_overlays,
                jpeg_quality,
            },
            progress,
            failure_warn_threshold: args
                .failure_warn_threshold
                .unwrap_or(DEFAULT_FAILURE_WARN_THRESHOLD),
            min_success_rate,
            monitor: !args.no_monitor,
            telemetry: TelemetryOptions {
                verbosity,
                log_file: args.log_file,
                chrome_trace_path: args.chrome_trace,
                metrics_out: args.metrics_out,
            },
        })
    }
}

fn load_detection_file(path: &Path) -> Result<RawDetectionConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading detection config {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing detection config {}", path.display()))
}

fn validate_file_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    if name.is_empty() || path.file_name().is_none_or(|file| file != path.as_os_str()) {
        bail!("export file name {name:?} must be a plain file name without directories");
    }
    Ok(())
}
