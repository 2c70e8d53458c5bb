//! Run orchestration: open the input, load the detector, drive the frame
//! loop, then export.
//!
//! Run-level failures (unreadable input, detector init, unwritable output
//! location, export) surface as [`PipelineError`]. Per-frame failures are
//! absorbed by [`FrameProcessor`] and only show up in the statistics.

pub mod processor;
pub mod progress;
pub mod report;
pub mod stats;

use std::sync::{
    Once,
    atomic::{AtomicBool, Ordering},
};

use chrono::Local;
use pose_core::{DetectorSession, InitError, PoseDetector, PoseResult, ProcessingStats};
use tracing::{field, info, info_span, warn};
use video_ingest::{FrameSource, FrameStream, InputKind};

pub use processor::{FrameProcessor, ProcessorOutput};
pub use progress::{ConsoleProgress, LogProgress, NoopProgress, ProgressReporter, ProgressTick};
pub use report::RunReport;
pub use stats::{FrameOutcome, StatsAggregator, StatsSnapshot};

use crate::{
    artifacts::ArtifactWriter,
    config::{DEFAULT_FAILURE_WARN_THRESHOLD, ProgressMode, RunConfig},
    error::{EXIT_INTERRUPTED, PipelineError},
    export::ExportBatch,
    monitor::ResourceMonitor,
    output::OutputPaths,
    overlay::SkeletonOverlay,
};

/// Run detection over every frame of `source` without artifacts or export.
pub fn process<S, D>(
    source: S,
    detector: &mut D,
    progress: &mut dyn ProgressReporter,
) -> (Vec<PoseResult>, ProcessingStats)
where
    S: FrameStream,
    D: PoseDetector + ?Sized,
{
    let output = FrameProcessor::new(progress)
        .with_failure_warn_threshold(DEFAULT_FAILURE_WARN_THRESHOLD)
        .process(source, detector);
    (output.results, output.stats)
}

/// Full run for `config`: open the input, load the model and hand over to
/// [`execute`].
pub fn run(config: &RunConfig, shutdown: Option<&AtomicBool>) -> Result<RunReport, PipelineError> {
    let run_span = info_span!(
        "posedetect.run",
        input = %config.input.display(),
        kind = field::Empty,
        detector = field::Empty,
    );
    let _run_guard = run_span.enter();

    let source = FrameSource::open(&config.input)?;
    let kind = source.kind();
    run_span.record("kind", kind.as_str());

    let detector = build_detector(config)?;
    run_span.record("detector", detector.name());

    execute(config, source, kind, detector, shutdown)
}

/// Drive an already opened source through an initialized detector, write
/// artifacts and export the results. The detector is closed exactly once on
/// every path, before export on success.
pub fn execute<S, D>(
    config: &RunConfig,
    source: S,
    kind: InputKind,
    detector: D,
    shutdown: Option<&AtomicBool>,
) -> Result<RunReport, PipelineError>
where
    S: FrameStream,
    D: PoseDetector,
{
    let mut session = DetectorSession::new(detector);
    let outputs = OutputPaths::derive(
        &config.output_dir,
        &config.input,
        config.json_name.as_deref(),
        config.csv_name.as_deref(),
        &Local::now(),
    );
    let artifacts = config.artifacts;
    outputs
        .create_dirs(artifacts.save_frames, artifacts.save_overlays)
        .and_then(|()| outputs.check_writable(&config.formats))
        .map_err(|(path, source)| PipelineError::Output { path, source })?;

    let mut progress = progress_reporter(config.progress);
    let monitor = if config.monitor {
        ResourceMonitor::start()
    } else {
        None
    };

    let mut processor = FrameProcessor::new(progress.as_mut())
        .with_failure_warn_threshold(config.failure_warn_threshold);
    if artifacts.save_frames || artifacts.save_overlays {
        let writer = ArtifactWriter::new(
            artifacts.save_frames.then(|| outputs.frames_dir.clone()),
            artifacts.save_overlays.then(|| outputs.overlay_dir.clone()),
            Box::new(SkeletonOverlay::new(kind == InputKind::Video)),
        )
        .with_jpeg_quality(artifacts.jpeg_quality);
        processor = processor.with_artifacts(writer);
    }
    if let Some(flag) = shutdown {
        processor = processor.with_shutdown(flag);
    }

    let output = processor.process(source, session.detector_mut());
    session.close();
    let resources = monitor.map(ResourceMonitor::stop);
    outputs.remove_empty_dirs();

    let stats = output.stats;
    info!(
        total = stats.total_frames,
        processed = stats.processed_frames,
        failed = stats.failed_frames,
        success_rate = %format!("{:.3}", stats.success_rate),
        fps = %format!("{:.2}", stats.fps),
        interrupted = output.interrupted,
        "frame processing finished"
    );

    let batch = ExportBatch::new(&output.results, &stats);
    let mut exported = Vec::with_capacity(config.formats.len());
    for &format in &config.formats {
        let path = format
            .export(&batch, outputs.export_path(format))
            .map_err(|source| PipelineError::Export {
                processed: stats.processed_frames,
                total: stats.total_frames,
                source,
            })?;
        exported.push((format, path));
    }

    Ok(RunReport {
        input: config.input.clone(),
        input_kind: kind,
        stats,
        outputs,
        exported,
        artifacts: output.artifacts,
        interrupted: output.interrupted,
        source_error: output.source_error,
        resources,
    })
}

/// Process-wide interrupt flag. The first Ctrl+C asks the frame loop to stop
/// and export what it has; a second one exits immediately.
pub fn interrupt_flag() -> &'static AtomicBool {
    static SHUTDOWN: AtomicBool = AtomicBool::new(false);
    static CTRL_HANDLER: Once = Once::new();

    CTRL_HANDLER.call_once(|| {
        if let Err(err) = ctrlc::set_handler(|| {
            if SHUTDOWN.swap(true, Ordering::SeqCst) {
                std::process::exit(EXIT_INTERRUPTED);
            }
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });
    &SHUTDOWN
}

fn progress_reporter(mode: ProgressMode) -> Box<dyn ProgressReporter> {
    match mode {
        ProgressMode::Console => Box::new(ConsoleProgress::stderr()),
        ProgressMode::Log => Box::new(LogProgress::default()),
        ProgressMode::Off => Box::new(NoopProgress),
    }
}

#[cfg(feature = "with-tch")]
fn build_detector(config: &RunConfig) -> Result<Box<dyn PoseDetector>, InitError> {
    use pose_core::{TorchPoseDetector, TrackedDetector, tch::Device};

    let model_path = config.model_path.as_deref().ok_or(InitError::MissingModel)?;
    let device = if config.use_cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available()
    };
    let model = TorchPoseDetector::new(model_path, &config.detection, device)?;
    Ok(Box::new(TrackedDetector::new(model, &config.detection)))
}

#[cfg(not(feature = "with-tch"))]
fn build_detector(_config: &RunConfig) -> Result<Box<dyn PoseDetector>, InitError> {
    Err(InitError::Unavailable(
        "posedetect was built without the `with-tch` feature".into(),
    ))
}
