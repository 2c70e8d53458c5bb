mod common;

use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use approx::assert_relative_eq;
use common::{ScriptedDetector, Step, frame, video_frames};
use image::RgbImage;
use pose_core::{DetectionConfig, TrackedDetector};
use posedetect::{
    ExportFormat, FrameProcessor, PipelineError, RunConfig,
    error::{EXIT_FATAL, EXIT_INTERRUPTED},
    execute,
    export::json::read_document,
    pipeline::NoopProgress,
    process,
};
use video_ingest::{CaptureError, Frame, FrameSource, InputKind};

fn config_in(dir: &Path, input: &str) -> RunConfig {
    let mut config = RunConfig::for_input(input);
    config.output_dir = dir.to_path_buf();
    config.json_name = Some("poses.json".into());
    config.csv_name = Some("poses.csv".into());
    config
}

#[test]
fn video_with_two_misses_keeps_eight_results() {
    let mut detector = ScriptedDetector::new(vec![Step::Pose(0.9); 8]);
    let (results, stats) = process(
        video_frames(10).into_iter(),
        &mut detector,
        &mut NoopProgress,
    );

    assert_eq!(stats.total_frames, 10);
    assert_eq!(stats.processed_frames, 8);
    assert_eq!(stats.failed_frames, 2);
    assert_relative_eq!(stats.success_rate, 0.8);
    assert_eq!(results.len(), 8);
    assert!(stats.end_time >= stats.start_time);

    let ids: Vec<u64> = results.iter().map(|r| r.frame_id()).collect();
    assert_eq!(ids, (0..8).collect::<Vec<u64>>());
}

#[test]
fn single_image_yields_frame_zero_at_time_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("person.png");
    RgbImage::from_pixel(32, 32, image::Rgb([200, 180, 160]))
        .save(&path)
        .unwrap();

    let source = FrameSource::open(&path).unwrap();
    assert_eq!(source.kind(), InputKind::Image);

    let mut detector = ScriptedDetector::always(1);
    let (results, stats) = process(source, &mut detector, &mut NoopProgress);

    assert_eq!(stats.total_frames, 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].frame_id(), 0);
    assert_eq!(results[0].timestamp(), 0.0);
    assert_eq!(results[0].source_file(), path.display().to_string());
}

#[test]
fn detector_error_skips_only_that_frame() {
    let script = vec![
        Step::Pose(0.9),
        Step::Pose(0.9),
        Step::Pose(0.9),
        Step::Fail,
        Step::Pose(0.9),
    ];
    let mut detector = ScriptedDetector::new(script);
    let (results, stats) = process(
        video_frames(5).into_iter(),
        &mut detector,
        &mut NoopProgress,
    );

    assert_eq!(stats.processed_frames, 4);
    assert_eq!(stats.failed_frames, 1);
    let ids: Vec<u64> = results.iter().map(|r| r.frame_id()).collect();
    assert_eq!(ids, vec![0, 1, 2, 4]);
}

#[test]
fn decode_errors_count_as_failed_frames() {
    let frames = vec![
        Ok(frame(0, 0.0, "a.jpg")),
        Err(CaptureError::Decode {
            frame_id: 1,
            source_file: "b.jpg".into(),
            reason: "truncated".into(),
        }),
        Ok(frame(2, 0.0, "c.jpg")),
    ];
    let mut detector = ScriptedDetector::always(3);
    let output = FrameProcessor::new(&mut NoopProgress).process(frames.into_iter(), &mut detector);

    assert_eq!(output.stats.total_frames, 3);
    assert_eq!(output.stats.failed_frames, 1);
    assert!(output.source_error.is_none());
    let sources: Vec<&str> = output.results.iter().map(|r| r.source_file()).collect();
    assert_eq!(sources, vec!["a.jpg", "c.jpg"]);
}

#[test]
fn fatal_source_error_keeps_partial_results() {
    let mut frames = video_frames(2);
    frames.push(Err(CaptureError::Other(anyhow::anyhow!("ffmpeg exited"))));
    frames.push(Ok(frame(3, 0.1, "video.mp4")));

    let mut detector = ScriptedDetector::always(4);
    let output = FrameProcessor::new(&mut NoopProgress).process(frames.into_iter(), &mut detector);

    assert_eq!(output.results.len(), 2);
    assert_eq!(output.stats.total_frames, 2);
    assert!(output.source_error.unwrap().contains("ffmpeg exited"));
}

#[test]
fn repeated_frame_ids_are_skipped() {
    let frames = vec![
        Ok(frame(0, 0.0, "video.mp4")),
        Ok(frame(1, 0.1, "video.mp4")),
        Ok(frame(1, 0.1, "video.mp4")),
        Ok(frame(2, 0.2, "video.mp4")),
    ];
    let mut detector = ScriptedDetector::always(4);
    let (results, stats) = process(frames.into_iter(), &mut detector, &mut NoopProgress);

    assert_eq!(stats.total_frames, 4);
    assert_eq!(stats.failed_frames, 1);
    let ids: Vec<u64> = results.iter().map(|r| r.frame_id()).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn results_and_stats_stay_consistent() {
    let script = vec![Step::Pose(0.9), Step::Fail, Step::NoPose, Step::Pose(0.4)];
    let mut detector = ScriptedDetector::new(script);
    let (results, stats) = process(
        video_frames(6).into_iter(),
        &mut detector,
        &mut NoopProgress,
    );

    assert_eq!(
        stats.processed_frames + stats.failed_frames,
        stats.total_frames
    );
    assert_eq!(results.len() as u64, stats.processed_frames);
    assert!(results.windows(2).all(|w| w[0].frame_id() < w[1].frame_id()));
    for result in &results {
        assert_eq!(result.landmarks().len(), 33);
        assert!((0.0..=1.0).contains(&result.confidence()));
    }
}

#[test]
fn empty_stream_has_zero_rates() {
    let mut detector = ScriptedDetector::always(0);
    let frames: Vec<Result<Frame, CaptureError>> = Vec::new();
    let (results, stats) = process(frames.into_iter(), &mut detector, &mut NoopProgress);
    assert!(results.is_empty());
    assert_eq!(stats.total_frames, 0);
    assert_eq!(stats.success_rate, 0.0);
    assert_eq!(stats.fps, 0.0);
}

#[test]
fn execute_exports_and_writes_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "video.mp4");
    let mut script = vec![Step::Pose(0.9); 10];
    script[2] = Step::NoPose;
    script[6] = Step::NoPose;
    let detector = ScriptedDetector::new(script);
    let closes = detector.close_counter();

    let report = execute(
        &config,
        video_frames(10).into_iter(),
        InputKind::Video,
        detector,
        None,
    )
    .unwrap();

    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(report.stats.processed_frames, 8);
    assert_eq!(report.exit_code(config.min_success_rate), 0);

    let json = report.exported_path(ExportFormat::Json).unwrap();
    assert_eq!(json, &dir.path().join("poses.json"));
    let document = read_document(json).unwrap();
    assert_eq!(document.results.len(), 8);
    assert_eq!(document.metadata.total_frames, 10);
    assert_eq!(document.metadata.processed_frames, 8);

    let csv = fs::read_to_string(report.exported_path(ExportFormat::Csv).unwrap()).unwrap();
    assert_eq!(csv.lines().count(), 9);

    assert_eq!(report.artifacts.frames_written, 10);
    assert_eq!(report.artifacts.overlays_written, 8);
    assert!(report.outputs.frames_dir.join("frame_000000.jpg").is_file());
    assert!(report.outputs.overlay_dir.join("overlay_000000.jpg").is_file());
    assert!(!report.outputs.overlay_dir.join("overlay_000002.jpg").exists());
}

#[test]
fn execute_without_artifacts_leaves_no_directories() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "video.mp4");
    config.artifacts.save_frames = false;
    config.artifacts.save_overlays = false;
    config.formats = vec![ExportFormat::Json];

    let report = execute(
        &config,
        video_frames(3).into_iter(),
        InputKind::Video,
        ScriptedDetector::always(3),
        None,
    )
    .unwrap();

    assert_eq!(report.exported.len(), 1);
    assert!(!report.outputs.frames_dir.exists());
    assert!(!report.outputs.overlay_dir.exists());
    assert!(!dir.path().join("poses.csv").exists());
}

#[test]
fn interrupt_stops_early_and_still_exports() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "video.mp4");
    config.artifacts.save_frames = false;
    config.artifacts.save_overlays = false;

    let flag = Arc::new(AtomicBool::new(false));
    let detector = ScriptedDetector::always(10).interrupt_after(3, flag.clone());
    let closes = detector.close_counter();

    let report = execute(
        &config,
        video_frames(10).into_iter(),
        InputKind::Video,
        detector,
        Some(&flag),
    )
    .unwrap();

    assert!(report.interrupted);
    assert_eq!(report.stats.total_frames, 3);
    assert_eq!(report.exit_code(config.min_success_rate), EXIT_INTERRUPTED);
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let document = read_document(&dir.path().join("poses.json")).unwrap();
    assert_eq!(document.results.len(), 3);
}

#[test]
fn low_success_rate_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "video.mp4");
    config.artifacts.save_frames = false;

    let report = execute(
        &config,
        video_frames(4).into_iter(),
        InputKind::Video,
        ScriptedDetector::new(vec![Step::Pose(0.9)]),
        None,
    )
    .unwrap();

    assert_relative_eq!(report.stats.success_rate, 0.25);
    assert_eq!(report.exit_code(0.5), 1);
    assert_eq!(report.exit_code(0.2), 0);
}

#[test]
fn unwritable_output_fails_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"x").unwrap();
    let config = config_in(&blocker, "video.mp4");
    let detector = ScriptedDetector::always(2);
    let closes = detector.close_counter();

    let err = execute(
        &config,
        video_frames(2).into_iter(),
        InputKind::Video,
        detector,
        None,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::Output { .. }));
    assert_eq!(err.exit_code(), EXIT_FATAL);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn export_destination_taken_by_directory_fails_before_processing() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("poses.json")).unwrap();
    let config = config_in(dir.path(), "video.mp4");
    let detector = ScriptedDetector::always(5);
    let calls = detector.call_counter();
    let closes = detector.close_counter();

    let err = execute(
        &config,
        video_frames(5).into_iter(),
        InputKind::Video,
        detector,
        None,
    )
    .unwrap_err();

    match &err {
        PipelineError::Output { path, .. } => assert_eq!(path, &dir.path().join("poses.json")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), EXIT_FATAL);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(!dir.path().join("poses.csv").exists());
}

#[test]
fn processing_time_covers_first_frame_detection() {
    let mut detector = ScriptedDetector::always(1).with_delay(Duration::from_millis(200));
    let (results, stats) = process(
        video_frames(1).into_iter(),
        &mut detector,
        &mut NoopProgress,
    );

    assert_eq!(results.len(), 1);
    assert!(stats.processing_time_seconds >= 0.2);
    assert!(stats.fps <= 5.0);
}

#[test]
fn thresholds_and_smoothing_shape_exported_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), "video.mp4");
    config.artifacts.save_frames = false;
    config.artifacts.save_overlays = false;
    config.detection = DetectionConfig::new(1, 0.8, 0.3, false, true).unwrap();

    let script = vec![
        // below the detection threshold
        Step::Pose(0.5),
        Step::At { x: 0.2, confidence: 0.9 },
        // tracking threshold now applies; blended with the previous pose
        Step::At { x: 0.6, confidence: 0.5 },
        Step::NoPose,
        // back on the detection threshold after the miss
        Step::At { x: 0.8, confidence: 0.5 },
        // smoothing history was dropped
        Step::At { x: 0.8, confidence: 0.9 },
    ];
    let detector = TrackedDetector::new(ScriptedDetector::new(script), &config.detection);

    let report = execute(
        &config,
        video_frames(6).into_iter(),
        InputKind::Video,
        detector,
        None,
    )
    .unwrap();

    assert_eq!(report.stats.processed_frames, 3);
    let document = read_document(report.exported_path(ExportFormat::Json).unwrap()).unwrap();
    let ids: Vec<u64> = document.results.iter().map(|r| r.frame_id()).collect();
    assert_eq!(ids, vec![1, 2, 5]);
    let xs: Vec<f32> = document
        .results
        .iter()
        .map(|r| r.landmarks()[0].x)
        .collect();
    assert_relative_eq!(xs[0], 0.2, epsilon = 1e-6);
    assert_relative_eq!(xs[1], 0.4, epsilon = 1e-6);
    assert_relative_eq!(xs[2], 0.8, epsilon = 1e-6);
    assert_relative_eq!(document.results[1].confidence(), 0.5);

    let mut untouched = config.clone();
    untouched.detection = DetectionConfig::new(1, 0.8, 0.3, false, false).unwrap();
    untouched.json_name = Some("raw.json".into());
    untouched.csv_name = Some("raw.csv".into());
    let detector = TrackedDetector::new(
        ScriptedDetector::new(vec![
            Step::At { x: 0.2, confidence: 0.9 },
            Step::At { x: 0.6, confidence: 0.9 },
        ]),
        &untouched.detection,
    );
    let report = execute(
        &untouched,
        video_frames(2).into_iter(),
        InputKind::Video,
        detector,
        None,
    )
    .unwrap();
    let document = read_document(report.exported_path(ExportFormat::Json).unwrap()).unwrap();
    assert_relative_eq!(document.results[1].landmarks()[0].x, 0.6, epsilon = 1e-6);
}

#[test]
fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "does/not/exist.mp4");
    let err = posedetect::run(&config, None).unwrap_err();
    assert!(matches!(err, PipelineError::Input(_)));
    assert_eq!(err.exit_code(), EXIT_FATAL);
}

#[cfg(not(feature = "with-tch"))]
#[test]
fn run_without_model_backend_fails_to_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    RgbImage::new(8, 8).save(&path).unwrap();

    let config = config_in(dir.path(), path.to_str().unwrap());
    let err = posedetect::run(&config, None).unwrap_err();
    assert!(matches!(err, PipelineError::DetectorInit(_)));
}
