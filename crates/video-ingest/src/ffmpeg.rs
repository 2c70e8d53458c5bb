use std::{
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    thread,
};

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender, bounded};
use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{CaptureError, Frame};

const QUEUE_SIZE: usize = 4;

/// Stream properties reported by `ffprobe` for the first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub frame_count: Option<u64>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

pub fn probe_video(path: &Path) -> Result<VideoInfo, CaptureError> {
    let probe_err = |reason: String| CaptureError::Probe {
        path: path.to_path_buf(),
        reason,
    };

    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-select_streams")
        .arg("v:0")
        .arg("-show_entries")
        .arg("stream=width,height,avg_frame_rate,r_frame_rate,nb_frames")
        .arg("-of")
        .arg("json")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| probe_err(format!("failed to run ffprobe: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(probe_err(stderr.trim().to_string()));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe(&stdout).map_err(probe_err)
}

fn parse_probe(json: &str) -> Result<VideoInfo, String> {
    let parsed: ProbeOutput =
        serde_json::from_str(json).map_err(|err| format!("invalid ffprobe output: {err}"))?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".into()),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate));
    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Parses ffprobe rates such as `30000/1001` or `25`. `0/0` means unknown.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Decodes a video file with an `ffmpeg` child process. Raw rgb24 frames are
/// read on a background thread and handed over a small bounded channel so the
/// decoder never runs far ahead of the consumer.
pub struct VideoStream {
    info: VideoInfo,
    source: String,
    rx: Receiver<Result<Vec<u8>, CaptureError>>,
    next_id: u64,
    finished: bool,
}

impl VideoStream {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let info = probe_video(path)?;
        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = ?info.fps,
            frames = ?info.frame_count,
            "video probed"
        );

        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-");

        let rx = spawn_ffmpeg_reader(cmd, path, (info.width, info.height))?;
        Ok(Self {
            info,
            source: path.display().to_string(),
            rx,
            next_id: 0,
            finished: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn timestamp(&self, frame_id: u64) -> f64 {
        match self.info.fps {
            Some(fps) => frame_id as f64 / fps,
            None => 0.0,
        }
    }
}

impl Iterator for VideoStream {
    type Item = Result<Frame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let message = match self.rx.recv() {
            Ok(message) => message,
            Err(_) => {
                self.finished = true;
                return None;
            }
        };

        let frame_id = self.next_id;
        self.next_id += 1;

        let item = message.and_then(|bytes| {
            RgbImage::from_raw(self.info.width, self.info.height, bytes)
                .map(|image| Frame {
                    frame_id,
                    timestamp: self.timestamp(frame_id),
                    image,
                    source: self.source.clone(),
                })
                .ok_or_else(|| CaptureError::Decode {
                    frame_id,
                    source_file: self.source.clone(),
                    reason: "frame buffer does not match the probed dimensions".into(),
                })
        });
        if matches!(&item, Err(err) if !err.is_recoverable()) {
            self.finished = true;
        }
        Some(item)
    }
}

fn spawn_ffmpeg_reader(
    mut cmd: Command,
    path: &Path,
    size: (u32, u32),
) -> Result<Receiver<Result<Vec<u8>, CaptureError>>, CaptureError> {
    let (tx, rx) = bounded(QUEUE_SIZE);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let open_err = |reason: String| CaptureError::Open {
        path: path.to_path_buf(),
        reason,
    };
    let mut child = cmd
        .spawn()
        .map_err(|err| open_err(format!("failed to start ffmpeg: {err}")))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| open_err("failed to capture ffmpeg stdout".into()))?;

    let path: PathBuf = path.to_path_buf();
    thread::Builder::new()
        .name("ffmpeg-reader".into())
        .spawn(move || {
            if let Err(err) = ffmpeg_loop(stdout, child, size, &tx) {
                warn!(path = %path.display(), error = %err, "video decoding stopped");
                let _ = tx.send(Err(err));
            }
        })
        .map_err(|err| CaptureError::Other(err.into()))?;

    Ok(rx)
}

fn ffmpeg_loop(
    mut stdout: impl Read,
    mut child: Child,
    size: (u32, u32),
    tx: &Sender<Result<Vec<u8>, CaptureError>>,
) -> Result<(), CaptureError> {
    let frame_bytes = size.0 as usize * size.1 as usize * 3;
    let mut buffer = vec![0u8; frame_bytes];
    let mut result = Ok(());
    let mut hung_up = false;

    loop {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                if tx.send(Ok(buffer.clone())).is_err() {
                    hung_up = true;
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => {
                result = Err(CaptureError::Other(err.into()));
                break;
            }
        }
    }

    // ffmpeg is only stopped early when nobody reads its output any more.
    if hung_up || result.is_err() {
        let _ = child.kill();
    }
    match child.wait() {
        Ok(status) if hung_up => debug!(?status, "ffmpeg stopped after consumer hung up"),
        Ok(status) if !status.success() && result.is_ok() => {
            result = Err(CaptureError::Other(anyhow!(
                "ffmpeg exited with {status} before the end of the video"
            )));
        }
        Err(err) if result.is_ok() => {
            result = Err(CaptureError::Other(anyhow!("failed to reap ffmpeg: {err}")));
        }
        _ => {}
    }
    result
}
