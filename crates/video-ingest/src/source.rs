use std::path::Path;

use tracing::info;

use crate::{
    ffmpeg::VideoStream,
    images::ImageSequence,
    input::{InputKind, classify},
    types::{CaptureError, Frame},
};

/// A lazy, ordered sequence of frames. `Err` items carrying
/// [`CaptureError::Decode`] affect one frame only; any other error ends the
/// stream.
pub trait FrameStream: Iterator<Item = Result<Frame, CaptureError>> {
    /// Number of frames the source will yield, when known up front.
    fn total_count(&self) -> Option<u64>;
}

/// Frame source selected from an input path.
pub enum FrameSource {
    Images(ImageSequence),
    Video(VideoStream),
}

impl FrameSource {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let kind = classify(path)?;
        let source = match kind {
            InputKind::Image => FrameSource::Images(ImageSequence::single(path)),
            InputKind::Directory => FrameSource::Images(ImageSequence::directory(path)?),
            InputKind::Video => FrameSource::Video(VideoStream::open(path)?),
        };
        info!(
            input = %path.display(),
            %kind,
            frames = ?source.total_count(),
            "frame source opened"
        );
        Ok(source)
    }

    pub fn kind(&self) -> InputKind {
        match self {
            FrameSource::Images(images) => images.kind(),
            FrameSource::Video(_) => InputKind::Video,
        }
    }
}

impl Iterator for FrameSource {
    type Item = Result<Frame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            FrameSource::Images(images) => images.next(),
            FrameSource::Video(video) => video.next(),
        }
    }
}

impl FrameStream for FrameSource {
    fn total_count(&self) -> Option<u64> {
        match self {
            FrameSource::Images(images) => Some(images.len() as u64),
            FrameSource::Video(video) => video.info().frame_count,
        }
    }
}

/// Pre-decoded frames, e.g. from a test fixture.
impl FrameStream for std::vec::IntoIter<Result<Frame, CaptureError>> {
    fn total_count(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

impl<S: FrameStream + ?Sized> FrameStream for Box<S> {
    fn total_count(&self) -> Option<u64> {
        (**self).total_count()
    }
}
