use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    input::{InputKind, list_images},
    types::{CaptureError, Frame},
};

/// Still images decoded lazily, one per frame, each at timestamp 0.
#[derive(Debug)]
pub struct ImageSequence {
    kind: InputKind,
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    pub fn single(path: &Path) -> Self {
        Self {
            kind: InputKind::Image,
            paths: vec![path.to_path_buf()],
            next: 0,
        }
    }

    pub fn directory(dir: &Path) -> Result<Self, CaptureError> {
        let paths = list_images(dir)?;
        debug!(dir = %dir.display(), images = paths.len(), "image directory listed");
        Ok(Self {
            kind: InputKind::Directory,
            paths,
            next: 0,
        })
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Iterator for ImageSequence {
    type Item = Result<Frame, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.next)?;
        let frame_id = self.next as u64;
        self.next += 1;

        let source = path.display().to_string();
        let frame = match image::open(path) {
            Ok(decoded) => Ok(Frame {
                frame_id,
                timestamp: 0.0,
                image: decoded.to_rgb8(),
                source,
            }),
            Err(err) => Err(CaptureError::Decode {
                frame_id,
                source_file: source,
                reason: err.to_string(),
            }),
        };
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.paths.len() - self.next;
        (remaining, Some(remaining))
    }
}
