//! Classification of an input path into a frame source kind.

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::types::CaptureError;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Image,
    Video,
    Directory,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Image => "image",
            InputKind::Video => "video",
            InputKind::Directory => "directory",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

pub fn is_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

pub fn is_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

pub fn classify(path: &Path) -> Result<InputKind, CaptureError> {
    let metadata = fs::metadata(path).map_err(|err| CaptureError::Open {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;

    if metadata.is_dir() {
        Ok(InputKind::Directory)
    } else if is_image(path) {
        Ok(InputKind::Image)
    } else if is_video(path) {
        Ok(InputKind::Video)
    } else {
        Err(CaptureError::Unsupported {
            path: path.to_path_buf(),
        })
    }
}

/// Supported images directly inside `dir`, sorted by path. Subdirectories are
/// not descended into.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let open_err = |err: std::io::Error| CaptureError::Open {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    };

    let mut images = Vec::new();
    for entry in fs::read_dir(dir).map_err(open_err)? {
        let path = entry.map_err(open_err)?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(CaptureError::EmptyDirectory {
            path: dir.to_path_buf(),
        });
    }
    images.sort();
    Ok(images)
}
