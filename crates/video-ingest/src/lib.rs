pub mod ffmpeg;
pub mod images;
pub mod input;
pub mod source;
pub mod types;

pub use ffmpeg::{VideoInfo, VideoStream, probe_video};
pub use images::ImageSequence;
pub use input::{IMAGE_EXTENSIONS, InputKind, VIDEO_EXTENSIONS, classify, list_images};
pub use source::{FrameSource, FrameStream};
pub use types::{CaptureError, Frame};
