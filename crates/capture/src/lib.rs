//! Evidence capture: annotated stills for violations and continuous
//! webcam/screen recordings.

mod screen;
mod still;
mod webcam;
mod writer;

pub use screen::{ScreenGrabber, ScreenRecorder};
pub use still::{ViolationCapturer, CAPTURE_DIR};
pub use webcam::VideoRecorder;
pub use writer::{FrameWriter, FrameWriterFactory, MjpegWriter, MjpegWriterFactory};

use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("frame is {actual_width}x{actual_height}, writer expects {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("recorder is already running")]
    AlreadyRecording,
    #[error("recorder is not running")]
    NotRecording,
    #[error("invalid frame rate: {0}")]
    InvalidFps(f64),
    #[error("screen grab failed: {0}")]
    Grab(String),
}

pub type Result<T> = std::result::Result<T, CaptureError>;

/// Returned by a recorder when it stops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub frame_count: u64,
    pub duration_secs: f64,
    pub fps: f64,
    /// Write error that ended the recording early. Frames before it are kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn recording_name(prefix: &str, extension: &str) -> String {
    let stamp = chrono::Local::now().format(proctor_violations::RECORDING_STAMP_FORMAT);
    format!("{prefix}_{stamp}.{extension}")
}
