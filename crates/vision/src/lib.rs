//! Video-side contracts.
//!
//! `Frame` is the unit the frame loop hands to every detector. The provider
//! traits are the only way the pipeline talks to face, landmark and object
//! models; implementations live outside this workspace.

mod draw;
mod frame;
mod geometry;

pub use draw::{draw_rect, fill_rect, Rgb, GREEN, RED, WHITE, YELLOW};
pub use frame::{Frame, PixelFormat};
pub use geometry::{BoundingBox, Point};

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    InvalidFrame { expected: usize, actual: usize },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("frame source failed: {0}")]
    Source(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, VisionError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObjectDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Face detector returning pixel-space boxes.
pub trait FaceFinder: Send + Sync {
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<FaceDetection>>;
}

/// Face-mesh model.
pub trait LandmarkFinder: Send + Sync {
    /// Landmarks of the first face, normalized to `0..1`, or `None` when no
    /// face was found.
    fn face_landmarks(&self, frame: &Frame) -> Result<Option<Vec<Point>>>;
}

/// General object detector returning pixel-space boxes.
pub trait ObjectFinder: Send + Sync {
    fn detect_objects(&self, frame: &Frame) -> Result<Vec<ObjectDetection>>;
}

/// Anything that yields video frames until exhausted.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is closed.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Frames from memory, mostly for tests and replays.
pub struct VecFrameSource {
    frames: std::collections::VecDeque<Frame>,
}

impl VecFrameSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}
