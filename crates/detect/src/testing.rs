//! Scripted providers for detector tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use proctor_events::{AlertKind, AlertSink, InMemoryAlertSink};

use proctor_vision::{
    BoundingBox, FaceDetection, FaceFinder, Frame, LandmarkFinder, ObjectDetection, ObjectFinder,
    PixelFormat, Point, VisionError,
};

/// Number of points in a refined face mesh.
pub const MESH_POINTS: usize = 478;

pub struct Script<T> {
    steps: Mutex<VecDeque<Result<T, String>>>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    pub fn new(steps: impl IntoIterator<Item = Result<T, String>>, fallback: T) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback,
        }
    }

    fn next(&self) -> proctor_vision::Result<T> {
        match self.steps.lock().unwrap().pop_front() {
            Some(Ok(v)) => Ok(v),
            Some(Err(e)) => Err(VisionError::Inference(e)),
            None => Ok(self.fallback.clone()),
        }
    }
}

pub struct ScriptedFaces(pub Script<Vec<FaceDetection>>);

impl FaceFinder for ScriptedFaces {
    fn detect_faces(&self, _frame: &Frame) -> proctor_vision::Result<Vec<FaceDetection>> {
        self.0.next()
    }
}

pub struct ScriptedLandmarks(pub Script<Option<Vec<Point>>>);

impl LandmarkFinder for ScriptedLandmarks {
    fn face_landmarks(&self, _frame: &Frame) -> proctor_vision::Result<Option<Vec<Point>>> {
        self.0.next()
    }
}

pub struct ScriptedObjects(pub Script<Vec<ObjectDetection>>);

impl ObjectFinder for ScriptedObjects {
    fn detect_objects(&self, _frame: &Frame) -> proctor_vision::Result<Vec<ObjectDetection>> {
        self.0.next()
    }
}

pub fn faces(
    steps: impl IntoIterator<Item = Result<Vec<FaceDetection>, String>>,
) -> Arc<ScriptedFaces> {
    Arc::new(ScriptedFaces(Script::new(steps, Vec::new())))
}

pub fn landmarks(
    steps: impl IntoIterator<Item = Result<Option<Vec<Point>>, String>>,
) -> Arc<ScriptedLandmarks> {
    Arc::new(ScriptedLandmarks(Script::new(steps, None)))
}

pub fn objects(
    steps: impl IntoIterator<Item = Result<Vec<ObjectDetection>, String>>,
) -> Arc<ScriptedObjects> {
    Arc::new(ScriptedObjects(Script::new(steps, Vec::new())))
}

pub fn face(confidence: f32) -> FaceDetection {
    FaceDetection {
        bbox: BoundingBox::new(100.0, 100.0, 200.0, 220.0),
        confidence,
    }
}

pub fn frame() -> Frame {
    Frame::blank(640, 480, PixelFormat::Bgr)
}

/// Mesh with every point at the center, then `overrides` applied.
pub fn mesh(overrides: &[(usize, Point)]) -> Vec<Point> {
    let mut points = vec![Point::new(0.5, 0.5); MESH_POINTS];
    for (i, p) in overrides {
        points[*i] = *p;
    }
    points
}

/// In-memory sink with a per-kind cooldown, like the alert logger.
pub struct CooldownSink {
    pub inner: InMemoryAlertSink,
    cooldown: Duration,
    last: Mutex<HashMap<AlertKind, Instant>>,
}

impl CooldownSink {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: InMemoryAlertSink::new(),
            cooldown,
            last: Mutex::new(HashMap::new()),
        }
    }
}

impl AlertSink for CooldownSink {
    fn raise(&self, kind: AlertKind, message: &str, at: Instant) -> bool {
        let mut last = self.last.lock().unwrap();
        if let Some(prev) = last.get(&kind) {
            if at.saturating_duration_since(*prev) < self.cooldown {
                return false;
            }
        }
        last.insert(kind, at);
        self.inner.raise(kind, message, at)
    }
}
