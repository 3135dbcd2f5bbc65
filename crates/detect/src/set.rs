use std::sync::Arc;
use std::time::Instant;

use proctor_events::{AlertKind, AlertSinkRef};
use proctor_vision::{FaceFinder, Frame, LandmarkFinder, ObjectFinder};
use serde::Serialize;

use crate::{
    DetectionSettings, DetectorOutcome, EyeTracker, FaceDetector, GazeDirection, LabeledObject,
    MouthMonitor, MultiFaceDetector, ObjectDetector, Observable,
};

const JUDGMENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inference backends shared by the detectors.
#[derive(Clone)]
pub struct DetectorProviders {
    pub faces: Arc<dyn FaceFinder>,
    pub landmarks: Arc<dyn LandmarkFinder>,
    pub objects: Arc<dyn ObjectFinder>,
}

/// Per-frame judgment bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameJudgment {
    pub face_present: bool,
    pub gaze_direction: GazeDirection,
    pub eye_ratio: f32,
    pub mouth_moving: bool,
    pub multiple_faces: bool,
    pub objects_detected: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct FrameEvaluation {
    pub judgment: FrameJudgment,
    /// Allow-listed objects found this frame, for the overlay.
    pub objects: Vec<LabeledObject>,
    /// Detectors that failed this frame.
    pub failures: Vec<(AlertKind, String)>,
}

/// The five video detectors, run in a fixed order on every frame.
pub struct DetectorSet {
    pub face: FaceDetector,
    pub eyes: EyeTracker,
    pub mouth: MouthMonitor,
    pub multi_face: MultiFaceDetector,
    pub objects: ObjectDetector,
}

impl DetectorSet {
    pub fn new(providers: &DetectorProviders, settings: &DetectionSettings) -> Self {
        Self {
            face: FaceDetector::new(providers.faces.clone(), settings.face.clone()),
            eyes: EyeTracker::new(providers.landmarks.clone(), settings.eyes.clone()),
            mouth: MouthMonitor::new(providers.landmarks.clone(), settings.mouth.clone()),
            multi_face: MultiFaceDetector::new(
                providers.faces.clone(),
                settings.multi_face.clone(),
            ),
            objects: ObjectDetector::new(providers.objects.clone(), settings.objects.clone()),
        }
    }

    pub fn evaluate(&mut self, frame: &Frame, now: Instant) -> FrameEvaluation {
        let mut failures = Vec::new();

        let face_present = collect(self.face.detect(frame, now), &mut failures);
        let eyes = collect(self.eyes.track(frame, now), &mut failures);
        let mouth_moving = collect(self.mouth.monitor(frame, now), &mut failures);
        let multiple_faces = collect(self.multi_face.detect(frame, now), &mut failures);
        let objects = collect(self.objects.detect(frame, now), &mut failures);

        let judgment = FrameJudgment {
            face_present,
            gaze_direction: eyes.direction,
            eye_ratio: eyes.ratio,
            mouth_moving,
            multiple_faces,
            objects_detected: objects.detected(),
            timestamp: chrono::Local::now()
                .format(JUDGMENT_TIME_FORMAT)
                .to_string(),
        };

        FrameEvaluation {
            judgment,
            objects: objects.objects,
            failures,
        }
    }

    fn observables(&mut self) -> [&mut dyn Observable; 5] {
        [
            &mut self.face,
            &mut self.eyes,
            &mut self.mouth,
            &mut self.multi_face,
            &mut self.objects,
        ]
    }
}

impl Observable for DetectorSet {
    fn attach_alert_sink(&mut self, sink: AlertSinkRef) {
        for detector in self.observables() {
            detector.attach_alert_sink(sink.clone());
        }
    }
}

fn collect<T>(outcome: DetectorOutcome<T>, failures: &mut Vec<(AlertKind, String)>) -> T {
    if let Some((kind, reason)) = outcome.failure() {
        tracing::debug!(%kind, reason, "detector degraded");
        failures.push((kind, reason.to_string()));
    }
    outcome.into_value()
}
