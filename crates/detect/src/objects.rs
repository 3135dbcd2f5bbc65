use std::sync::Arc;
use std::time::Instant;

use proctor_events::{AlertKind, AlertSinkRef, NullAlertSink};
use proctor_vision::{BoundingBox, Frame, ObjectFinder};
use serde::Serialize;

use crate::{DetectorOutcome, ObjectSettings, Observable};

/// Allow-listed detection in original-frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledObject {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectReport {
    /// False when the call fell inside the rate-limit interval.
    pub evaluated: bool,
    pub objects: Vec<LabeledObject>,
}

impl ObjectReport {
    pub fn detected(&self) -> bool {
        !self.objects.is_empty()
    }
}

/// Forbidden-object detector, rate limited to `max_fps` evaluations.
///
/// Calls inside the interval report nothing rather than repeating the last
/// result. A single allow-listed hit alerts immediately.
pub struct ObjectDetector {
    finder: Arc<dyn ObjectFinder>,
    settings: ObjectSettings,
    sink: AlertSinkRef,
    last_evaluation: Option<Instant>,
}

impl ObjectDetector {
    pub fn new(finder: Arc<dyn ObjectFinder>, settings: ObjectSettings) -> Self {
        Self {
            finder,
            settings,
            sink: Arc::new(NullAlertSink),
            last_evaluation: None,
        }
    }

    pub fn detect(&mut self, frame: &Frame, now: Instant) -> DetectorOutcome<ObjectReport> {
        if let Some(last) = self.last_evaluation {
            if now.saturating_duration_since(last) < self.settings.min_interval() {
                return DetectorOutcome::Judgment(ObjectReport::default());
            }
        }

        let small = frame.resize_to_width(self.settings.inference_width);
        let sx = frame.width() as f32 / small.width() as f32;
        let sy = frame.height() as f32 / small.height() as f32;

        let detections = match self.finder.detect_objects(&small) {
            Ok(detections) => detections,
            Err(e) => {
                let reason = format!("Object detection failed: {e}");
                self.sink
                    .raise(AlertKind::ObjectDetectionError, &reason, now);
                return DetectorOutcome::Failed {
                    fallback: ObjectReport::default(),
                    kind: AlertKind::ObjectDetectionError,
                    reason,
                };
            }
        };

        let objects: Vec<LabeledObject> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.settings.min_confidence)
            .filter_map(|d| {
                let label = self.settings.classes.get(&d.class_id)?;
                Some(LabeledObject {
                    label: label.clone(),
                    confidence: d.confidence,
                    bbox: d.bbox.scaled(sx, sy),
                })
            })
            .collect();

        for object in &objects {
            let message = format!(
                "Detected {} with confidence {:.2}",
                object.label, object.confidence
            );
            self.sink.raise(AlertKind::ObjectDetected, &message, now);
        }

        self.last_evaluation = Some(now);
        DetectorOutcome::Judgment(ObjectReport {
            evaluated: true,
            objects,
        })
    }
}

impl Observable for ObjectDetector {
    fn attach_alert_sink(&mut self, sink: AlertSinkRef) {
        self.sink = sink;
    }
}
