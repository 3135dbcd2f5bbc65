use std::sync::Arc;
use std::time::Instant;

use proctor_events::{AlertKind, AlertSinkRef, NullAlertSink};
use proctor_vision::{FaceFinder, Frame};

use crate::{DetectorOutcome, MultiFaceSettings, Observable};

/// Faces must score strictly above this to be counted.
pub const HIGH_CONFIDENCE: f32 = 0.9;

/// Requires two or more confident faces on `alert_threshold` consecutive
/// frames. Any frame with fewer resets the streak.
pub struct MultiFaceDetector {
    finder: Arc<dyn FaceFinder>,
    settings: MultiFaceSettings,
    sink: AlertSinkRef,
    consecutive_frames: u32,
}

impl MultiFaceDetector {
    pub fn new(finder: Arc<dyn FaceFinder>, settings: MultiFaceSettings) -> Self {
        Self {
            finder,
            settings,
            sink: Arc::new(NullAlertSink),
            consecutive_frames: 0,
        }
    }

    pub fn detect(&mut self, frame: &Frame, now: Instant) -> DetectorOutcome<bool> {
        let faces = match self.finder.detect_faces(frame) {
            Ok(faces) => faces,
            Err(e) => {
                self.consecutive_frames = 0;
                let reason = format!("Multi-face detection failed: {e}");
                self.sink
                    .raise(AlertKind::MultiFaceDetectionError, &reason, now);
                return DetectorOutcome::Failed {
                    fallback: false,
                    kind: AlertKind::MultiFaceDetectionError,
                    reason,
                };
            }
        };

        let confident = faces
            .iter()
            .filter(|f| f.confidence > HIGH_CONFIDENCE)
            .count();
        if confident < 2 {
            self.consecutive_frames = 0;
            return DetectorOutcome::Judgment(false);
        }

        self.consecutive_frames += 1;
        if self.consecutive_frames < self.settings.alert_threshold {
            return DetectorOutcome::Judgment(false);
        }

        let message = format!(
            "Detected {confident} faces for {} frames",
            self.consecutive_frames
        );
        self.sink.raise(AlertKind::MultipleFaces, &message, now);
        DetectorOutcome::Judgment(true)
    }

    pub fn consecutive_frames(&self) -> u32 {
        self.consecutive_frames
    }
}

impl Observable for MultiFaceDetector {
    fn attach_alert_sink(&mut self, sink: AlertSinkRef) {
        self.sink = sink;
    }
}
