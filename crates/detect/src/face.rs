use std::sync::Arc;
use std::time::{Duration, Instant};

use proctor_events::{AlertKind, AlertSinkRef, NullAlertSink};
use proctor_vision::{FaceFinder, Frame};

use crate::{DetectorOutcome, FaceSettings, Observable};

/// Face presence state machine.
///
/// Only every `detection_interval`-th frame is evaluated; frames in between
/// repeat the last state, so a single missed detection cannot flip it.
pub struct FaceDetector {
    finder: Arc<dyn FaceFinder>,
    settings: FaceSettings,
    sink: AlertSinkRef,
    frame_count: u64,
    face_present: bool,
    face_disappeared_start: Option<Instant>,
    absence_reported: bool,
}

impl FaceDetector {
    pub fn new(finder: Arc<dyn FaceFinder>, settings: FaceSettings) -> Self {
        Self {
            finder,
            settings,
            sink: Arc::new(NullAlertSink),
            frame_count: 0,
            face_present: true,
            face_disappeared_start: None,
            absence_reported: false,
        }
    }

    pub fn detect(&mut self, frame: &Frame, now: Instant) -> DetectorOutcome<bool> {
        self.frame_count += 1;
        let interval = u64::from(self.settings.detection_interval.max(1));
        if self.frame_count % interval != 0 {
            return DetectorOutcome::Judgment(self.face_present);
        }

        match self.finder.detect_faces(frame) {
            Ok(faces) => {
                let found = faces
                    .iter()
                    .any(|f| f.confidence > self.settings.min_confidence);
                if found {
                    self.handle_present(now);
                } else {
                    self.handle_absent(now);
                }
                DetectorOutcome::Judgment(self.face_present)
            }
            Err(e) => {
                let reason = format!("Face detection failed: {e}");
                self.sink
                    .raise(AlertKind::FaceDetectionError, &reason, now);
                DetectorOutcome::Failed {
                    fallback: self.face_present,
                    kind: AlertKind::FaceDetectionError,
                    reason,
                }
            }
        }
    }

    pub fn is_present(&self) -> bool {
        self.face_present
    }

    /// How long the face has been absent as of `now`.
    pub fn absent_for(&self, now: Instant) -> Option<Duration> {
        self.face_disappeared_start
            .map(|start| now.saturating_duration_since(start))
    }

    fn handle_present(&mut self, now: Instant) {
        if !self.face_present {
            if let Some(absence) = self.absent_for(now) {
                if absence > self.settings.absence_alert() {
                    let message = format!(
                        "Face reappeared after {:.1} seconds",
                        absence.as_secs_f64()
                    );
                    self.sink.raise(AlertKind::FaceReappeared, &message, now);
                }
            }
            tracing::debug!("face present");
        }

        self.face_present = true;
        self.face_disappeared_start = None;
        self.absence_reported = false;
    }

    fn handle_absent(&mut self, now: Instant) {
        if self.face_present {
            tracing::debug!("face absent");
            self.face_disappeared_start = Some(now);
        }
        self.face_present = false;

        let Some(absence) = self.absent_for(now) else {
            return;
        };
        if !self.absence_reported && absence > self.settings.absence_alert() {
            let message = format!(
                "Face disappeared for more than {} seconds",
                self.settings.absence_alert_secs
            );
            self.absence_reported = self.sink.raise(AlertKind::FaceDisappeared, &message, now);
        }
    }
}

impl Observable for FaceDetector {
    fn attach_alert_sink(&mut self, sink: AlertSinkRef) {
        self.sink = sink;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{face, faces, frame};
    use proctor_events::InMemoryAlertSink;
    use proctor_vision::FaceDetection;

    const INTERVAL: u32 = 5;

    fn detector(
        steps: impl IntoIterator<Item = Result<Vec<FaceDetection>, String>>,
    ) -> (FaceDetector, Arc<InMemoryAlertSink>) {
        let settings = FaceSettings {
            detection_interval: INTERVAL,
            ..Default::default()
        };
        let mut detector = FaceDetector::new(faces(steps), settings);
        let sink = Arc::new(InMemoryAlertSink::new());
        detector.attach_alert_sink(sink.clone());
        (detector, sink)
    }

    /// Feed one sampling stride ending at `now`; returns the sampled outcome.
    fn stride(detector: &mut FaceDetector, now: Instant) -> DetectorOutcome<bool> {
        let frame = frame();
        for _ in 1..INTERVAL {
            detector.detect(&frame, now);
        }
        detector.detect(&frame, now)
    }

    #[test]
    fn test_frames_between_samples_repeat_state() {
        let (mut detector, _) = detector([Ok(vec![])]);
        let frame = frame();
        let now = Instant::now();

        for _ in 1..INTERVAL {
            assert_eq!(detector.detect(&frame, now), DetectorOutcome::Judgment(true));
        }
        assert_eq!(detector.detect(&frame, now), DetectorOutcome::Judgment(false));
    }

    #[test]
    fn test_long_absence_alerts_once_each_way() {
        let absent = (0..5).map(|_| Ok(vec![]));
        let steps = std::iter::once(Ok(vec![face(0.99)]))
            .chain(absent)
            .chain(std::iter::once(Ok(vec![face(0.99)])));
        let (mut detector, sink) = detector(steps);
        let t0 = Instant::now();

        assert!(*stride(&mut detector, t0).value());
        for i in 1..=5u64 {
            let now = t0 + Duration::from_millis(1500 * i);
            assert!(!*stride(&mut detector, now).value());
        }
        assert!(*stride(&mut detector, t0 + Duration::from_secs(9)).value());

        assert_eq!(sink.count(AlertKind::FaceDisappeared), 1);
        assert_eq!(sink.count(AlertKind::FaceReappeared), 1);
        let reappeared = sink
            .alerts()
            .into_iter()
            .find(|a| a.kind == AlertKind::FaceReappeared)
            .unwrap();
        assert_eq!(reappeared.message, "Face reappeared after 7.5 seconds");
    }

    #[test]
    fn test_short_absence_is_silent() {
        let steps = [Ok(vec![]), Ok(vec![]), Ok(vec![face(0.95)])];
        let (mut detector, sink) = detector(steps);
        let t0 = Instant::now();

        stride(&mut detector, t0);
        stride(&mut detector, t0 + Duration::from_secs(2));
        assert!(*stride(&mut detector, t0 + Duration::from_secs(4)).value());

        assert!(sink.is_empty());
    }

    #[test]
    fn test_low_confidence_counts_as_absent() {
        let (mut detector, _) = detector([Ok(vec![face(0.5)])]);
        let outcome = stride(&mut detector, Instant::now());
        assert_eq!(outcome, DetectorOutcome::Judgment(false));
        assert!(detector.absent_for(Instant::now()).is_some());
    }

    #[test]
    fn test_failure_keeps_last_state() {
        let (mut detector, sink) = detector([Err("camera glitch".to_string())]);
        let outcome = stride(&mut detector, Instant::now());

        assert!(outcome.is_failed());
        assert!(*outcome.value());
        assert_eq!(sink.count(AlertKind::FaceDetectionError), 1);
    }
}
