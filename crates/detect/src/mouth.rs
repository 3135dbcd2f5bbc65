use std::sync::Arc;
use std::time::Instant;

use proctor_events::{AlertKind, AlertSinkRef, NullAlertSink};
use proctor_vision::{Frame, LandmarkFinder, Point};

use crate::{DetectorOutcome, MouthSettings, Observable};

/// Inner-lip gap in normalized mesh units.
pub const MOUTH_OPEN_THRESHOLD: f32 = 0.03;
/// Corner-to-corner width in normalized mesh units.
pub const MOUTH_WIDTH_THRESHOLD: f32 = 0.2;

const UPPER_INNER: usize = 13;
const LOWER_INNER: usize = 14;
const RIGHT_CORNER: usize = 78;
const LEFT_CORNER: usize = 306;

/// Talking heuristic.
///
/// The movement counter decays by one on still frames instead of resetting,
/// which tolerates single-frame noise.
pub struct MouthMonitor {
    finder: Arc<dyn LandmarkFinder>,
    settings: MouthSettings,
    sink: AlertSinkRef,
    movement_count: u32,
}

impl MouthMonitor {
    pub fn new(finder: Arc<dyn LandmarkFinder>, settings: MouthSettings) -> Self {
        Self {
            finder,
            settings,
            sink: Arc::new(NullAlertSink),
            movement_count: 0,
        }
    }

    pub fn monitor(&mut self, frame: &Frame, now: Instant) -> DetectorOutcome<bool> {
        let landmarks = match self.finder.face_landmarks(frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => return DetectorOutcome::Degraded(false),
            Err(e) => return self.fail(format!("Mouth tracking error: {e}"), now),
        };

        let Some((openness, width)) = measure(&landmarks) else {
            return self.fail("Mouth tracking error: malformed landmarks".to_string(), now);
        };

        if openness > MOUTH_OPEN_THRESHOLD || width > MOUTH_WIDTH_THRESHOLD {
            self.movement_count += 1;
            if self.movement_count > self.settings.movement_threshold {
                self.sink.raise(
                    AlertKind::MouthMovement,
                    "Excessive mouth movement detected (possible talking)",
                    now,
                );
                self.movement_count = 0;
            }
            return DetectorOutcome::Judgment(true);
        }

        self.movement_count = self.movement_count.saturating_sub(1);
        DetectorOutcome::Judgment(false)
    }

    pub fn movement_count(&self) -> u32 {
        self.movement_count
    }

    fn fail(&self, reason: String, now: Instant) -> DetectorOutcome<bool> {
        self.sink.raise(AlertKind::MouthTrackingError, &reason, now);
        DetectorOutcome::Failed {
            fallback: false,
            kind: AlertKind::MouthTrackingError,
            reason,
        }
    }
}

/// Signed lip gap (lower minus upper) and absolute corner distance.
fn measure(landmarks: &[Point]) -> Option<(f32, f32)> {
    let upper = landmarks.get(UPPER_INNER)?;
    let lower = landmarks.get(LOWER_INNER)?;
    let right = landmarks.get(RIGHT_CORNER)?;
    let left = landmarks.get(LEFT_CORNER)?;
    Some((lower.y - upper.y, (left.x - right.x).abs()))
}

impl Observable for MouthMonitor {
    fn attach_alert_sink(&mut self, sink: AlertSinkRef) {
        self.sink = sink;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{frame, landmarks, mesh};
    use proctor_events::InMemoryAlertSink;

    fn mouth(gap: f32, width: f32) -> Vec<Point> {
        mesh(&[
            (UPPER_INNER, Point::new(0.5, 0.6)),
            (LOWER_INNER, Point::new(0.5, 0.6 + gap)),
            (RIGHT_CORNER, Point::new(0.5 - width / 2.0, 0.62)),
            (LEFT_CORNER, Point::new(0.5 + width / 2.0, 0.62)),
        ])
    }

    fn open() -> Option<Vec<Point>> {
        Some(mouth(0.05, 0.1))
    }

    fn still() -> Option<Vec<Point>> {
        Some(mouth(0.01, 0.1))
    }

    fn monitor(
        threshold: u32,
        steps: Vec<Option<Vec<Point>>>,
    ) -> (MouthMonitor, Arc<InMemoryAlertSink>) {
        let mut monitor = MouthMonitor::new(
            landmarks(steps.into_iter().map(Ok)),
            MouthSettings {
                movement_threshold: threshold,
            },
        );
        let sink = Arc::new(InMemoryAlertSink::new());
        monitor.attach_alert_sink(sink.clone());
        (monitor, sink)
    }

    #[test]
    fn test_open_or_wide_is_moving() {
        let (mut monitor, _) = monitor(10, vec![open(), Some(mouth(0.0, 0.25)), still()]);
        let frame = frame();
        let now = Instant::now();

        assert_eq!(monitor.monitor(&frame, now), DetectorOutcome::Judgment(true));
        assert_eq!(monitor.monitor(&frame, now), DetectorOutcome::Judgment(true));
        assert_eq!(monitor.monitor(&frame, now), DetectorOutcome::Judgment(false));
    }

    #[test]
    fn test_alert_after_threshold_then_reset() {
        let (mut monitor, sink) = monitor(3, vec![open(); 4]);
        let frame = frame();
        let now = Instant::now();

        for _ in 0..3 {
            monitor.monitor(&frame, now);
        }
        assert_eq!(sink.count(AlertKind::MouthMovement), 0);
        assert_eq!(monitor.movement_count(), 3);

        monitor.monitor(&frame, now);
        assert_eq!(sink.count(AlertKind::MouthMovement), 1);
        assert_eq!(monitor.movement_count(), 0);
    }

    #[test]
    fn test_still_frames_decay_not_reset() {
        let (mut monitor, _) = monitor(10, vec![open(), open(), open(), still(), still(), still(), still()]);
        let frame = frame();
        let now = Instant::now();

        for _ in 0..3 {
            monitor.monitor(&frame, now);
        }
        monitor.monitor(&frame, now);
        assert_eq!(monitor.movement_count(), 2);

        for _ in 0..3 {
            monitor.monitor(&frame, now);
        }
        assert_eq!(monitor.movement_count(), 0);
    }

    #[test]
    fn test_no_face_is_not_moving() {
        let (mut monitor, sink) = monitor(10, vec![open(), None]);
        let frame = frame();
        let now = Instant::now();

        monitor.monitor(&frame, now);
        assert_eq!(monitor.monitor(&frame, now), DetectorOutcome::Degraded(false));
        assert_eq!(monitor.movement_count(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_provider_error_is_contained() {
        let finder = landmarks([Err("mesh crashed".to_string())]);
        let mut monitor = MouthMonitor::new(finder, MouthSettings::default());
        let sink = Arc::new(InMemoryAlertSink::new());
        monitor.attach_alert_sink(sink.clone());

        let outcome = monitor.monitor(&frame(), Instant::now());
        assert_eq!(outcome.failure().map(|(k, _)| k), Some(AlertKind::MouthTrackingError));
        assert!(!outcome.into_value());
        assert_eq!(sink.count(AlertKind::MouthTrackingError), 1);
    }
}
