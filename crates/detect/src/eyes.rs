use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use proctor_events::{AlertKind, AlertSinkRef, NullAlertSink};
use proctor_vision::{Frame, LandmarkFinder, Point};
use serde::Serialize;

use crate::{DetectorOutcome, EyeSettings, Observable};

/// Face-mesh indices of the six eye-contour points, corner first.
pub const LEFT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
pub const RIGHT_EYE: [usize; 6] = [362, 385, 387, 263, 373, 380];
pub const NOSE_TIP: usize = 4;

/// Reported before the first successful measurement.
const DEFAULT_EYE_RATIO: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GazeDirection {
    Left,
    #[default]
    Center,
    Right,
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GazeDirection::Left => "left",
            GazeDirection::Center => "center",
            GazeDirection::Right => "right",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EyeReading {
    pub direction: GazeDirection,
    /// Mean eye-aspect ratio of both eyes. Not thresholded here.
    pub ratio: f32,
}

impl Default for EyeReading {
    fn default() -> Self {
        Self {
            direction: GazeDirection::Center,
            ratio: DEFAULT_EYE_RATIO,
        }
    }
}

/// (|p1 - p5| + |p2 - p4|) / (2 |p0 - p3|), or `None` for a degenerate eye.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Option<f32> {
    let vertical = eye[1].distance(&eye[5]) + eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal <= f32::EPSILON {
        return None;
    }
    Some(vertical / (2.0 * horizontal))
}

fn center(eye: &[Point; 6]) -> Point {
    let (sx, sy) = eye
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / 6.0, sy / 6.0)
}

/// Compare the midpoint of both eye centers against the nose tip.
pub fn gaze_direction(
    left: &[Point; 6],
    right: &[Point; 6],
    nose: Point,
    threshold: f32,
) -> GazeDirection {
    let midpoint = (center(left).x + center(right).x) / 2.0;
    let diff = midpoint - nose.x;
    if diff < -threshold {
        GazeDirection::Left
    } else if diff > threshold {
        GazeDirection::Right
    } else {
        GazeDirection::Center
    }
}

/// Eye openness and gaze tracker.
///
/// Missing landmarks keep the cached reading. More than `max_gaze_changes`
/// direction changes inside `movement_window` raise `EYE_MOVEMENT`.
pub struct EyeTracker {
    finder: Arc<dyn LandmarkFinder>,
    settings: EyeSettings,
    sink: AlertSinkRef,
    reading: EyeReading,
    changes: VecDeque<Instant>,
}

impl EyeTracker {
    pub fn new(finder: Arc<dyn LandmarkFinder>, settings: EyeSettings) -> Self {
        Self {
            finder,
            settings,
            sink: Arc::new(NullAlertSink),
            reading: EyeReading::default(),
            changes: VecDeque::new(),
        }
    }

    pub fn track(&mut self, frame: &Frame, now: Instant) -> DetectorOutcome<EyeReading> {
        let landmarks = match self.finder.face_landmarks(frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => return DetectorOutcome::Degraded(self.reading),
            Err(e) => return self.fail(format!("Eye tracking error: {e}"), now),
        };

        let Some((ratio, direction)) = self.measure(&landmarks, frame.width(), frame.height())
        else {
            return self.fail("Eye tracking error: malformed landmarks".to_string(), now);
        };

        self.reading.ratio = ratio;
        self.check_gaze_change(direction, now);
        DetectorOutcome::Judgment(self.reading)
    }

    pub fn reading(&self) -> EyeReading {
        self.reading
    }

    /// Direction changes still inside the rolling window.
    pub fn gaze_changes(&self) -> usize {
        self.changes.len()
    }

    fn measure(&self, landmarks: &[Point], width: u32, height: u32) -> Option<(f32, GazeDirection)> {
        let pick = |indices: &[usize; 6]| -> Option<[Point; 6]> {
            let mut eye = [Point::default(); 6];
            for (slot, &i) in eye.iter_mut().zip(indices) {
                *slot = landmarks.get(i)?.to_pixels(width, height);
            }
            Some(eye)
        };

        let left = pick(&LEFT_EYE)?;
        let right = pick(&RIGHT_EYE)?;
        let nose = landmarks.get(NOSE_TIP)?.to_pixels(width, height);

        let ratio = (eye_aspect_ratio(&left)? + eye_aspect_ratio(&right)?) / 2.0;
        if !ratio.is_finite() {
            return None;
        }
        let direction = gaze_direction(&left, &right, nose, self.settings.gaze_threshold);
        Some((ratio, direction))
    }

    fn check_gaze_change(&mut self, direction: GazeDirection, now: Instant) {
        if direction != self.reading.direction {
            self.reading.direction = direction;
            self.changes.push_back(now);
        }

        let window = self.settings.movement_window();
        while let Some(first) = self.changes.front() {
            if now.saturating_duration_since(*first) < window {
                break;
            }
            self.changes.pop_front();
        }

        if self.changes.len() > self.settings.max_gaze_changes {
            self.sink.raise(
                AlertKind::EyeMovement,
                "Excessive eye movement detected",
                now,
            );
            self.changes.clear();
        }
    }

    fn fail(&self, reason: String, now: Instant) -> DetectorOutcome<EyeReading> {
        self.sink.raise(AlertKind::EyeTrackingError, &reason, now);
        DetectorOutcome::Failed {
            fallback: self.reading,
            kind: AlertKind::EyeTrackingError,
            reason,
        }
    }
}

impl Observable for EyeTracker {
    fn attach_alert_sink(&mut self, sink: AlertSinkRef) {
        self.sink = sink;
    }
}
