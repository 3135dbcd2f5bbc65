//! Per-frame detectors.
//!
//! Each detector wraps one inference provider and turns its noisy output into
//! a debounced judgment. Detectors never return errors: provider failures are
//! raised as diagnostic alerts and surface as `DetectorOutcome::Failed`
//! carrying a safe fallback value.

mod eyes;
mod face;
mod mouth;
mod multi_face;
mod objects;
mod outcome;
mod set;
mod settings;

#[cfg(test)]
mod testing;

pub use eyes::{EyeReading, EyeTracker, GazeDirection, LEFT_EYE, NOSE_TIP, RIGHT_EYE};
pub use face::FaceDetector;
pub use mouth::{MouthMonitor, MOUTH_OPEN_THRESHOLD, MOUTH_WIDTH_THRESHOLD};
pub use multi_face::{MultiFaceDetector, HIGH_CONFIDENCE};
pub use objects::{LabeledObject, ObjectDetector, ObjectReport};
pub use outcome::DetectorOutcome;
pub use set::{DetectorProviders, DetectorSet, FrameEvaluation, FrameJudgment};
pub use settings::{
    DetectionSettings, EyeSettings, FaceSettings, MouthSettings, MultiFaceSettings,
    ObjectSettings,
};

use proctor_events::AlertSinkRef;

/// Capability shared by every detector: report alerts to a sink.
pub trait Observable {
    fn attach_alert_sink(&mut self, sink: AlertSinkRef);
}
