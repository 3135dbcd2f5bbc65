//! Shared alert contracts for every proctoring component.
//!
//! This crate defines the closed set of alert kinds that detectors, the audio
//! monitor and the session orchestrator raise, and the `AlertSink` capability
//! they raise them through. Using one enum everywhere keeps the text log, the
//! voice catalogue and the violation ledger keyed identically.
//!
//! Also provides the `StopToken` / `join_with_timeout` pair used by every
//! background thread in the workspace.

mod lifecycle;
mod sink;

pub use lifecycle::{join_with_timeout, StopToken};
pub use sink::{AlertSink, AlertSinkRef, InMemoryAlertSink, NullAlertSink, RaisedAlert};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every alert or violation category the pipeline can produce.
///
/// Serialized in `SCREAMING_SNAKE_CASE` (`FACE_DISAPPEARED`, ...), which is
/// also the spelling used in the alert log and the violation ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Face absent for longer than the absence window.
    FaceDisappeared,
    /// Face back after a long absence.
    FaceReappeared,
    /// Two or more high-confidence faces for consecutive frames.
    MultipleFaces,
    /// Allow-listed forbidden object in view.
    ObjectDetected,
    /// Sustained mouth movement (debounced talking heuristic).
    MouthMovement,
    /// Per-frame mouth-moving violation chosen by arbitration.
    MouthMoving,
    /// Rapid back-and-forth gaze changes.
    EyeMovement,
    /// Voice activity on the microphone.
    VoiceDetected,
    /// Transcript contained a disallowed keyword.
    SpeechViolation,

    // Diagnostics
    FaceDetectionError,
    EyeTrackingError,
    MouthTrackingError,
    MultiFaceDetectionError,
    ObjectDetectionError,
    TranscriptionError,
    RecorderError,
}

impl AlertKind {
    pub const ALL: [AlertKind; 16] = [
        AlertKind::FaceDisappeared,
        AlertKind::FaceReappeared,
        AlertKind::MultipleFaces,
        AlertKind::ObjectDetected,
        AlertKind::MouthMovement,
        AlertKind::MouthMoving,
        AlertKind::EyeMovement,
        AlertKind::VoiceDetected,
        AlertKind::SpeechViolation,
        AlertKind::FaceDetectionError,
        AlertKind::EyeTrackingError,
        AlertKind::MouthTrackingError,
        AlertKind::MultiFaceDetectionError,
        AlertKind::ObjectDetectionError,
        AlertKind::TranscriptionError,
        AlertKind::RecorderError,
    ];

    /// Stable wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::FaceDisappeared => "FACE_DISAPPEARED",
            AlertKind::FaceReappeared => "FACE_REAPPEARED",
            AlertKind::MultipleFaces => "MULTIPLE_FACES",
            AlertKind::ObjectDetected => "OBJECT_DETECTED",
            AlertKind::MouthMovement => "MOUTH_MOVEMENT",
            AlertKind::MouthMoving => "MOUTH_MOVING",
            AlertKind::EyeMovement => "EYE_MOVEMENT",
            AlertKind::VoiceDetected => "VOICE_DETECTED",
            AlertKind::SpeechViolation => "SPEECH_VIOLATION",
            AlertKind::FaceDetectionError => "FACE_DETECTION_ERROR",
            AlertKind::EyeTrackingError => "EYE_TRACKING_ERROR",
            AlertKind::MouthTrackingError => "MOUTH_TRACKING_ERROR",
            AlertKind::MultiFaceDetectionError => "MULTI_FACE_DETECTION_ERROR",
            AlertKind::ObjectDetectionError => "OBJECT_DETECTION_ERROR",
            AlertKind::TranscriptionError => "TRANSCRIPTION_ERROR",
            AlertKind::RecorderError => "RECORDER_ERROR",
        }
    }

    /// Diagnostic kinds report a failing component, not a candidate's behavior.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            AlertKind::FaceDetectionError
                | AlertKind::EyeTrackingError
                | AlertKind::MouthTrackingError
                | AlertKind::MultiFaceDetectionError
                | AlertKind::ObjectDetectionError
                | AlertKind::TranscriptionError
                | AlertKind::RecorderError
        )
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
