use proctor_detect::FrameJudgment;
use proctor_events::AlertKind;

/// Pick at most one violation to act on for a frame.
///
/// Priority: face absent, then multiple faces, then a forbidden object, then
/// mouth movement. Lower-priority conditions are still shown on the overlay.
pub fn arbitrate(judgment: &FrameJudgment) -> Option<AlertKind> {
    if !judgment.face_present {
        Some(AlertKind::FaceDisappeared)
    } else if judgment.multiple_faces {
        Some(AlertKind::MultipleFaces)
    } else if judgment.objects_detected {
        Some(AlertKind::ObjectDetected)
    } else if judgment.mouth_moving {
        Some(AlertKind::MouthMoving)
    } else {
        None
    }
}
