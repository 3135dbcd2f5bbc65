//! Status overlay drawn on each frame before it is recorded.
//!
//! No font rasterizer is linked, so each line is drawn as a color swatch; the
//! line text is kept for logs and tests.

use proctor_detect::{FrameJudgment, GazeDirection, LabeledObject};
use proctor_vision::{draw_rect, fill_rect, Frame, Rgb, GREEN, RED, WHITE, YELLOW};

use crate::EYES_OPEN_RATIO;

const MARGIN: u32 = 10;
const LINE_HEIGHT: u32 = 30;
const SWATCH: u32 = 20;
const CLOCK_WIDTH: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLine {
    pub text: String,
    pub color: Rgb,
}

impl OverlayLine {
    fn new(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Status lines first, then red alert lines.
pub fn overlay_lines(judgment: &FrameJudgment) -> Vec<OverlayLine> {
    let eyes_open = judgment.eye_ratio > EYES_OPEN_RATIO;
    let mut lines = vec![
        OverlayLine::new(
            format!("Face: {}", if judgment.face_present { "Present" } else { "Absent" }),
            if judgment.face_present { GREEN } else { RED },
        ),
        OverlayLine::new(
            format!("Gaze: {}", judgment.gaze_direction),
            if judgment.gaze_direction == GazeDirection::Center {
                GREEN
            } else {
                YELLOW
            },
        ),
        OverlayLine::new(
            format!("Eyes: {}", if eyes_open { "Open" } else { "Closed" }),
            if eyes_open { GREEN } else { YELLOW },
        ),
        OverlayLine::new(
            format!("Mouth: {}", if judgment.mouth_moving { "Moving" } else { "Still" }),
            if judgment.mouth_moving { YELLOW } else { GREEN },
        ),
    ];

    if judgment.multiple_faces {
        lines.push(OverlayLine::new("Multiple Faces Detected!", RED));
    }
    if judgment.objects_detected {
        lines.push(OverlayLine::new("Suspicious Object Detected!", RED));
    }
    lines
}

/// Draw status swatches, object boxes and a clock tick in the top-right.
pub fn render_overlay(frame: &mut Frame, judgment: &FrameJudgment, objects: &[LabeledObject]) {
    for (i, line) in overlay_lines(judgment).iter().enumerate() {
        let y = MARGIN + i as u32 * LINE_HEIGHT;
        fill_rect(frame, MARGIN, y, SWATCH, SWATCH, line.color);
    }

    for object in objects {
        draw_rect(frame, &object.bbox, RED, 2);
    }

    // Seconds hand: a bar whose length follows the judgment timestamp.
    let seconds = judgment
        .timestamp
        .rsplit(':')
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0);
    let x = frame.width().saturating_sub(CLOCK_WIDTH + MARGIN);
    fill_rect(frame, x, MARGIN, CLOCK_WIDTH * seconds / 60 + 1, 4, WHITE);
}
