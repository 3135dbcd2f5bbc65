use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use proctor_events::AlertKind;
use proctor_vision::{draw_rect, fill_rect, BoundingBox, Frame, RED, WHITE};
use proctor_violations::CaptureArtifact;

use crate::Result;

/// Subdirectory of the session output that holds violation stills.
pub const CAPTURE_DIR: &str = "violation_captures";

const BANNER_HEIGHT: u32 = 28;

/// Saves one annotated JPEG per confirmed violation.
pub struct ViolationCapturer {
    dir: PathBuf,
}

impl ViolationCapturer {
    pub fn new(output_dir: &Path) -> Result<Self> {
        let dir = output_dir.join(CAPTURE_DIR);
        fs::create_dir_all(&dir)?;
        // Artifacts carry absolute paths.
        let dir = fs::canonicalize(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<KIND>_<timestamp>.jpg` with a red banner and a red box around
    /// each entry of `highlights`. The input frame is left untouched.
    pub fn capture(
        &self,
        frame: &Frame,
        kind: AlertKind,
        timestamp: &str,
        highlights: &[BoundingBox],
    ) -> Result<CaptureArtifact> {
        let mut annotated = frame.clone();
        let banner = BANNER_HEIGHT.min(annotated.height());
        let width = annotated.width();
        fill_rect(&mut annotated, 0, 0, width, banner, RED);
        fill_rect(
            &mut annotated,
            0,
            banner.saturating_sub(2),
            width,
            2,
            WHITE,
        );
        for bbox in highlights {
            draw_rect(&mut annotated, bbox, RED, 2);
        }

        let path = self.dir.join(format!("{kind}_{timestamp}.jpg"));
        annotated
            .to_rgb_image()
            .save_with_format(&path, ImageFormat::Jpeg)?;

        tracing::info!(%kind, path = %path.display(), "Saved violation capture");
        Ok(CaptureArtifact {
            kind,
            timestamp: timestamp.to_string(),
            image_path: path,
        })
    }
}
