use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use proctor_vision::Frame;

use crate::{recording_name, CaptureError, FrameWriter, FrameWriterFactory, RecordingSummary, Result};

struct ActiveRecording {
    writer: Box<dyn FrameWriter>,
    path: PathBuf,
    frame_count: u64,
    started: Instant,
    error: Option<String>,
}

/// Continuous webcam recording fed by the frame loop.
///
/// Frames are written synchronously by the caller; there is no recorder thread.
pub struct VideoRecorder {
    dir: PathBuf,
    fps: f64,
    factory: Arc<dyn FrameWriterFactory>,
    active: Option<ActiveRecording>,
}

impl VideoRecorder {
    pub fn new(dir: &Path, fps: f64, factory: Arc<dyn FrameWriterFactory>) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CaptureError::InvalidFps(fps));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            fps,
            factory,
            active: None,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Open `webcam_<timestamp>` for frames of `width`x`height`.
    pub fn start(&mut self, width: u32, height: u32) -> Result<PathBuf> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(recording_name("webcam", self.factory.extension()));
        let writer = self.factory.create(&path, width, height, self.fps)?;

        tracing::info!(path = %path.display(), width, height, fps = self.fps, "Started webcam recording");
        self.active = Some(ActiveRecording {
            writer,
            path: path.clone(),
            frame_count: 0,
            started: Instant::now(),
            error: None,
        });
        Ok(path)
    }

    /// Append one frame. A write error is also kept for the summary.
    pub fn record_frame(&mut self, frame: &Frame) -> Result<()> {
        let active = self.active.as_mut().ok_or(CaptureError::NotRecording)?;
        if let Err(e) = active.writer.write_frame(frame) {
            active.error.get_or_insert_with(|| e.to_string());
            return Err(e);
        }
        active.frame_count += 1;
        Ok(())
    }

    /// Close the file and summarize. `None` when nothing was recording.
    ///
    /// The summary is returned even when writing or closing failed; the first
    /// error is carried in `error`.
    pub fn stop(&mut self) -> Option<RecordingSummary> {
        let mut active = self.active.take()?;
        if let Err(e) = active.writer.finish() {
            tracing::warn!(path = %active.path.display(), error = %e, "Failed to close webcam recording");
            active.error.get_or_insert_with(|| e.to_string());
        }

        let duration_secs = active.started.elapsed().as_secs_f64();
        let fps = if duration_secs > 0.0 {
            active.frame_count as f64 / duration_secs
        } else {
            0.0
        };

        tracing::info!(
            path = %active.path.display(),
            frame_count = active.frame_count,
            duration_secs,
            error = active.error.as_deref(),
            "Stopped webcam recording"
        );
        Some(RecordingSummary {
            path: active.path,
            frame_count: active.frame_count,
            duration_secs,
            fps,
            error: active.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MjpegWriterFactory;
    use proctor_vision::PixelFormat;
    use tempfile::tempdir;

    fn recorder(dir: &Path) -> VideoRecorder {
        VideoRecorder::new(dir, 20.0, Arc::new(MjpegWriterFactory)).unwrap()
    }

    #[test]
    fn test_start_record_stop() {
        let dir = tempdir().unwrap();
        let mut recorder = recorder(&dir.path().join("recordings"));

        let path = recorder.start(16, 16).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("webcam_") && name.ends_with(".mjpeg"), "{name}");

        for _ in 0..3 {
            recorder
                .record_frame(&Frame::blank(16, 16, PixelFormat::Bgr))
                .unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(5));

        let summary = recorder.stop().unwrap();
        assert_eq!(summary.path, path);
        assert!(summary.error.is_none());
        assert_eq!(summary.frame_count, 3);
        assert!(summary.duration_secs > 0.0);
        assert!((summary.fps - 3.0 / summary.duration_secs).abs() < 1e-9);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_lifecycle_errors() {
        let dir = tempdir().unwrap();
        let mut recorder = recorder(dir.path());

        assert!(matches!(
            recorder.record_frame(&Frame::blank(4, 4, PixelFormat::Bgr)),
            Err(CaptureError::NotRecording)
        ));
        assert!(recorder.stop().is_none());

        recorder.start(4, 4).unwrap();
        assert!(matches!(recorder.start(4, 4), Err(CaptureError::AlreadyRecording)));
    }

    #[test]
    fn test_write_failure_keeps_partial_summary() {
        let dir = tempdir().unwrap();
        let mut recorder = recorder(dir.path());
        let path = recorder.start(8, 8).unwrap();

        recorder
            .record_frame(&Frame::blank(8, 8, PixelFormat::Bgr))
            .unwrap();
        let err = recorder
            .record_frame(&Frame::blank(4, 4, PixelFormat::Bgr))
            .unwrap_err();
        assert!(matches!(err, CaptureError::FrameSize { .. }));

        let summary = recorder.stop().unwrap();
        assert_eq!(summary.path, path);
        assert_eq!(summary.frame_count, 1);
        assert_eq!(summary.error, Some(err.to_string()));
        assert!(path.exists());
        assert!(!recorder.is_recording());
    }

    #[test]
    fn test_zero_fps_rejected() {
        let dir = tempdir().unwrap();
        assert!(VideoRecorder::new(dir.path(), 0.0, Arc::new(MjpegWriterFactory)).is_err());
    }
}
