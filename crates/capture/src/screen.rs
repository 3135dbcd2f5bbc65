use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use proctor_events::{join_with_timeout, StopToken};
use proctor_vision::Frame;

use crate::{recording_name, CaptureError, FrameWriter, FrameWriterFactory, RecordingSummary, Result};

/// Longest single sleep between stop-token checks.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Source of desktop frames. Implementations pick the monitor.
pub trait ScreenGrabber: Send {
    /// Size of every frame `grab` returns.
    fn size(&self) -> (u32, u32);

    fn grab(&mut self) -> Result<Frame>;
}

struct Worker {
    stop: StopToken,
    handle: JoinHandle<()>,
    path: PathBuf,
    frames: Arc<AtomicU64>,
    failure: Receiver<CaptureError>,
    /// Message of a failure already handed out by `poll_failure`.
    error: Option<String>,
}

/// Background desktop recorder running at a fixed frame rate.
pub struct ScreenRecorder {
    dir: PathBuf,
    fps: f64,
    factory: Arc<dyn FrameWriterFactory>,
    worker: Option<Worker>,
}

impl ScreenRecorder {
    pub fn new(dir: &Path, fps: f64, factory: Arc<dyn FrameWriterFactory>) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CaptureError::InvalidFps(fps));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            fps,
            factory,
            worker: None,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Open `screen_<timestamp>` and spawn the capture thread.
    ///
    /// The output file is created before returning, so open failures are
    /// reported here rather than from the thread.
    pub fn start(&mut self, mut grabber: Box<dyn ScreenGrabber>) -> Result<PathBuf> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(recording_name("screen", self.factory.extension()));
        let (width, height) = grabber.size();
        let mut writer = self.factory.create(&path, width, height, self.fps)?;

        let stop = StopToken::new();
        let frames = Arc::new(AtomicU64::new(0));
        let (failed, failure) = crossbeam_channel::bounded(1);
        let interval = Duration::from_secs_f64(1.0 / self.fps);

        let handle = {
            let stop = stop.clone();
            let frames = frames.clone();
            thread::Builder::new()
                .name("screen-recorder".into())
                .spawn(move || {
                    let mut outcome =
                        capture_loop(grabber.as_mut(), writer.as_mut(), interval, &stop, &frames);
                    if let Err(e) = writer.finish() {
                        tracing::error!(error = %e, "Failed to finalize screen recording");
                        outcome = outcome.and(Err(e));
                    }
                    if let Err(e) = outcome {
                        let _ = failed.try_send(e);
                    }
                })?
        };

        tracing::info!(path = %path.display(), fps = self.fps, "Started screen recording");
        self.worker = Some(Worker {
            stop,
            handle,
            path: path.clone(),
            frames,
            failure,
            error: None,
        });
        Ok(path)
    }

    /// Error that ended the capture thread, if one arrived since the last call.
    ///
    /// The recording stays open until `stop`, whose summary repeats the error.
    pub fn poll_failure(&mut self) -> Option<CaptureError> {
        let worker = self.worker.as_mut()?;
        let e = worker.failure.try_recv().ok()?;
        worker.error = Some(e.to_string());
        Some(e)
    }

    /// Signal the thread, wait up to `timeout`, and summarize.
    ///
    /// Duration is derived from the nominal rate (`frame_count / fps`).
    pub fn stop(&mut self, timeout: Duration) -> Option<RecordingSummary> {
        let worker = self.worker.take()?;
        worker.stop.cancel();
        join_with_timeout(worker.handle, timeout, "screen-recorder");
        let error = worker
            .error
            .or_else(|| worker.failure.try_recv().ok().map(|e| e.to_string()));

        let frame_count = worker.frames.load(Ordering::SeqCst);
        let duration_secs = frame_count as f64 / self.fps;
        tracing::info!(
            path = %worker.path.display(),
            frame_count,
            duration_secs,
            error = error.as_deref(),
            "Stopped screen recording"
        );
        Some(RecordingSummary {
            path: worker.path,
            frame_count,
            duration_secs,
            fps: self.fps,
            error,
        })
    }
}

impl Drop for ScreenRecorder {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.stop.cancel();
        }
    }
}

fn capture_loop(
    grabber: &mut dyn ScreenGrabber,
    writer: &mut dyn FrameWriter,
    interval: Duration,
    stop: &StopToken,
    frames: &AtomicU64,
) -> Result<()> {
    while !stop.is_cancelled() {
        let started = Instant::now();
        let result = grabber.grab().and_then(|frame| writer.write_frame(&frame));
        if let Err(e) = result {
            tracing::error!(error = %e, "Screen recording failed; stopping recorder");
            return Err(e);
        }
        frames.fetch_add(1, Ordering::SeqCst);

        let deadline = started + interval;
        while !stop.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(STOP_POLL));
        }
    }
    Ok(())
}
