//! Session orchestrator: owns every component for one exam sitting.

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use proctor_alerts::{AlertLogger, AlertVoice, CooldownGate, SpeechEngine};
use proctor_audio::ChunkSource;
use proctor_capture::{
    FrameWriterFactory, RecordingSummary, ScreenGrabber, ScreenRecorder, VideoRecorder,
    ViolationCapturer,
};
use proctor_detect::{DetectorProviders, DetectorSet, FrameEvaluation, FrameJudgment, Observable};
use proctor_events::{AlertKind, AlertSink, StopToken};
use proctor_storage::JsonLedger;
use proctor_stt::Transcriber;
use proctor_vad::EnergyZcrVad;
use proctor_violations::{CaptureArtifact, SessionClock, ViolationRecord, ViolationRepository};
use proctor_vision::{Frame, FrameSource};
use serde::Serialize;

use crate::audio_monitor::{AudioMonitor, AudioOutputs, AudioSummary, AudioWorker, KeywordScreen};
use crate::{
    arbitrate, render_overlay, ProctorConfig, SessionResult, THREAD_JOIN_TIMEOUT,
    VOICE_SHUTDOWN_TIMEOUT,
};

/// Resource that failed while the session kept running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Webcam,
    Screen,
    Audio,
    Capture,
    Ledger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceFailure {
    pub resource: Resource,
    pub message: String,
}

/// What happened to one frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub judgment: FrameJudgment,
    /// Highest-priority violation on this frame, if any.
    pub violation: Option<AlertKind>,
    /// Whether `violation` was acted on (false while its kind cools down).
    pub handled: bool,
    pub capture: Option<CaptureArtifact>,
    pub detector_failures: Vec<(AlertKind, String)>,
    pub resource_failures: Vec<ResourceFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub frames_processed: u64,
    pub webcam: Option<RecordingSummary>,
    pub screen: Option<RecordingSummary>,
    pub audio: Option<AudioSummary>,
    pub violations: usize,
    /// Voice tasks still running after the shutdown budget.
    pub unfinished_voice_tasks: usize,
    pub failures: Vec<ResourceFailure>,
}

pub struct ProctorSession {
    config: ProctorConfig,
    detectors: DetectorSet,
    logger: Arc<AlertLogger>,
    voice: Arc<AlertVoice>,
    violation_gate: CooldownGate,
    capturer: ViolationCapturer,
    ledger: Arc<JsonLedger>,
    clock: Arc<SessionClock>,
    webcam: VideoRecorder,
    /// Webcam recording closed early after a write failure.
    finished_webcam: Option<RecordingSummary>,
    screen: ScreenRecorder,
    audio: Option<AudioMonitor>,
    transcriber: Option<Arc<dyn Transcriber>>,
    frames_processed: u64,
    failures: Vec<ResourceFailure>,
}

impl ProctorSession {
    pub fn new(
        config: ProctorConfig,
        providers: DetectorProviders,
        speech: Arc<dyn SpeechEngine>,
        writers: Arc<dyn FrameWriterFactory>,
    ) -> SessionResult<Self> {
        config.validate()?;

        let logging = &config.logging;
        let logger = Arc::new(AlertLogger::new(&logging.log_path, logging.alert_cooldown())?);
        let voice = Arc::new(AlertVoice::new(speech, logging.voice_cooldown()));

        let output = &config.global.output_path;
        let ledger = Arc::new(JsonLedger::open(output)?);
        let capturer = ViolationCapturer::new(output)?;

        let mut detectors = DetectorSet::new(&providers, &config.detection.settings());
        detectors.attach_alert_sink(logger.clone());

        let recordings = &config.video.recording_path;
        let webcam = VideoRecorder::new(recordings, config.video.fps, writers.clone())?;
        let screen = ScreenRecorder::new(recordings, config.screen.fps, writers)?;
        let violation_gate = CooldownGate::new(logging.alert_cooldown());

        tracing::info!(
            output = %output.display(),
            alert_log = %logger.path().display(),
            "Proctoring session ready"
        );
        Ok(Self {
            config,
            detectors,
            logger,
            voice,
            violation_gate,
            capturer,
            ledger,
            clock: Arc::new(SessionClock::new()),
            webcam,
            finished_webcam: None,
            screen,
            audio: None,
            transcriber: None,
            frames_processed: 0,
            failures: Vec::new(),
        })
    }

    /// Transcriber used for keyword screening when it is enabled.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<JsonLedger> {
        &self.ledger
    }

    pub fn alert_log_path(&self) -> &Path {
        self.logger.path()
    }

    pub fn capture_dir(&self) -> &Path {
        self.capturer.dir()
    }

    /// Start recorders and the audio monitor.
    ///
    /// Each resource fails independently; failures are returned and kept for
    /// the summary, and detection can proceed regardless.
    pub fn start(
        &mut self,
        audio_source: Option<Box<dyn ChunkSource>>,
        screen_grabber: Option<Box<dyn ScreenGrabber>>,
    ) -> Vec<ResourceFailure> {
        let mut failures = Vec::new();
        let now = Instant::now();

        let [width, height] = self.config.video.resolution;
        if let Err(e) = self.webcam.start(width, height) {
            failures.push(self.resource_failure(Resource::Webcam, e, now));
        }

        if self.config.screen.recording {
            let started = match screen_grabber {
                Some(grabber) => self.screen.start(grabber).map(|_| ()).map_err(|e| e.to_string()),
                None => Err("screen recording enabled but no grabber was provided".to_string()),
            };
            if let Err(e) = started {
                failures.push(self.resource_failure(Resource::Screen, e, now));
            }
        }

        if self.config.detection.audio_monitoring.enabled {
            let started = match audio_source {
                Some(source) => self.start_audio(source),
                None => Err("audio monitoring enabled but no audio source was provided".to_string()),
            };
            if let Err(e) = started {
                failures.push(self.resource_failure(Resource::Audio, e, now));
            }
        }

        failures
    }

    fn start_audio(&mut self, source: Box<dyn ChunkSource>) -> Result<(), String> {
        let settings = &self.config.detection.audio_monitoring;
        if source.sample_rate() != settings.sample_rate {
            tracing::warn!(
                source_rate = source.sample_rate(),
                configured = settings.sample_rate,
                "Audio source rate differs from configuration"
            );
        }

        let vad = EnergyZcrVad::new(settings.energy_threshold, settings.zcr_threshold)
            .map_err(|e| e.to_string())?;
        let screen = match (&self.transcriber, settings.keyword_screening) {
            (Some(transcriber), true) => {
                Some(KeywordScreen::new(transcriber.clone(), &settings.keywords))
            }
            (None, true) => {
                tracing::warn!("Keyword screening enabled without a transcriber; skipping");
                None
            }
            _ => None,
        };

        let outputs = AudioOutputs {
            sink: self.logger.clone(),
            voice: self.voice.clone(),
            ledger: self.ledger.clone(),
            clock: self.clock.clone(),
        };
        let worker = AudioWorker::new(Box::new(vad), settings.ring_chunks, outputs, screen);
        let monitor = AudioMonitor::spawn(source, worker).map_err(|e| e.to_string())?;
        self.audio = Some(monitor);
        Ok(())
    }

    pub fn process_frame(&mut self, frame: &mut Frame) -> FrameReport {
        self.process_frame_at(frame, Instant::now())
    }

    /// Detect, arbitrate, act on the chosen violation, draw the overlay and
    /// record the frame. Failures the background threads hit since the last
    /// frame are reported here too.
    pub fn process_frame_at(&mut self, frame: &mut Frame, now: Instant) -> FrameReport {
        let evaluation = self.detectors.evaluate(frame, now);
        let violation = arbitrate(&evaluation.judgment);

        let mut report = FrameReport {
            judgment: evaluation.judgment.clone(),
            violation,
            handled: false,
            capture: None,
            detector_failures: evaluation.failures.clone(),
            resource_failures: Vec::new(),
        };
        self.collect_background_failures(now, &mut report);

        if let Some(kind) = violation {
            self.handle_violation(kind, frame, &evaluation, now, &mut report);
        }

        render_overlay(frame, &evaluation.judgment, &evaluation.objects);

        if self.webcam.is_recording() {
            if let Err(e) = self.webcam.record_frame(frame) {
                let failure = self.resource_failure(Resource::Webcam, e, now);
                report.resource_failures.push(failure);
                self.finished_webcam = self.webcam.stop();
            }
        }

        self.frames_processed += 1;
        report
    }

    fn collect_background_failures(&mut self, now: Instant, report: &mut FrameReport) {
        if let Some(e) = self.screen.poll_failure() {
            let failure = self.resource_failure(Resource::Screen, e, now);
            report.resource_failures.push(failure);
        }
        if let Some(e) = self.audio.as_ref().and_then(AudioMonitor::poll_failure) {
            let failure = self.resource_failure(Resource::Audio, e, now);
            report.resource_failures.push(failure);
        }
    }

    fn handle_violation(
        &mut self,
        kind: AlertKind,
        frame: &Frame,
        evaluation: &FrameEvaluation,
        now: Instant,
        report: &mut FrameReport,
    ) {
        if !self.violation_gate.allow(kind, now) {
            return;
        }
        report.handled = true;

        let timestamp = self.clock.next_stamp();
        tracing::info!(%kind, timestamp = %timestamp, "Handling violation");
        self.voice.speak(kind, now);

        let highlights: Vec<_> = match kind {
            AlertKind::ObjectDetected => evaluation.objects.iter().map(|o| o.bbox).collect(),
            _ => Vec::new(),
        };
        match self.capturer.capture(frame, kind, &timestamp, &highlights) {
            Ok(artifact) => report.capture = Some(artifact),
            Err(e) => {
                let failure = self.resource_failure(Resource::Capture, e, now);
                report.resource_failures.push(failure);
            }
        }

        let mut record = ViolationRecord::new(kind, timestamp);
        if let Ok(judgment) = serde_json::to_value(&evaluation.judgment) {
            record = record.with_metadata("frame", judgment);
        }
        if kind == AlertKind::FaceDisappeared {
            if let Some(absence) = self.detectors.face.absent_for(now) {
                record = record.with_metadata(
                    "duration",
                    format!("{:.1} seconds", absence.as_secs_f64()),
                );
            }
        }
        if kind == AlertKind::ObjectDetected {
            let labels: Vec<_> = evaluation.objects.iter().map(|o| o.label.clone()).collect();
            record = record.with_metadata("objects", labels);
        }
        if let Some(capture) = &report.capture {
            record = record.with_metadata(
                "image_path",
                capture.image_path.to_string_lossy().into_owned(),
            );
        }

        if let Err(e) = self.ledger.record(record) {
            let failure = self.resource_failure(Resource::Ledger, e, now);
            report.resource_failures.push(failure);
        }
    }

    /// Pull frames until the source closes or `stop` is cancelled.
    ///
    /// Returns the number of frames processed by this call.
    pub fn run(&mut self, source: &mut dyn FrameSource, stop: &StopToken) -> SessionResult<u64> {
        let mut frames = 0;
        while !stop.is_cancelled() {
            let Some(mut frame) = source.next_frame()? else {
                tracing::info!(frames, "Frame source closed");
                break;
            };
            self.process_frame(&mut frame);
            frames += 1;
        }
        Ok(frames)
    }

    /// Stop background work and close every recorder.
    ///
    /// Failures that surface while shutting down are added to the summary.
    pub fn stop(&mut self) -> SessionSummary {
        let now = Instant::now();
        let mut audio = None;
        if let Some(mut monitor) = self.audio.take() {
            audio = Some(monitor.stop(THREAD_JOIN_TIMEOUT));
            if let Some(e) = monitor.poll_failure() {
                self.resource_failure(Resource::Audio, e, now);
            }
        }

        let screen = self.screen.stop(THREAD_JOIN_TIMEOUT);
        self.report_recording_error(Resource::Screen, screen.as_ref(), now);
        let webcam = self.webcam.stop().or_else(|| self.finished_webcam.take());
        self.report_recording_error(Resource::Webcam, webcam.as_ref(), now);

        let unfinished_voice_tasks = self.voice.shutdown(VOICE_SHUTDOWN_TIMEOUT);

        let summary = SessionSummary {
            frames_processed: self.frames_processed,
            webcam,
            screen,
            audio,
            violations: self.ledger.len(),
            unfinished_voice_tasks,
            failures: self.failures.clone(),
        };
        tracing::info!(
            frames = summary.frames_processed,
            violations = summary.violations,
            failures = summary.failures.len(),
            "Proctoring session stopped"
        );
        summary
    }

    /// Report a recording's error unless the frame loop already did.
    fn report_recording_error(
        &mut self,
        resource: Resource,
        summary: Option<&RecordingSummary>,
        now: Instant,
    ) {
        let Some(error) = summary.and_then(|s| s.error.as_deref()) else {
            return;
        };
        let reported = self
            .failures
            .iter()
            .any(|f| f.resource == resource && f.message == error);
        if !reported {
            self.resource_failure(resource, error, now);
        }
    }

    fn resource_failure(
        &mut self,
        resource: Resource,
        error: impl Display,
        now: Instant,
    ) -> ResourceFailure {
        let failure = ResourceFailure {
            resource,
            message: error.to_string(),
        };
        tracing::error!(?resource, error = %failure.message, "Resource failed");
        if matches!(resource, Resource::Webcam | Resource::Screen | Resource::Audio) {
            self.logger
                .raise(AlertKind::RecorderError, &failure.message, now);
        }
        self.failures.push(failure.clone());
        failure
    }
}
