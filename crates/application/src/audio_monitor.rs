//! Microphone watcher running on its own thread and chunk cadence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use proctor_alerts::AlertVoice;
use proctor_audio::{AudioChunk, AudioError, ChunkRing, ChunkSource};
use proctor_events::{join_with_timeout, AlertKind, AlertSinkRef, StopToken};
use proctor_storage::JsonLedger;
use proctor_stt::{prepare_for_transcription, Transcriber};
use proctor_vad::VoiceActivityDetector;
use proctor_violations::{SessionClock, ViolationRecord, ViolationRepository};
use serde::Serialize;

use crate::{AUDIO_POLL_INTERVAL, VOICE_DETECTED_MESSAGE};

/// Side effects shared with the frame loop.
#[derive(Clone)]
pub struct AudioOutputs {
    pub sink: AlertSinkRef,
    pub voice: Arc<AlertVoice>,
    pub ledger: Arc<JsonLedger>,
    pub clock: Arc<SessionClock>,
}

/// Transcriber plus the lowercase keywords it screens for.
#[derive(Clone)]
pub struct KeywordScreen {
    pub transcriber: Arc<dyn Transcriber>,
    pub keywords: Vec<String>,
}

impl KeywordScreen {
    pub fn new(transcriber: Arc<dyn Transcriber>, keywords: &[String]) -> Self {
        Self {
            transcriber,
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// First keyword contained in the normalized transcript.
    pub fn find_keyword(&self, transcript: &str) -> Option<&str> {
        let text = transcript.trim().to_lowercase();
        self.keywords
            .iter()
            .find(|k| text.contains(k.as_str()))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AudioSummary {
    pub chunks: u64,
    pub voice_chunks: u64,
}

#[derive(Default)]
struct Counters {
    chunks: AtomicU64,
    voice_chunks: AtomicU64,
}

/// Per-chunk processing, owned by the monitor thread.
pub(crate) struct AudioWorker {
    vad: Box<dyn VoiceActivityDetector>,
    ring: ChunkRing,
    outputs: AudioOutputs,
    screen: Option<KeywordScreen>,
}

impl AudioWorker {
    pub(crate) fn new(
        vad: Box<dyn VoiceActivityDetector>,
        ring_chunks: usize,
        outputs: AudioOutputs,
        screen: Option<KeywordScreen>,
    ) -> Self {
        Self {
            vad,
            ring: ChunkRing::new(ring_chunks),
            outputs,
            screen,
        }
    }

    /// Returns whether the chunk was classified as voice.
    pub(crate) fn process_chunk(&mut self, chunk: AudioChunk, now: Instant) -> bool {
        let sample_rate = chunk.sample_rate;
        let analysis = self.vad.detect(&chunk.samples);
        self.ring.push(chunk);
        if !analysis.decision.is_voice() {
            return false;
        }

        tracing::trace!(energy = analysis.energy, zcr = ?analysis.zcr, "voice chunk");
        self.outputs.voice.speak(AlertKind::VoiceDetected, now);
        if self
            .outputs
            .sink
            .raise(AlertKind::VoiceDetected, VOICE_DETECTED_MESSAGE, now)
        {
            self.record(ViolationRecord::new(
                AlertKind::VoiceDetected,
                self.outputs.clock.next_stamp(),
            ));
        }

        if self.screen.is_some() {
            self.screen_speech(sample_rate, now);
        }
        true
    }

    fn screen_speech(&self, sample_rate: u32, now: Instant) {
        let Some(screen) = &self.screen else {
            return;
        };

        let transcript = prepare_for_transcription(&self.ring.samples(), sample_rate)
            .and_then(|audio| screen.transcriber.transcribe(&audio));
        let transcript = match transcript {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Transcription failed");
                self.outputs
                    .sink
                    .raise(AlertKind::TranscriptionError, &e.to_string(), now);
                return;
            }
        };

        let Some(keyword) = screen.find_keyword(&transcript).map(str::to_string) else {
            return;
        };
        tracing::info!(keyword = %keyword, "Disallowed keyword in speech");

        self.outputs.voice.speak(AlertKind::SpeechViolation, now);
        let message = format!("Disallowed keyword '{keyword}' in speech");
        if self
            .outputs
            .sink
            .raise(AlertKind::SpeechViolation, &message, now)
        {
            self.record(
                ViolationRecord::new(AlertKind::SpeechViolation, self.outputs.clock.next_stamp())
                    .with_metadata("transcript", transcript.trim())
                    .with_metadata("keyword", keyword),
            );
        }
    }

    fn record(&self, record: ViolationRecord) {
        let kind = record.kind.clone();
        if let Err(e) = self.outputs.ledger.record(record) {
            tracing::error!(%kind, error = %e, "Failed to record audio violation");
        }
    }
}

/// Handle to the running monitor thread.
pub struct AudioMonitor {
    stop: StopToken,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
    failure: Receiver<AudioError>,
}

impl AudioMonitor {
    pub(crate) fn spawn(
        mut source: Box<dyn ChunkSource>,
        mut worker: AudioWorker,
    ) -> std::io::Result<Self> {
        let stop = StopToken::new();
        let counters = Arc::new(Counters::default());
        let (failed, failure) = crossbeam_channel::bounded(1);

        let handle = {
            let stop = stop.clone();
            let counters = counters.clone();
            thread::Builder::new()
                .name("audio-monitor".into())
                .spawn(move || {
                    tracing::info!(sample_rate = source.sample_rate(), "Audio monitor started");
                    run_loop(source.as_mut(), &mut worker, &stop, &counters, &failed);
                    tracing::info!("Audio monitor stopped");
                })?
        };

        Ok(Self {
            stop,
            handle: Some(handle),
            counters,
            failure,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn summary(&self) -> AudioSummary {
        AudioSummary {
            chunks: self.counters.chunks.load(Ordering::SeqCst),
            voice_chunks: self.counters.voice_chunks.load(Ordering::SeqCst),
        }
    }

    /// Error that ended the thread, if one arrived since the last call.
    ///
    /// A source that reports `Disconnected` ended normally and yields nothing.
    pub fn poll_failure(&self) -> Option<AudioError> {
        self.failure.try_recv().ok()
    }

    /// Signal the thread and wait up to `timeout`.
    pub fn stop(&mut self, timeout: Duration) -> AudioSummary {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            join_with_timeout(handle, timeout, "audio-monitor");
        }
        self.summary()
    }
}

impl Drop for AudioMonitor {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

fn run_loop(
    source: &mut dyn ChunkSource,
    worker: &mut AudioWorker,
    stop: &StopToken,
    counters: &Counters,
    failed: &Sender<AudioError>,
) {
    while !stop.is_cancelled() {
        match source.next_chunk(AUDIO_POLL_INTERVAL) {
            Ok(Some(chunk)) => {
                counters.chunks.fetch_add(1, Ordering::SeqCst);
                if worker.process_chunk(chunk, Instant::now()) {
                    counters.voice_chunks.fetch_add(1, Ordering::SeqCst);
                }
            }
            Ok(None) => {}
            Err(AudioError::Disconnected) => {
                tracing::info!("Audio source closed");
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "Audio source failed; stopping monitor");
                let _ = failed.try_send(e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_alerts::SpeechEngine;
    use proctor_audio::VecChunkSource;
    use proctor_events::InMemoryAlertSink;
    use proctor_stt::SttError;
    use proctor_vad::EnergyZcrVad;
    use std::path::Path;
    use tempfile::tempdir;

    struct SilentEngine;

    impl SpeechEngine for SilentEngine {
        fn synthesize(&self, _text: &str, _out: &Path) -> proctor_alerts::Result<()> {
            Ok(())
        }

        fn play(&self, _path: &Path) -> proctor_alerts::Result<()> {
            Ok(())
        }
    }

    struct FixedTranscriber {
        reply: Result<String, String>,
    }

    impl Transcriber for FixedTranscriber {
        fn transcribe(&self, _audio: &[f32]) -> proctor_stt::Result<String> {
            self.reply.clone().map_err(SttError::TranscriptionFailed)
        }
    }

    /// Low-frequency square wave: loud with few zero crossings.
    fn voiced() -> AudioChunk {
        let samples = (0..512)
            .map(|i| if (i / 64) % 2 == 0 { 8000 } else { -8000 })
            .collect();
        AudioChunk::new(samples, 16000)
    }

    fn silent() -> AudioChunk {
        AudioChunk::new(vec![0; 512], 16000)
    }

    /// Alternating samples: loud but crossing zero every sample.
    fn hiss() -> AudioChunk {
        let samples = (0..512).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect();
        AudioChunk::new(samples, 16000)
    }

    fn fixture(
        screen: Option<KeywordScreen>,
    ) -> (AudioWorker, Arc<InMemoryAlertSink>, Arc<JsonLedger>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let sink = Arc::new(InMemoryAlertSink::new());
        let ledger = Arc::new(JsonLedger::open(dir.path()).unwrap());
        let outputs = AudioOutputs {
            sink: sink.clone(),
            voice: Arc::new(AlertVoice::new(Arc::new(SilentEngine), Duration::from_secs(10))),
            ledger: ledger.clone(),
            clock: Arc::new(SessionClock::new()),
        };
        let vad = Box::new(EnergyZcrVad::new(0.001, 0.35).unwrap());
        (AudioWorker::new(vad, 15, outputs, screen), sink, ledger, dir)
    }

    fn screen(reply: Result<&str, &str>) -> KeywordScreen {
        let transcriber = Arc::new(FixedTranscriber {
            reply: reply.map(str::to_string).map_err(str::to_string),
        });
        KeywordScreen::new(
            transcriber,
            &["Help".to_string(), " answer ".to_string(), String::new()],
        )
    }

    #[test]
    fn test_keyword_match_is_substring_and_case_insensitive() {
        let screen = screen(Ok(""));
        assert_eq!(screen.keywords, vec!["help", "answer"]);
        assert_eq!(screen.find_keyword("  Can you HELP me"), Some("help"));
        assert_eq!(screen.find_keyword("the answers are"), Some("answer"));
        assert_eq!(screen.find_keyword("nothing here"), None);
    }

    #[test]
    fn test_silence_and_noise_are_ignored() {
        let (mut worker, sink, ledger, _dir) = fixture(None);
        let now = Instant::now();

        assert!(!worker.process_chunk(silent(), now));
        assert!(!worker.process_chunk(hiss(), now));
        assert!(sink.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_voice_alerts_and_records() {
        let (mut worker, sink, ledger, _dir) = fixture(None);
        let now = Instant::now();

        assert!(worker.process_chunk(voiced(), now));
        assert_eq!(sink.count(AlertKind::VoiceDetected), 1);
        assert_eq!(sink.alerts()[0].message, VOICE_DETECTED_MESSAGE);

        let records = ledger.all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AlertKind::VoiceDetected);
    }

    #[test]
    fn test_keyword_hit_is_a_speech_violation() {
        let (mut worker, sink, ledger, _dir) = fixture(Some(screen(Ok(" Tell me the ANSWER "))));

        worker.process_chunk(voiced(), Instant::now());

        assert_eq!(sink.count(AlertKind::SpeechViolation), 1);
        let records = ledger.all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].kind, AlertKind::SpeechViolation);
        assert_eq!(records[1].metadata["keyword"], "answer");
        assert_eq!(records[1].metadata["transcript"], "Tell me the ANSWER");
        assert!(records[0].timestamp < records[1].timestamp);
    }

    #[test]
    fn test_transcription_failure_is_diagnostic() {
        let (mut worker, sink, ledger, _dir) = fixture(Some(screen(Err("model crashed"))));

        assert!(worker.process_chunk(voiced(), Instant::now()));
        assert_eq!(sink.count(AlertKind::TranscriptionError), 1);
        assert_eq!(sink.count(AlertKind::SpeechViolation), 0);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_thread_drains_source_and_stops() {
        let (worker, sink, _ledger, _dir) = fixture(None);
        let source = VecChunkSource::new([silent(), voiced(), hiss(), voiced()], 16000);

        let mut monitor = AudioMonitor::spawn(Box::new(source), worker).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while monitor.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let summary = monitor.stop(Duration::from_secs(1));
        assert_eq!(summary, AudioSummary { chunks: 4, voice_chunks: 2 });
        assert_eq!(sink.count(AlertKind::VoiceDetected), 2);

        // A drained source ends normally.
        assert!(monitor.poll_failure().is_none());
    }

    /// Yields `chunks` silent chunks, then fails like an unplugged device.
    struct FailingSource {
        chunks: usize,
    }

    impl ChunkSource for FailingSource {
        fn next_chunk(&mut self, _timeout: Duration) -> proctor_audio::Result<Option<AudioChunk>> {
            if self.chunks == 0 {
                return Err(AudioError::StreamError("device unplugged".into()));
            }
            self.chunks -= 1;
            Ok(Some(silent()))
        }

        fn sample_rate(&self) -> u32 {
            16000
        }
    }

    #[test]
    fn test_source_error_is_reported_once() {
        let (worker, _sink, _ledger, _dir) = fixture(None);

        let mut monitor = AudioMonitor::spawn(Box::new(FailingSource { chunks: 3 }), worker).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while monitor.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let failure = monitor.poll_failure().unwrap();
        assert!(failure.to_string().contains("device unplugged"));
        assert!(monitor.poll_failure().is_none());
        assert_eq!(monitor.stop(Duration::from_secs(1)).chunks, 3);
    }
}
