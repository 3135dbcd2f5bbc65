//! Spoken alerts.
//!
//! Each accepted alert gets its own short-lived thread that synthesizes the
//! catalogue message into a temporary file, plays it and removes the file.
//! Handles are kept so the session can wait for outstanding speech on stop.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use proctor_events::{join_with_timeout, AlertKind};

use crate::{CooldownGate, Result};

/// Text-to-speech backend.
pub trait SpeechEngine: Send + Sync {
    /// Render `text` to an audio file at `out`.
    fn synthesize(&self, text: &str, out: &Path) -> Result<()>;

    /// Play a previously synthesized file to completion.
    fn play(&self, path: &Path) -> Result<()>;
}

/// Spoken message for `kind`, if it is ever voiced.
pub fn message_for(kind: AlertKind) -> Option<&'static str> {
    match kind {
        AlertKind::FaceDisappeared => Some("Please look at the screen"),
        AlertKind::FaceReappeared => Some("Thank you for looking at the screen"),
        AlertKind::MultipleFaces => Some("We detected multiple people"),
        AlertKind::ObjectDetected => Some("Unauthorized object detected"),
        AlertKind::MouthMoving => Some("Please maintain silence during exam"),
        AlertKind::SpeechViolation => Some("Speaking during exam is not allowed"),
        AlertKind::VoiceDetected => {
            Some("We detected voice, please maintain silence during the exam")
        }
        _ => None,
    }
}

pub struct AlertVoice {
    engine: Arc<dyn SpeechEngine>,
    gate: CooldownGate,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AlertVoice {
    pub fn new(engine: Arc<dyn SpeechEngine>, cooldown: Duration) -> Self {
        Self {
            engine,
            gate: CooldownGate::new(cooldown),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Voice the catalogue message for `kind` without blocking the caller.
    ///
    /// Returns false when the kind has no message, is cooling down, or the
    /// speech thread could not be spawned.
    pub fn speak(&self, kind: AlertKind, now: Instant) -> bool {
        let Some(message) = message_for(kind) else {
            return false;
        };
        if !self.gate.allow(kind, now) {
            return false;
        }

        let engine = Arc::clone(&self.engine);
        let spawned = std::thread::Builder::new()
            .name(format!("alert-voice-{}", kind.as_str().to_lowercase()))
            .spawn(move || {
                if let Err(e) = say(engine.as_ref(), message) {
                    tracing::warn!(%kind, error = %e, "failed to voice alert");
                }
            });

        match spawned {
            Ok(handle) => {
                let mut tasks = self.tasks.lock().expect("voice task mutex poisoned");
                tasks.retain(|h| !h.is_finished());
                tasks.push(handle);
                tracing::debug!(%kind, pending = tasks.len(), "voicing alert");
                true
            }
            Err(e) => {
                tracing::error!(%kind, error = %e, "failed to spawn voice thread");
                false
            }
        }
    }

    /// Number of speech threads still running.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("voice task mutex poisoned");
        tasks.retain(|h| !h.is_finished());
        tasks.len()
    }

    /// Wait for outstanding speech, sharing `timeout` across all tasks.
    ///
    /// Returns the number of tasks that did not finish in time.
    pub fn shutdown(&self, timeout: Duration) -> usize {
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .expect("voice task mutex poisoned")
            .drain(..)
            .collect();

        let deadline = Instant::now() + timeout;
        tasks
            .into_iter()
            .map(|handle| {
                let remaining = deadline.saturating_duration_since(Instant::now());
                join_with_timeout(handle, remaining, "alert-voice")
            })
            .filter(|joined| !joined)
            .count()
    }
}

fn say(engine: &dyn SpeechEngine, message: &str) -> Result<()> {
    let file = tempfile::Builder::new()
        .prefix("proctor-alert-")
        .suffix(".wav")
        .tempfile()?;

    engine.synthesize(message, file.path())?;
    engine.play(file.path())?;
    // Dropping `file` removes it.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlertError;
    use std::path::PathBuf;

    #[derive(Default)]
    struct RecordingEngine {
        spoken: Mutex<Vec<String>>,
        played: Mutex<Vec<PathBuf>>,
        fail_synthesis: bool,
        play_delay: Duration,
    }

    impl SpeechEngine for RecordingEngine {
        fn synthesize(&self, text: &str, out: &Path) -> Result<()> {
            if self.fail_synthesis {
                return Err(AlertError::Synthesis("engine offline".into()));
            }
            std::fs::write(out, text.as_bytes())?;
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn play(&self, path: &Path) -> Result<()> {
            assert!(path.exists());
            std::thread::sleep(self.play_delay);
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn test_catalogue() {
        assert_eq!(
            message_for(AlertKind::MultipleFaces),
            Some("We detected multiple people")
        );
        assert_eq!(message_for(AlertKind::EyeMovement), None);
        assert_eq!(message_for(AlertKind::MouthMovement), None);
        assert!(AlertKind::ALL
            .iter()
            .filter(|k| k.is_diagnostic())
            .all(|k| message_for(*k).is_none()));
    }

    #[test]
    fn test_speak_synthesizes_plays_and_cleans_up() {
        let engine = Arc::new(RecordingEngine::default());
        let voice = AlertVoice::new(engine.clone(), Duration::from_secs(10));

        assert!(voice.speak(AlertKind::ObjectDetected, Instant::now()));
        assert_eq!(voice.shutdown(Duration::from_secs(5)), 0);

        assert_eq!(
            engine.spoken.lock().unwrap().as_slice(),
            ["Unauthorized object detected"]
        );
        let played = engine.played.lock().unwrap();
        assert_eq!(played.len(), 1);
        assert!(!played[0].exists());
    }

    #[test]
    fn test_unvoiced_kind_is_skipped() {
        let engine = Arc::new(RecordingEngine::default());
        let voice = AlertVoice::new(engine.clone(), Duration::from_secs(10));

        assert!(!voice.speak(AlertKind::EyeMovement, Instant::now()));
        assert_eq!(voice.pending(), 0);
    }

    #[test]
    fn test_voice_cooldown() {
        let engine = Arc::new(RecordingEngine::default());
        let voice = AlertVoice::new(engine.clone(), Duration::from_secs(10));
        let t1 = Instant::now();

        assert!(voice.speak(AlertKind::VoiceDetected, t1));
        assert!(!voice.speak(AlertKind::VoiceDetected, t1 + Duration::from_secs(1)));
        assert!(voice.speak(AlertKind::FaceDisappeared, t1 + Duration::from_secs(1)));
        voice.shutdown(Duration::from_secs(5));

        assert_eq!(engine.spoken.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_synthesis_failure_is_contained() {
        let engine = Arc::new(RecordingEngine {
            fail_synthesis: true,
            ..Default::default()
        });
        let voice = AlertVoice::new(engine.clone(), Duration::from_secs(10));

        assert!(voice.speak(AlertKind::MultipleFaces, Instant::now()));
        assert_eq!(voice.shutdown(Duration::from_secs(5)), 0);
        assert!(engine.played.lock().unwrap().is_empty());
    }

    #[test]
    fn test_speak_does_not_block() {
        let engine = Arc::new(RecordingEngine {
            play_delay: Duration::from_millis(300),
            ..Default::default()
        });
        let voice = AlertVoice::new(engine, Duration::from_secs(10));

        let started = Instant::now();
        assert!(voice.speak(AlertKind::SpeechViolation, started));
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(voice.pending(), 1);

        assert_eq!(voice.shutdown(Duration::from_secs(5)), 0);
        assert_eq!(voice.pending(), 0);
    }
}
