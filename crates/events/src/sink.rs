//! Alert sink abstraction.
//!
//! Detectors and background monitors hold an `AlertSinkRef` instead of a
//! concrete logger, so their debouncing logic can be tested without touching
//! the filesystem.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::AlertKind;

/// Capability for receiving alerts.
pub trait AlertSink: Send + Sync {
    /// Raise an alert observed at `at`.
    ///
    /// Returns `true` when the sink accepted the alert and `false` when it was
    /// suppressed (for example by a cooldown).
    fn raise(&self, kind: AlertKind, message: &str, at: Instant) -> bool;
}

/// Shared alert sink reference.
pub type AlertSinkRef = Arc<dyn AlertSink>;

/// A captured alert from `InMemoryAlertSink`.
#[derive(Debug, Clone)]
pub struct RaisedAlert {
    pub kind: AlertKind,
    pub message: String,
    pub at: Instant,
}

/// In-memory sink for testing.
///
/// Accepts every alert and keeps it for later inspection.
#[derive(Default)]
pub struct InMemoryAlertSink {
    alerts: Mutex<Vec<RaisedAlert>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured alerts in raise order.
    pub fn alerts(&self) -> Vec<RaisedAlert> {
        self.alerts.lock().expect("alert sink mutex poisoned").clone()
    }

    /// Number of captured alerts of one kind.
    pub fn count(&self, kind: AlertKind) -> usize {
        self.alerts
            .lock()
            .expect("alert sink mutex poisoned")
            .iter()
            .filter(|a| a.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.alerts.lock().expect("alert sink mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().expect("alert sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().expect("alert sink mutex poisoned").is_empty()
    }
}

impl AlertSink for InMemoryAlertSink {
    fn raise(&self, kind: AlertKind, message: &str, at: Instant) -> bool {
        self.alerts
            .lock()
            .expect("alert sink mutex poisoned")
            .push(RaisedAlert {
                kind,
                message: message.to_string(),
                at,
            });
        true
    }
}

/// Sink that discards every alert.
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn raise(&self, _kind: AlertKind, _message: &str, _at: Instant) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_sink_counts_by_kind() {
        let sink = InMemoryAlertSink::new();
        let now = Instant::now();

        assert!(sink.raise(AlertKind::MultipleFaces, "two faces", now));
        assert!(sink.raise(AlertKind::EyeMovement, "gaze", now));
        assert!(sink.raise(AlertKind::MultipleFaces, "three faces", now));

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count(AlertKind::MultipleFaces), 2);
        assert_eq!(sink.count(AlertKind::VoiceDetected), 0);
        assert_eq!(sink.alerts()[1].message, "gaze");
    }

    #[test]
    fn test_in_memory_sink_clear() {
        let sink = InMemoryAlertSink::new();
        sink.raise(AlertKind::VoiceDetected, "voice", Instant::now());
        assert!(!sink.is_empty());

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_null_sink_rejects() {
        assert!(!NullAlertSink.raise(AlertKind::FaceDisappeared, "ignored", Instant::now()));
    }
}
