mod clock;
mod kind;
mod stats;

pub use clock::{SessionClock, RECORDING_STAMP_FORMAT, VIOLATION_STAMP_FORMAT};
pub use kind::ViolationKind;
pub use stats::{severity, SeverityPoint, ViolationStats};

use std::path::PathBuf;

use proctor_events::AlertKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Append-only history of confirmed violations.
///
/// The session and the audio monitor append from different threads, so
/// implementations serialize `record` internally.
pub trait ViolationRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append one record. Durable once this returns `Ok`.
    fn record(&self, record: ViolationRecord) -> Result<(), Self::Error>;

    /// Full history in insertion order.
    fn all(&self) -> Result<Vec<ViolationRecord>, Self::Error>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One confirmed violation, as persisted in `violations.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ViolationRecord {
    pub fn new(kind: impl Into<ViolationKind>, timestamp: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: timestamp.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Annotated still saved for a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureArtifact {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub timestamp: String,
    /// Absolute path of the JPEG.
    pub image_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_shape() {
        let record = ViolationRecord::new(AlertKind::MultipleFaces, "20260101_100000_000001")
            .with_metadata("image_path", "/tmp/x.jpg");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "MULTIPLE_FACES");
        assert_eq!(value["timestamp"], "20260101_100000_000001");
        assert_eq!(value["metadata"]["image_path"], "/tmp/x.jpg");
    }

    #[test]
    fn test_missing_metadata_defaults_empty() {
        let record: ViolationRecord =
            serde_json::from_str(r#"{"type": "FACE_DISAPPEARED", "timestamp": "t"}"#).unwrap();
        assert_eq!(record.kind, AlertKind::FaceDisappeared);
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_foreign_record_round_trips() {
        let raw = r#"{"type":"FORBIDDEN_OBJECT","timestamp":"t0","metadata":{"objects":["book"]}}"#;
        let record: ViolationRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.kind.as_str(), "FORBIDDEN_OBJECT");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, serde_json::from_str::<Value>(raw).unwrap());
    }
}
