use std::fmt;

use proctor_events::AlertKind;
use serde::{Deserialize, Serialize};

/// Violation type as stored in the ledger.
///
/// Ledgers written by older tools may carry names outside `AlertKind`
/// (`GAZE_AWAY`, `FORBIDDEN_OBJECT`); those load as `Other` and are written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViolationKind {
    Known(AlertKind),
    Other(String),
}

impl ViolationKind {
    pub fn as_str(&self) -> &str {
        match self {
            ViolationKind::Known(kind) => kind.as_str(),
            ViolationKind::Other(name) => name,
        }
    }

    pub fn alert_kind(&self) -> Option<AlertKind> {
        match self {
            ViolationKind::Known(kind) => Some(*kind),
            ViolationKind::Other(_) => None,
        }
    }
}

impl From<AlertKind> for ViolationKind {
    fn from(kind: AlertKind) -> Self {
        ViolationKind::Known(kind)
    }
}

impl PartialEq<AlertKind> for ViolationKind {
    fn eq(&self, other: &AlertKind) -> bool {
        self.alert_kind() == Some(*other)
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names_parse_to_alert_kinds() {
        let kind: ViolationKind = serde_json::from_str("\"OBJECT_DETECTED\"").unwrap();
        assert_eq!(kind, ViolationKind::Known(AlertKind::ObjectDetected));
        assert_eq!(kind, AlertKind::ObjectDetected);
    }

    #[test]
    fn test_unknown_names_survive_a_rewrite() {
        let kind: ViolationKind = serde_json::from_str("\"GAZE_AWAY\"").unwrap();
        assert_eq!(kind, ViolationKind::Other("GAZE_AWAY".into()));
        assert_eq!(kind.alert_kind(), None);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"GAZE_AWAY\"");
        assert_ne!(kind, AlertKind::EyeMovement);
    }
}
