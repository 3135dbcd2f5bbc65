use proctor_events::AlertKind;

/// Result of one detector invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutcome<T> {
    /// Fresh judgment from this frame (or the throttled last judgment).
    Judgment(T),
    /// No usable observation this frame; last known value.
    Degraded(T),
    /// Provider failed. `fallback` is the safe value to act on.
    Failed {
        fallback: T,
        kind: AlertKind,
        reason: String,
    },
}

impl<T> DetectorOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            DetectorOutcome::Judgment(v) | DetectorOutcome::Degraded(v) => v,
            DetectorOutcome::Failed { fallback, .. } => fallback,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            DetectorOutcome::Judgment(v) | DetectorOutcome::Degraded(v) => v,
            DetectorOutcome::Failed { fallback, .. } => fallback,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DetectorOutcome::Failed { .. })
    }

    /// Diagnostic kind and reason of a failed invocation.
    pub fn failure(&self) -> Option<(AlertKind, &str)> {
        match self {
            DetectorOutcome::Failed { kind, reason, .. } => Some((*kind, reason.as_str())),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DetectorOutcome<U> {
        match self {
            DetectorOutcome::Judgment(v) => DetectorOutcome::Judgment(f(v)),
            DetectorOutcome::Degraded(v) => DetectorOutcome::Degraded(f(v)),
            DetectorOutcome::Failed {
                fallback,
                kind,
                reason,
            } => DetectorOutcome::Failed {
                fallback: f(fallback),
                kind,
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_of_each_variant() {
        assert!(*DetectorOutcome::Judgment(true).value());
        assert!(!*DetectorOutcome::Degraded(false).value());

        let failed = DetectorOutcome::Failed {
            fallback: false,
            kind: AlertKind::ObjectDetectionError,
            reason: "timeout".into(),
        };
        assert!(failed.is_failed());
        assert_eq!(
            failed.failure(),
            Some((AlertKind::ObjectDetectionError, "timeout"))
        );
        assert!(!failed.into_value());
    }

    #[test]
    fn test_map_keeps_variant() {
        let mapped = DetectorOutcome::Degraded(2).map(|v| v * 10);
        assert_eq!(mapped, DetectorOutcome::Degraded(20));
    }
}
