use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use proctor_events::AlertKind;

/// Per-kind cooldown bookkeeping.
///
/// An alert of kind K is allowed at most once per cooldown window for K;
/// different kinds never interfere. Safe to share between the frame loop and
/// the audio thread.
pub struct CooldownGate {
    cooldown: Duration,
    overrides: HashMap<AlertKind, Duration>,
    last_fired: Mutex<HashMap<AlertKind, Instant>>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            overrides: HashMap::new(),
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    /// Use a different window for one kind.
    pub fn with_cooldown_for(mut self, kind: AlertKind, cooldown: Duration) -> Self {
        self.overrides.insert(kind, cooldown);
        self
    }

    pub fn cooldown_for(&self, kind: AlertKind) -> Duration {
        self.overrides.get(&kind).copied().unwrap_or(self.cooldown)
    }

    /// Returns true and records `now` iff the window for `kind` has elapsed
    /// (or `kind` never fired). Otherwise returns false without mutation.
    pub fn allow(&self, kind: AlertKind, now: Instant) -> bool {
        let cooldown = self.cooldown_for(kind);
        let mut last_fired = self.last_fired.lock().expect("cooldown gate mutex poisoned");

        if let Some(last) = last_fired.get(&kind) {
            if now.saturating_duration_since(*last) < cooldown {
                tracing::trace!(%kind, "suppressed by cooldown");
                return false;
            }
        }

        last_fired.insert(kind, now);
        true
    }

    /// Last time `kind` passed the gate.
    pub fn last_fired(&self, kind: AlertKind) -> Option<Instant> {
        self.last_fired
            .lock()
            .expect("cooldown gate mutex poisoned")
            .get(&kind)
            .copied()
    }

    pub fn reset(&self) {
        self.last_fired
            .lock()
            .expect("cooldown gate mutex poisoned")
            .clear();
    }
}
