//! Line-delimited alert log (`alerts.log`).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use proctor_events::{AlertKind, AlertSink};

use crate::{CooldownGate, Result};

pub const ALERT_LOG_FILE: &str = "alerts.log";

const LINE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Appends `<time> - <KIND>: <message>` lines, one per accepted alert.
///
/// Owns its own cooldown gate; a suppressed alert never reaches the file.
pub struct AlertLogger {
    path: PathBuf,
    gate: CooldownGate,
    file_lock: Mutex<()>,
}

impl AlertLogger {
    /// Create the log directory if needed. The file itself is created lazily.
    pub fn new(log_dir: impl AsRef<Path>, cooldown: Duration) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let path = log_dir.join(ALERT_LOG_FILE);
        tracing::info!(path = %path.display(), ?cooldown, "alert log ready");

        Ok(Self {
            path,
            gate: CooldownGate::new(cooldown),
            file_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// Log `message` under `kind` unless the kind is cooling down.
    ///
    /// Returns whether the alert was accepted. A write failure is reported via
    /// tracing but still counts as accepted so callers keep a consistent view
    /// of the cooldown.
    pub fn log_alert(&self, kind: AlertKind, message: &str, now: Instant) -> bool {
        if !self.gate.allow(kind, now) {
            return false;
        }

        let line = format_line(kind, message);
        if let Err(e) = self.append_line(&line) {
            tracing::warn!(%kind, error = %e, "failed to write alert log");
        }

        if kind.is_diagnostic() {
            tracing::warn!(%kind, "{message}");
        } else {
            tracing::info!(%kind, "{message}");
        }
        true
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let _guard = self.file_lock.lock().expect("alert log mutex poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl AlertSink for AlertLogger {
    fn raise(&self, kind: AlertKind, message: &str, at: Instant) -> bool {
        self.log_alert(kind, message, at)
    }
}

fn format_line(kind: AlertKind, message: &str) -> String {
    let timestamp = chrono::Local::now().format(LINE_TIME_FORMAT);
    format!("{timestamp} - {kind}: {message}")
}
