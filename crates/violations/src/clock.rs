use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDateTime};

/// Microsecond-resolution stamp used for violations and capture file names.
pub const VIOLATION_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Second-resolution stamp used for recording file names.
pub const RECORDING_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Hands out strictly increasing violation timestamps for one session.
///
/// Shared by the frame loop and the audio monitor; two calls in the same
/// microsecond are pushed one microsecond apart.
#[derive(Debug, Default)]
pub struct SessionClock {
    last_micros: Mutex<Option<i64>>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_stamp(&self) -> String {
        self.next_at(Local::now().naive_local())
    }

    fn next_at(&self, now: NaiveDateTime) -> String {
        let now_micros = now.and_utc().timestamp_micros();

        let mut last = self.last_micros.lock().expect("session clock mutex poisoned");
        let micros = match *last {
            Some(prev) if now_micros <= prev => prev + 1,
            _ => now_micros,
        };
        *last = Some(micros);

        DateTime::from_timestamp_micros(micros)
            .map(|t| t.naive_utc())
            .unwrap_or(now)
            .format(VIOLATION_STAMP_FORMAT)
            .to_string()
    }
}
