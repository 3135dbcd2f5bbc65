use std::time::Duration;

/// How long `stop` waits for each background thread.
pub const THREAD_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Budget shared by all outstanding voice tasks at shutdown.
pub const VOICE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Audio thread wakes at least this often to check for cancellation.
pub const AUDIO_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Eyes are drawn as closed below this aspect ratio (display only).
pub const EYES_OPEN_RATIO: f32 = 0.25;

pub const VOICE_DETECTED_MESSAGE: &str = "Voice activity detected";
