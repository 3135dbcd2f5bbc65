mod gate;
mod logger;
mod voice;

pub use gate::CooldownGate;
pub use logger::{AlertLogger, ALERT_LOG_FILE};
pub use voice::{message_for, AlertVoice, SpeechEngine};

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert log error: {0}")]
    Io(#[from] std::io::Error),
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("playback failed: {0}")]
    Playback(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
