mod arbitration;
mod audio_monitor;
mod config;
mod constants;
mod overlay;
mod session;

pub use arbitration::arbitrate;
pub use audio_monitor::{AudioMonitor, AudioOutputs, AudioSummary, KeywordScreen};
pub use config::{
    AudioMonitoringConfig, ConfigError, ConfigResult, DetectionConfig, GlobalConfig,
    LoggingConfig, ProctorConfig, ScreenConfig, VideoConfig, VideoSource,
};
pub use constants::*;
pub use overlay::{overlay_lines, render_overlay, OverlayLine};
pub use session::{
    FrameReport, ProctorSession, Resource, ResourceFailure, SessionSummary,
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("alert setup failed: {0}")]
    Alerts(#[from] proctor_alerts::AlertError),
    #[error("storage error: {0}")]
    Storage(#[from] proctor_storage::StorageError),
    #[error("capture setup failed: {0}")]
    Capture(#[from] proctor_capture::CaptureError),
    #[error("frame source failed: {0}")]
    Source(#[from] proctor_vision::VisionError),
}

pub type SessionResult<T> = Result<T, SessionError>;
