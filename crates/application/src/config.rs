//! YAML session configuration.
//!
//! Every section is optional; missing keys fall back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use proctor_detect::{
    DetectionSettings, EyeSettings, FaceSettings, MouthSettings, MultiFaceSettings,
    ObjectSettings,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read config file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid YAML.
    #[error("Invalid config in '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// Parsed, but a value is out of range.
    #[error("Invalid value for '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    pub global: GlobalConfig,
    pub video: VideoConfig,
    pub screen: ScreenConfig,
    pub logging: LoggingConfig,
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Root for the ledger and violation captures.
    pub output_path: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./output"),
        }
    }
}

/// Camera index or a file/URL the frame source opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VideoSource {
    Device(u32),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub source: VideoSource,
    pub resolution: [u32; 2],
    pub fps: f64,
    pub recording_path: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: VideoSource::Device(0),
            resolution: [640, 480],
            fps: 20.0,
            recording_path: PathBuf::from("./output/recordings"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub recording: bool,
    pub fps: f64,
    /// Zero-based; grabbers fall back to the primary display when out of range.
    pub monitor_index: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            recording: false,
            fps: 5.0,
            monitor_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_path: PathBuf,
    /// Seconds between two log lines (and two handled violations) of one kind.
    pub alert_cooldown: f64,
    /// Seconds between two spoken alerts of one kind.
    pub voice_cooldown: f64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("./output/logs"),
            alert_cooldown: 10.0,
            voice_cooldown: 10.0,
        }
    }
}

impl LoggingConfig {
    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.alert_cooldown.max(0.0))
    }

    pub fn voice_cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.voice_cooldown.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMonitoringConfig {
    pub enabled: bool,
    pub sample_rate: u32,
    pub chunk_size: usize,
    /// Chunks kept for transcription (15 x 512 samples is about 480ms).
    pub ring_chunks: usize,
    pub energy_threshold: f32,
    pub zcr_threshold: f32,
    pub keyword_screening: bool,
    pub keywords: Vec<String>,
}

impl Default for AudioMonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: proctor_audio::SAMPLE_RATE,
            chunk_size: proctor_audio::CHUNK_SIZE,
            ring_chunks: proctor_audio::RING_CHUNKS,
            energy_threshold: 0.001,
            zcr_threshold: 0.35,
            keyword_screening: false,
            keywords: vec!["help".into(), "answer".into(), "whisper".into()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub face: FaceSettings,
    pub eyes: EyeSettings,
    pub mouth: MouthSettings,
    pub multi_face: MultiFaceSettings,
    pub objects: ObjectSettings,
    pub audio_monitoring: AudioMonitoringConfig,
}

impl DetectionConfig {
    pub fn settings(&self) -> DetectionSettings {
        DetectionSettings {
            face: self.face.clone(),
            eyes: self.eyes.clone(),
            mouth: self.mouth.clone(),
            multi_face: self.multi_face.clone(),
            objects: self.objects.clone(),
        }
    }
}

impl ProctorConfig {
    /// Read, parse and validate a YAML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::parse(&content, path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML content (for testing without filesystem).
    pub fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        // An empty document is all defaults.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let [width, height] = self.video.resolution;
        if width == 0 || height == 0 {
            return invalid("video.resolution", format!("{width}x{height} has a zero side"));
        }
        positive("video.fps", self.video.fps)?;
        positive("screen.fps", self.screen.fps)?;
        non_negative("logging.alert_cooldown", self.logging.alert_cooldown)?;
        non_negative("logging.voice_cooldown", self.logging.voice_cooldown)?;

        let detection = &self.detection;
        if detection.face.detection_interval == 0 {
            return invalid("detection.face.detection_interval", "must be at least 1".into());
        }
        confidence("detection.face.min_confidence", detection.face.min_confidence)?;
        non_negative("detection.face.absence_alert_secs", detection.face.absence_alert_secs)?;
        non_negative("detection.eyes.gaze_threshold", detection.eyes.gaze_threshold as f64)?;
        positive(
            "detection.eyes.movement_window_secs",
            detection.eyes.movement_window_secs,
        )?;
        if detection.multi_face.alert_threshold == 0 {
            return invalid("detection.multi_face.alert_threshold", "must be at least 1".into());
        }
        confidence("detection.objects.min_confidence", detection.objects.min_confidence)?;
        positive("detection.objects.max_fps", detection.objects.max_fps)?;
        if detection.objects.inference_width == 0 {
            return invalid("detection.objects.inference_width", "must be at least 1".into());
        }

        let audio = &detection.audio_monitoring;
        if audio.sample_rate == 0 {
            return invalid("detection.audio_monitoring.sample_rate", "must be positive".into());
        }
        if audio.chunk_size == 0 {
            return invalid("detection.audio_monitoring.chunk_size", "must be positive".into());
        }
        if audio.ring_chunks == 0 {
            return invalid("detection.audio_monitoring.ring_chunks", "must be positive".into());
        }
        non_negative(
            "detection.audio_monitoring.energy_threshold",
            audio.energy_threshold as f64,
        )?;
        non_negative(
            "detection.audio_monitoring.zcr_threshold",
            audio.zcr_threshold as f64,
        )?;
        if audio.keyword_screening && audio.keywords.iter().all(|k| k.trim().is_empty()) {
            return invalid(
                "detection.audio_monitoring.keywords",
                "keyword screening needs at least one keyword".into(),
            );
        }
        Ok(())
    }
}

fn invalid(field: &'static str, message: String) -> ConfigResult<()> {
    Err(ConfigError::Invalid { field, message })
}

fn positive(field: &'static str, value: f64) -> ConfigResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return invalid(field, format!("{value} is not positive"));
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> ConfigResult<()> {
    if !value.is_finite() || value < 0.0 {
        return invalid(field, format!("{value} is negative"));
    }
    Ok(())
}

fn confidence(field: &'static str, value: f32) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return invalid(field, format!("{value} is outside 0..=1"));
    }
    Ok(())
}
