//! Detector tuning, deserializable from the `detection` config section.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceSettings {
    /// Evaluate every Nth frame.
    pub detection_interval: u32,
    pub min_confidence: f32,
    pub absence_alert_secs: f64,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            detection_interval: 5,
            min_confidence: 0.9,
            absence_alert_secs: 5.0,
        }
    }
}

impl FaceSettings {
    pub fn absence_alert(&self) -> Duration {
        Duration::from_secs_f64(self.absence_alert_secs.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeSettings {
    /// Horizontal deadband in pixels between eye midpoint and nose tip.
    pub gaze_threshold: f32,
    pub movement_window_secs: f64,
    /// Alert once more than this many changes fall inside the window.
    pub max_gaze_changes: usize,
}

impl Default for EyeSettings {
    fn default() -> Self {
        Self {
            gaze_threshold: 15.0,
            movement_window_secs: 2.0,
            max_gaze_changes: 3,
        }
    }
}

impl EyeSettings {
    pub fn movement_window(&self) -> Duration {
        Duration::from_secs_f64(self.movement_window_secs.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouthSettings {
    pub movement_threshold: u32,
}

impl Default for MouthSettings {
    fn default() -> Self {
        Self {
            movement_threshold: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiFaceSettings {
    pub alert_threshold: u32,
}

impl Default for MultiFaceSettings {
    fn default() -> Self {
        Self { alert_threshold: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectSettings {
    pub min_confidence: f32,
    pub max_fps: f64,
    /// Width frames are downscaled to before inference.
    pub inference_width: u32,
    /// Allow-list of detector class ids to labels.
    pub classes: BTreeMap<u32, String>,
}

impl Default for ObjectSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_fps: 2.0,
            inference_width: 320,
            classes: BTreeMap::from([(73, "book".to_string()), (67, "cell phone".to_string())]),
        }
    }
}

impl ObjectSettings {
    /// Minimum time between two evaluations.
    pub fn min_interval(&self) -> Duration {
        if self.max_fps <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(1.0 / self.max_fps)
    }
}

/// Settings for the full detector set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSettings {
    pub face: FaceSettings,
    pub eyes: EyeSettings,
    pub mouth: MouthSettings,
    pub multi_face: MultiFaceSettings,
    pub objects: ObjectSettings,
}
