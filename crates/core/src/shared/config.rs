use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::infrastructure::onnx_yolo_detector::YoloLayout;
use crate::shared::constants::{
    DEFAULT_CONFIDENCE, DEFAULT_FACE_PADDING, DEFAULT_GAME_TOPIC, DEFAULT_IDENTITY,
    DEFAULT_INBOUND_TOPIC, DEFAULT_NMS_IOU, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SHARPNESS_THRESHOLD,
    DEFAULT_STATUS_TOPIC, DEFAULT_VERSION,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Settings shared by the detection, bridge and console processes.
///
/// Every field has a default so a partial JSON file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallationConfig {
    pub identity: String,
    pub version: String,
    pub store_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub bus: BusConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub inbound_topic: String,
    pub status_topic: String,
    pub game_topic: String,
    pub publish_endpoint: String,
    pub subscribe_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub camera_device: String,
    pub camera_format: Option<String>,
    pub model_path: PathBuf,
    pub model_layout: YoloLayout,
    pub confidence: f64,
    pub nms_iou: f64,
    pub face_padding: i32,
    pub output_dir: PathBuf,
    pub sharpness_threshold: f64,
}

impl Default for InstallationConfig {
    fn default() -> Self {
        Self {
            identity: DEFAULT_IDENTITY.to_string(),
            version: DEFAULT_VERSION.to_string(),
            store_dir: PathBuf::from("."),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            bus: BusConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            inbound_topic: DEFAULT_INBOUND_TOPIC.to_string(),
            status_topic: DEFAULT_STATUS_TOPIC.to_string(),
            game_topic: DEFAULT_GAME_TOPIC.to_string(),
            publish_endpoint: "tcp://127.0.0.1:5559".to_string(),
            subscribe_endpoint: "tcp://127.0.0.1:5560".to_string(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            camera_format: Some("video4linux2".to_string()),
            model_path: PathBuf::from("models/yolov8n-face.onnx"),
            model_layout: YoloLayout::Pose,
            confidence: DEFAULT_CONFIDENCE,
            nms_iou: DEFAULT_NMS_IOU,
            face_padding: DEFAULT_FACE_PADDING,
            output_dir: PathBuf::from("."),
            sharpness_threshold: DEFAULT_SHARPNESS_THRESHOLD,
        }
    }
}

impl InstallationConfig {
    /// `<config dir>/faceinator/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("faceinator").join("config.json"))
    }

    /// Loads an explicit config file, or the default location when it exists.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        let json = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&json).map_err(|source| ConfigError::Parse { path, source })?;
        log::info!("Loaded configuration for '{}'", config.identity);
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.trim().is_empty() {
            return Err(ConfigError::Invalid("identity must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.capture.confidence) {
            return Err(ConfigError::Invalid(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.capture.confidence
            )));
        }
        if !(0.0..=1.0).contains(&self.capture.nms_iou) {
            return Err(ConfigError::Invalid(format!(
                "nms_iou must be between 0.0 and 1.0, got {}",
                self.capture.nms_iou
            )));
        }
        if self.capture.sharpness_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "sharpness_threshold must not be negative, got {}",
                self.capture.sharpness_threshold
            )));
        }
        if self.capture.face_padding < 0 {
            return Err(ConfigError::Invalid(format!(
                "face_padding must not be negative, got {}",
                self.capture.face_padding
            )));
        }
        Ok(())
    }
}
