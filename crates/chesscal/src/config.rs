//! JSON configuration of a calibration job.

use chesscal_calib::{CalibrationParams, DEFAULT_SENSOR_WIDTH_MM};
use chesscal_detect::DetectorParams;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_board_width() -> i32 {
    7
}

fn default_board_height() -> i32 {
    6
}

fn default_sensor_width() -> f64 {
    DEFAULT_SENSOR_WIDTH_MM
}

fn default_camera_name() -> String {
    "camera".to_string()
}

/// Everything a calibration run needs besides the frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Inner corners per row. Negative values are taken by absolute value.
    #[serde(default = "default_board_width")]
    pub board_width: i32,
    /// Inner corners per column.
    #[serde(default = "default_board_height")]
    pub board_height: i32,
    #[serde(default = "default_sensor_width")]
    pub sensor_width_mm: f64,
    #[serde(default = "default_camera_name")]
    pub camera_name: String,
    #[serde(default)]
    pub detector: DetectorParams,
    #[serde(default)]
    pub calibration: CalibrationParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            board_width: default_board_width(),
            board_height: default_board_height(),
            sensor_width_mm: default_sensor_width(),
            camera_name: default_camera_name(),
            detector: DetectorParams::default(),
            calibration: CalibrationParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
