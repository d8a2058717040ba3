//! Tracker configuration
//!
//! One JSON document with a section per concern. Every field has a default, so a
//! partial file (or `{}`) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Digital zoom limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Zoom change per joystick step
    pub zoom_step: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            zoom_min: 1.0,
            zoom_max: 3.0,
            zoom_step: 0.1,
        }
    }
}

/// Output video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub fps: u32,
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            fps: 30,
            jpeg_quality: 80,
        }
    }
}

/// On-frame instrumentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Master switch for the text overlay
    pub overlay: bool,
    pub show_fps: bool,
    pub show_temp: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            overlay: false,
            show_fps: true,
            show_temp: true,
        }
    }
}

/// Physical gimbal mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GimbalConfig {
    pub enabled: bool,
    pub ip: String,
    pub port: u16,
    pub timeout_ms: u64,
    /// Send attempts per angle command
    pub attempts: usize,
    /// Horizontal field of view mapped onto the frame width
    pub fov_h_deg: f64,
    /// Vertical field of view mapped onto the frame height
    pub fov_v_deg: f64,
    /// Corrections smaller than this on both axes are not sent
    pub deadband_deg: f64,
}

impl GimbalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl Default for GimbalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ip: "192.168.144.25".to_string(),
            port: 37260,
            timeout_ms: 350,
            attempts: 3,
            fov_h_deg: 60.0,
            fov_v_deg: 45.0,
            deadband_deg: 0.5,
        }
    }
}

/// Local peripherals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Probe for a Sense HAT joystick and LED matrix
    pub sense_hat: bool,
    pub thermal_path: PathBuf,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            sense_hat: true,
            thermal_path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PtzConfig {
    pub ptz: ZoomConfig,
    pub stream: StreamConfig,
    pub telemetry: TelemetryConfig,
    pub gimbal: GimbalConfig,
    pub hardware: HardwareConfig,
}

impl PtzConfig {
    /// Load and validate a JSON config file.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let z = &self.ptz;
        if !(z.zoom_min.is_finite() && z.zoom_max.is_finite() && z.zoom_step.is_finite()) {
            return Err(ConfigError::Invalid("zoom values must be finite".into()));
        }
        if z.zoom_min <= 0.0 || z.zoom_min > z.zoom_max {
            return Err(ConfigError::Invalid(format!(
                "zoom range [{}, {}] is empty or not positive",
                z.zoom_min, z.zoom_max
            )));
        }
        if z.zoom_step <= 0.0 {
            return Err(ConfigError::Invalid("zoom_step must be positive".into()));
        }
        if self.stream.fps == 0 {
            return Err(ConfigError::Invalid("stream fps must be positive".into()));
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality {} outside 1..=100",
                self.stream.jpeg_quality
            )));
        }
        if self.gimbal.deadband_deg.is_nan() || self.gimbal.deadband_deg < 0.0 {
            return Err(ConfigError::Invalid("gimbal deadband must be non-negative".into()));
        }
        if self.gimbal.attempts == 0 {
            return Err(ConfigError::Invalid("gimbal attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PtzConfig::default();
        assert_eq!(config.ptz.zoom_min, 1.0);
        assert_eq!(config.ptz.zoom_max, 3.0);
        assert_eq!(config.stream.port, 5000);
        assert!(!config.telemetry.overlay);
        assert!(!config.gimbal.enabled);
        assert_eq!(config.gimbal.address(), "192.168.144.25:37260");
        assert_eq!(config.gimbal.timeout(), Duration::from_millis(350));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PtzConfig =
            serde_json::from_str(r#"{"ptz": {"zoom_max": 4.0}, "telemetry": {"overlay": true}}"#)
                .unwrap();
        assert_eq!(config.ptz.zoom_max, 4.0);
        assert_eq!(config.ptz.zoom_step, 0.1);
        assert!(config.telemetry.overlay);
        assert!(config.telemetry.show_fps);
        assert_eq!(config.stream, StreamConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ptz.json");

        let mut config = PtzConfig::default();
        config.gimbal.enabled = true;
        config.stream.fps = 15;
        config.save_to_file(&path).unwrap();

        assert_eq!(PtzConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_rejected() {
        let mut config = PtzConfig::default();
        config.ptz.zoom_min = 4.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"stream": {"jpeg_quality": 0}}"#).unwrap();
        assert!(matches!(
            PtzConfig::load_from_file(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            PtzConfig::load_from_file(&path),
            Err(ConfigError::Json(_))
        ));
    }
}
