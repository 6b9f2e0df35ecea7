//! Engine and CLI configuration.

use super::format::{Orientation, ResolutionPreset};
use crate::qr::DecodeAccuracy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which device to open and at what quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device identifier; the first enumerated device when absent.
    pub device_id: Option<String>,
    /// Requested quality preset.
    pub preset: ResolutionPreset,
    /// Highest preferred frame rate when a device offers one size at several
    /// rates.
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            preset: ResolutionPreset::Medium,
            fps: 30,
        }
    }
}

impl CaptureConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// QR decode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Full-resolution or downscaled decoding.
    pub accuracy: DecodeAccuracy,
    /// Orientation assumed for frames without metadata.
    pub default_orientation: Orientation,
    /// Longest edge used by [`DecodeAccuracy::Fast`].
    pub fast_max_dimension: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            accuracy: DecodeAccuracy::High,
            default_orientation: Orientation::Up,
            fast_max_dimension: 640,
        }
    }
}

impl ScanConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_max_dimension == 0 {
            return Err(ConfigError::InvalidMaxDimension);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("fast_max_dimension must be non-zero")]
    InvalidMaxDimension,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Seconds to scan before closing (0 runs until interrupted).
    pub scan_seconds: u64,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            scan_seconds: 0,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.capture.validate()?;
        config.scan.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = FileConfig::default();
        assert!(config.capture.validate().is_ok());
        assert!(config.scan.validate().is_ok());
    }

    #[test]
    fn test_zero_fps_invalid() {
        let config = CaptureConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFrameRate)));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = FileConfig::from_toml(
            r#"
            [capture]
            device_id = "1"
            preset = "veryHigh"

            [scan]
            accuracy = "fast"
            default_orientation = "right"
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.device_id.as_deref(), Some("1"));
        assert_eq!(config.capture.preset, ResolutionPreset::VeryHigh);
        assert_eq!(config.capture.fps, 30);
        assert_eq!(config.scan.accuracy, DecodeAccuracy::Fast);
        assert_eq!(config.scan.default_orientation, Orientation::Right);
        assert_eq!(config.scan.fast_max_dimension, 640);
        assert_eq!(config.output.metrics_port, 9090);
    }

    #[test]
    fn test_parse_rejects_bad_dimension() {
        let result = FileConfig::from_toml("[scan]\nfast_max_dimension = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidMaxDimension)));
    }

    #[test]
    fn test_parse_rejects_unknown_preset() {
        let result = FileConfig::from_toml("[capture]\npreset = \"huge\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
