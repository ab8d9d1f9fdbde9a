//! Recorder configuration: processing, countdown timing, export and camera

use ppg_core::{PpgError, PpgResult};
use ppg_processing::ProcessingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Countdown durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Hold-still period before recording starts
    pub stabilization_ms: u64,
    /// Length of the recorded segment
    pub recording_ms: u64,
    /// Countdown display period
    pub tick_ms: u64,
}

impl TimingConfig {
    pub fn stabilization(&self) -> Duration {
        Duration::from_millis(self.stabilization_ms)
    }

    pub fn recording(&self) -> Duration {
        Duration::from_millis(self.recording_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stabilization_ms: 10_000,
            recording_ms: 30_000,
            tick_ms: 1_000,
        }
    }
}

/// Where saved sessions land
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Documents-style base directory
    pub base_dir: PathBuf,
    /// Application folder created under `base_dir`
    pub folder_name: String,
}

impl ExportConfig {
    /// Full path of the folder records are written to
    pub fn folder(&self) -> PathBuf {
        self.base_dir.join(&self.folder_name)
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            folder_name: "PPG_Signals".to_string(),
        }
    }
}

/// Requested capture format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: usize,
    pub height: usize,
    pub fps: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 120,
            height: 160,
            fps: 30.0,
        }
    }
}

/// Top-level recorder configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub processing: ProcessingConfig,
    pub timing: TimingConfig,
    pub export: ExportConfig,
    pub camera: CameraConfig,
}

impl RecorderConfig {
    /// Preset with shortened countdowns, for demos and tests
    pub fn quick(stabilization_ms: u64, recording_ms: u64) -> Self {
        Self {
            timing: TimingConfig {
                stabilization_ms,
                recording_ms,
                tick_ms: stabilization_ms.min(recording_ms).clamp(1, 1_000),
            },
            ..Self::default()
        }
    }

    /// Validate entire configuration
    pub fn validate(&self) -> PpgResult<()> {
        self.processing.validate()?;

        if self.timing.stabilization_ms == 0 || self.timing.recording_ms == 0 {
            return Err(PpgError::config("countdown durations must be non-zero"));
        }
        if self.timing.tick_ms == 0 {
            return Err(PpgError::config("countdown tick must be non-zero"));
        }

        if self.export.folder_name.trim().is_empty() {
            return Err(PpgError::config("export folder name must not be empty"));
        }

        if self.camera.width < 2 || self.camera.height < 2 {
            return Err(PpgError::config("camera resolution must be at least 2x2"));
        }
        if self.camera.fps <= 0.0 {
            return Err(PpgError::config("camera frame rate must be positive"));
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> PpgResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PpgError::config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Import configuration from JSON
    pub fn from_json(json: &str) -> PpgResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PpgError::config(format!("Failed to deserialize configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> PpgResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PpgError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppg_core::SamplingStrategy;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RecorderConfig::default();
        assert_eq!(config.timing.stabilization(), Duration::from_secs(10));
        assert_eq!(config.timing.recording(), Duration::from_secs(30));
        assert_eq!(config.timing.tick(), Duration::from_secs(1));
        assert_eq!(config.export.folder(), PathBuf::from("./PPG_Signals"));
        assert_eq!((config.camera.width, config.camera.height), (120, 160));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quick_preset() {
        let config = RecorderConfig::quick(200, 500);
        assert_eq!(config.timing.tick_ms, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = RecorderConfig::default();
        config.timing.tick_ms = 0;
        assert!(config.validate().is_err());

        config = RecorderConfig::default();
        config.export.folder_name = "  ".to_string();
        assert!(config.validate().is_err());

        config = RecorderConfig::default();
        config.processing.filters.window_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = RecorderConfig::default();
        config.processing.strategy = SamplingStrategy::CenterBoxRaw;
        config.export.base_dir = PathBuf::from("/tmp/ppg");

        let json = config.to_json().unwrap();
        let restored = RecorderConfig::from_json(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_from_file_with_partial_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "timing": {{ "recording_ms": 5000 }} }}"#).unwrap();

        let config = RecorderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.timing.recording_ms, 5000);
        assert_eq!(config.timing.stabilization_ms, 10_000);
        assert_eq!(config.export.folder_name, "PPG_Signals");
    }

    #[test]
    fn test_from_missing_file() {
        let err = RecorderConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PpgError::ConfigurationError { .. }));
    }
}
