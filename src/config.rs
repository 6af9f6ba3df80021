//! Configuration management for trialcam
//!
//! Provides loading, saving and validation of capture geometry, discovery
//! probing, naming policy, output layout and key bindings.

use crate::errors::CameraError;
use crate::naming::DuplicateNamePolicy;
use crate::platform::{BackendStrategy, OpenParams};
use crate::recording::RecordingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialCamConfig {
    pub camera: CameraConfig,
    pub discovery: DiscoveryConfig,
    pub naming: NamingConfig,
    pub storage: StorageConfig,
    pub recording: RecordingSettings,
    pub controls: ControlsConfig,
}

/// Capture geometry applied to every camera
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Requested resolution [width, height]; also the recorded frame size
    pub resolution: [u32; 2],
    /// Requested and recorded frames per second
    pub fps: u32,
}

/// Device probing behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Probe indices 0..max_index
    pub max_index: u32,
    /// Reads attempted per opened device before giving up
    pub probe_attempts: u32,
    /// Pause after opening, before the first read
    pub warmup_ms: u64,
    /// Pause between failed reads
    pub retry_delay_ms: u64,
    /// Capture APIs to try, in order
    pub backend: BackendStrategy,
}

/// Interactive naming behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Length of the live preview shown before each name prompt
    pub preview_ms: u64,
    /// What to do when two cameras receive the same name
    pub duplicate_policy: DuplicateNamePolicy,
}

/// Output layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root folder; each camera records into `<output_root>/<name>/`
    pub output_root: String,
}

/// Encoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Write the moov box before mdat
    pub fast_start: bool,
}

/// Key bindings and loop cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub start_key: char,
    pub stop_key: char,
    pub quit_key: char,
    /// How long each tick waits for a key press
    pub tick_ms: u64,
    /// Height in pixels of each tile in the combined preview
    pub preview_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            resolution: [640, 480],
            fps: 30,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_index: 10,
            probe_attempts: 5,
            warmup_ms: 1000,
            retry_delay_ms: 500,
            backend: BackendStrategy::default(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            preview_ms: 3000,
            duplicate_policy: DuplicateNamePolicy::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_root: "data".to_string(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            bitrate: 2_500_000,
            fast_start: true,
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            start_key: 's',
            stop_key: 'e',
            quit_key: 'q',
            tick_ms: 1,
            preview_height: 240,
        }
    }
}

impl DiscoveryConfig {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl NamingConfig {
    pub fn preview_duration(&self) -> Duration {
        Duration::from_millis(self.preview_ms)
    }
}

impl ControlsConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl TrialCamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: TrialCamConfig = toml::from_str(&contents).map_err(|e| {
            CameraError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CameraError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CameraError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CameraError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("trialcam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let [width, height] = self.camera.resolution;
        if width == 0 || height == 0 {
            return Err("Invalid resolution".to_string());
        }
        if width % 2 != 0 || height % 2 != 0 {
            return Err("Resolution must have even width and height".to_string());
        }
        if self.camera.fps == 0 || self.camera.fps > 240 {
            return Err("Invalid FPS (must be 1-240)".to_string());
        }

        if self.discovery.max_index == 0 {
            return Err("max_index must be at least 1".to_string());
        }
        if self.discovery.probe_attempts == 0 {
            return Err("probe_attempts must be at least 1".to_string());
        }

        if self.storage.output_root.trim().is_empty() {
            return Err("output_root must not be empty".to_string());
        }

        if self.recording.bitrate == 0 {
            return Err("bitrate must be positive".to_string());
        }

        let keys = [
            self.controls.start_key,
            self.controls.stop_key,
            self.controls.quit_key,
        ];
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err("start, stop and quit keys must differ".to_string());
        }
        if self.controls.preview_height < 16 {
            return Err("preview_height must be at least 16 pixels".to_string());
        }

        Ok(())
    }

    /// Capture geometry requested when opening devices
    pub fn open_params(&self) -> OpenParams {
        OpenParams {
            width: self.camera.resolution[0],
            height: self.camera.resolution[1],
            fps: self.camera.fps,
        }
    }

    /// Sink settings for every camera of a trial
    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig::new(
            self.camera.resolution[0],
            self.camera.resolution[1],
            self.camera.fps as f64,
        )
        .with_bitrate(self.recording.bitrate)
        .with_fast_start(self.recording.fast_start)
    }

    pub fn output_root(&self) -> PathBuf {
        PathBuf::from(self.storage.output_root.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrialCamConfig::default();
        assert_eq!(config.camera.resolution, [640, 480]);
        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.discovery.max_index, 10);
        assert_eq!(config.discovery.probe_attempts, 5);
        assert_eq!(config.storage.output_root, "data");
    }

    #[test]
    fn test_config_validation() {
        let config = TrialCamConfig::default();
        assert!(config.validate().is_ok());

        let mut bad_config = config.clone();
        bad_config.camera.resolution = [0, 0];
        assert!(bad_config.validate().is_err());

        let mut odd = TrialCamConfig::default();
        odd.camera.resolution = [641, 480];
        assert!(odd.validate().is_err());

        let mut same_keys = TrialCamConfig::default();
        same_keys.controls.stop_key = 's';
        assert!(same_keys.validate().is_err());

        let mut no_root = TrialCamConfig::default();
        no_root.storage.output_root = "  ".to_string();
        assert!(no_root.validate().is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("trialcam.toml");

        let mut config = TrialCamConfig::default();
        config.discovery.max_index = 4;
        config.naming.duplicate_policy = DuplicateNamePolicy::Suffix;
        assert!(config.save_to_file(&config_path).is_ok());

        let loaded = TrialCamConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.discovery.max_index, 4);
        assert_eq!(loaded.naming.duplicate_policy, DuplicateNamePolicy::Suffix);
        assert_eq!(loaded.controls.quit_key, 'q');
    }

    #[test]
    fn test_config_toml_format() {
        let config = TrialCamConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[discovery]"));
        assert!(toml_string.contains("[storage]"));
        assert!(toml_string.contains("[controls]"));
        assert!(toml_string.contains("backend = \"native-then-auto\""));
        // Recordings are always MP4; there is no container knob to ignore
        assert!(!toml_string.contains("container"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: TrialCamConfig = toml::from_str("[camera]\nfps = 15\n").unwrap();
        assert_eq!(parsed.camera.fps, 15);
        assert_eq!(parsed.camera.resolution, [640, 480]);
        assert_eq!(parsed.storage.output_root, "data");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = TrialCamConfig::load_from_file("nonexistent_file.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().camera.fps, 30);
    }
}
