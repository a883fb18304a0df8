//! Persisted application configuration.
//!
//! Stores the last-used camera, flash state, mode flag, and the per-camera
//! per-mode resolution indices so selections survive across runs. Backed by
//! a TOML file; a missing file yields defaults.

use crate::errors::CameraError;
use crate::types::{CaptureMode, FlashMode, LensFacing};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PHOTO_QUALITY: u8 = 80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Hardware id of the camera used last.
    pub last_used_camera: String,
    pub last_used_camera_lens: LensFacing,
    pub flashlight_state: FlashMode,
    /// Whether the app starts in photo mode.
    pub init_photo_mode: bool,
    pub back_photo_res_index: usize,
    pub back_video_res_index: usize,
    pub front_photo_res_index: usize,
    pub front_video_res_index: usize,
    /// Mirror selfie captures horizontally.
    pub flip_photos: bool,
    pub save_photo_metadata: bool,
    /// JPEG quality, 0-100.
    pub photo_quality: u8,
    /// Folder internally saved media lands in.
    pub save_photos_folder: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            last_used_camera: "0".to_string(),
            last_used_camera_lens: LensFacing::Back,
            flashlight_state: FlashMode::Off,
            init_photo_mode: true,
            back_photo_res_index: 0,
            back_video_res_index: 0,
            front_photo_res_index: 0,
            front_video_res_index: 0,
            flip_photos: true,
            save_photo_metadata: true,
            photo_quality: DEFAULT_PHOTO_QUALITY,
            save_photos_folder: PathBuf::from("DCIM"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CameraError::ConfigError(format!("failed to read config file: {}", e)))?;

        let mut config: AppConfig = toml::from_str(&contents)
            .map_err(|e| CameraError::ConfigError(format!("failed to parse config file: {}", e)))?;

        config.clamp();
        log::info!("loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::ConfigError(format!("failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CameraError::ConfigError(format!("failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CameraError::ConfigError(format!("failed to write config file: {}", e)))?;

        log::info!("saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("shuttercam.toml")
    }

    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Pull stored values back into their valid ranges instead of failing.
    pub fn clamp(&mut self) {
        if self.photo_quality > 100 {
            self.photo_quality = 100;
        }
    }

    /// The persisted resolution index for a camera facing and capture mode.
    pub fn resolution_index(&self, facing: LensFacing, mode: CaptureMode) -> usize {
        match (facing, mode) {
            (LensFacing::Back, CaptureMode::Photo) => self.back_photo_res_index,
            (LensFacing::Back, CaptureMode::Video) => self.back_video_res_index,
            (LensFacing::Front, CaptureMode::Photo) => self.front_photo_res_index,
            (LensFacing::Front, CaptureMode::Video) => self.front_video_res_index,
        }
    }

    pub fn set_resolution_index(&mut self, facing: LensFacing, mode: CaptureMode, index: usize) {
        match (facing, mode) {
            (LensFacing::Back, CaptureMode::Photo) => self.back_photo_res_index = index,
            (LensFacing::Back, CaptureMode::Video) => self.back_video_res_index = index,
            (LensFacing::Front, CaptureMode::Photo) => self.front_photo_res_index = index,
            (LensFacing::Front, CaptureMode::Video) => self.front_video_res_index = index,
        }
    }
}
