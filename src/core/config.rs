use crate::models::pose::{AngleMode, EstimatorConfig, ModelComplexity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Root of the local data directory (database lives here)
    pub data_dir: PathBuf,
    /// Where exported snapshots are written
    pub snapshot_dir: PathBuf,
    /// Requested camera resolution
    pub camera_width: u32,
    pub camera_height: u32,
    /// Directory of images replayed as the camera; no camera when unset
    pub camera_replay_dir: Option<PathBuf>,
    /// Replay rate for `camera_replay_dir`
    pub replay_fps: u32,
    /// Angle mode on startup: planar or spatial
    pub default_angle_mode: AngleMode,
    pub model_complexity: ModelComplexity,
    /// Estimator detection confidence (0.0-1.0)
    pub min_detection_confidence: f32,
    /// Estimator tracking confidence (0.0-1.0)
    pub min_tracking_confidence: f32,
    /// Skeleton segment thickness in pixels
    pub overlay_line_width: u32,
    /// Landmark marker radius in pixels
    pub overlay_marker_radius: i32,
    /// Snapshot upscale factor
    pub snapshot_scale: f32,
    /// TTF/OTF font for the snapshot angle panel
    pub font_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        let mut data_dir = PathBuf::from(home);
        data_dir.push(".posekit_data");
        let snapshot_dir = data_dir.join("snapshots");

        Self {
            data_dir,
            snapshot_dir,
            camera_width: 640,
            camera_height: 480,
            camera_replay_dir: None,
            replay_fps: 15,
            default_angle_mode: AngleMode::Planar,
            model_complexity: ModelComplexity::Full,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            overlay_line_width: 2,
            overlay_marker_radius: 2,
            snapshot_scale: 1.35,
            font_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            // Create default config and save it
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.validate()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        // Validate confidences
        for (label, value) in [
            ("detection", self.min_detection_confidence),
            ("tracking", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!(
                    "Invalid {} confidence: {}. Must be between 0.0 and 1.0",
                    label, value
                )
                .into());
            }
        }

        // Validate camera resolution
        for (label, value) in [("width", self.camera_width), ("height", self.camera_height)] {
            if value == 0 || value > 4096 {
                return Err(format!(
                    "Invalid camera {}: {}. Must be between 1 and 4096",
                    label, value
                )
                .into());
            }
        }

        // Validate replay FPS
        if self.replay_fps == 0 || self.replay_fps > 60 {
            return Err(format!(
                "Invalid replay FPS: {}. Must be between 1 and 60",
                self.replay_fps
            )
            .into());
        }

        // Validate snapshot scale
        if !(self.snapshot_scale > 0.0 && self.snapshot_scale <= 4.0) {
            return Err(format!(
                "Invalid snapshot scale: {}. Must be greater than 0 and at most 4",
                self.snapshot_scale
            )
            .into());
        }

        // Validate overlay geometry
        if self.overlay_line_width == 0 || self.overlay_line_width > 16 {
            return Err(format!(
                "Invalid overlay line width: {}. Must be between 1 and 16",
                self.overlay_line_width
            )
            .into());
        }
        if !(0..=32).contains(&self.overlay_marker_radius) {
            return Err(format!(
                "Invalid overlay marker radius: {}. Must be between 0 and 32",
                self.overlay_marker_radius
            )
            .into());
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    /// SQLite database file inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("posekit.db")
    }

    /// Estimator settings; smoothing is chosen per call
    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            temporal_smoothing: false,
            model_complexity: self.model_complexity,
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
        }
    }

    /// Get the configuration file path
    fn get_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| "Could not determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".posekit_data");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}
