// Camera sources
// Each source implements the MediaCapture interface defined in core/camera.rs

pub mod replay;

pub use replay::ImageSequenceCapture;

use crate::core::camera::{CameraFeed, MediaCapture};
use crate::core::config::Config;
use crate::models::capture::{CaptureError, CaptureResult};
use async_trait::async_trait;
use std::sync::Arc;

/// A camera that is never available
pub struct NoCamera;

#[async_trait]
impl MediaCapture for NoCamera {
    async fn open(&self, _width: u32, _height: u32) -> CaptureResult<CameraFeed> {
        Err(CaptureError::Unavailable)
    }
}

/// Camera source for the configured environment
pub fn default_capture(config: &Config) -> Arc<dyn MediaCapture> {
    match &config.camera_replay_dir {
        Some(dir) => Arc::new(ImageSequenceCapture::new(dir.clone(), config.replay_fps)),
        None => Arc::new(NoCamera),
    }
}
