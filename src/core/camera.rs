// Camera abstraction layer - what the live session needs from media capture

use crate::models::capture::{CaptureResult, RawFrame};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One track of an acquired camera stream
pub trait MediaTrack: Send + Sync {
    fn label(&self) -> String;

    /// Stop producing frames and release the device. Must not block.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// An acquired camera stream: frames arrive on `frames`, `tracks` control the device
pub struct CameraFeed {
    pub frames: mpsc::Receiver<RawFrame>,
    pub tracks: Vec<Arc<dyn MediaTrack>>,
}

impl CameraFeed {
    pub fn stop_all(&self) {
        stop_tracks(&self.tracks);
    }
}

pub fn stop_tracks(tracks: &[Arc<dyn MediaTrack>]) {
    for track in tracks {
        if track.is_live() {
            track.stop();
            tracing::debug!(track = %track.label(), "Stopped camera track");
        }
    }
}

/// Platform-agnostic camera acquisition
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Request camera access at the given resolution. Denial is an `Err`.
    async fn open(&self, width: u32, height: u32) -> CaptureResult<CameraFeed>;
}
