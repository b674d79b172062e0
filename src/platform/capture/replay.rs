// Image-sequence camera: replays a directory of still images as a live stream

use crate::core::camera::{CameraFeed, MediaCapture, MediaTrack};
use crate::models::capture::{CaptureError, CaptureResult, RawFrame};
use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ReplayTrack {
    label: String,
    is_live: Arc<AtomicBool>,
}

impl MediaTrack for ReplayTrack {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn stop(&self) {
        self.is_live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.is_live.load(Ordering::SeqCst)
    }
}

/// Replays the images in a directory, in file-name order, looping forever.
///
/// Frames are offered at `fps`; a frame the consumer has not taken yet is
/// replaced rather than queued.
pub struct ImageSequenceCapture {
    dir: PathBuf,
    fps: u32,
}

impl ImageSequenceCapture {
    pub fn new(dir: PathBuf, fps: u32) -> Self {
        Self { dir, fps: fps.max(1) }
    }

    fn frame_paths(dir: &Path) -> CaptureResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            CaptureError::CaptureFailed(format!("Cannot read {}: {}", dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn load_frames(dir: &Path, width: u32, height: u32) -> CaptureResult<Vec<RgbaImage>> {
        let paths = Self::frame_paths(dir)?;
        if paths.is_empty() {
            return Err(CaptureError::Unavailable);
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            match image::open(&path) {
                Ok(img) => {
                    let img = img.to_rgba8();
                    if img.dimensions() == (width, height) {
                        frames.push(img);
                    } else {
                        frames.push(imageops::resize(&img, width, height, FilterType::Triangle));
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Skipping unreadable frame: {}", e);
                }
            }
        }

        if frames.is_empty() {
            return Err(CaptureError::Unavailable);
        }
        Ok(frames)
    }
}

/// Interval between offered frames; never zero, which `tokio::time::interval` rejects
fn frame_period(fps: u32) -> Duration {
    (Duration::from_secs(1) / fps.max(1)).max(Duration::from_millis(1))
}

#[async_trait]
impl MediaCapture for ImageSequenceCapture {
    async fn open(&self, width: u32, height: u32) -> CaptureResult<CameraFeed> {
        let dir = self.dir.clone();
        let frames = tokio::task::spawn_blocking(move || Self::load_frames(&dir, width, height))
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))??;

        tracing::info!(
            dir = %self.dir.display(),
            frames = frames.len(),
            fps = self.fps,
            "Replaying image sequence as camera"
        );

        let is_live = Arc::new(AtomicBool::new(true));
        let track = Arc::new(ReplayTrack {
            label: format!("replay:{}", self.dir.display()),
            is_live: is_live.clone(),
        });

        let (tx, rx) = mpsc::channel(1);
        let period = frame_period(self.fps);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut index = 0usize;
            while is_live.load(Ordering::SeqCst) {
                interval.tick().await;
                if !is_live.load(Ordering::SeqCst) {
                    break;
                }

                let frame = RawFrame::from_rgba(
                    frames[index % frames.len()].clone(),
                    chrono::Utc::now().timestamp_millis(),
                );
                index += 1;

                match tx.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::trace!("Consumer busy, frame skipped");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            tracing::debug!("Replay stream ended");
        });

        Ok(CameraFeed {
            frames: rx,
            tracks: vec![track],
        })
    }
}
