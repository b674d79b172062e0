//! Deterministic stand-ins for the external collaborators, for tests.

use crate::core::asset_store::{AssetStore, StoreError, StoreResult};
use crate::core::camera::{CameraFeed, MediaCapture, MediaTrack};
use crate::core::pose_estimator::PoseEstimator;
use crate::models::asset::AssetEntry;
use crate::models::capture::{CaptureError, CaptureResult, RawFrame};
use crate::models::pose::{
    BodyLandmark, EstimatorConfig, Landmark, PoseError, PoseResult, POSE_LANDMARK_COUNT,
};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub fn blank_frame(width: u32, height: u32) -> RawFrame {
    RawFrame::from_rgba(RgbaImage::from_pixel(width, height, Rgba([40, 40, 40, 255])), 0)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbaImage::from_pixel(width, height, Rgba([90, 60, 30, 255]));
    let image = DynamicImage::ImageRgba8(pixels);
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode test PNG");
    out.into_inner()
}

/// Full pose with every landmark visible and the left elbow bent to `degrees`
/// in the image plane
pub fn pose_with_left_elbow(degrees: f64) -> Vec<Landmark> {
    let mut lm = vec![Landmark::new(0.5, 0.9, 0.0).with_visibility(0.95); POSE_LANDMARK_COUNT];
    let elbow = (0.5_f64, 0.5_f64);
    let theta = degrees.to_radians();

    lm[BodyLandmark::LeftShoulder.index()] = Landmark::new(0.3, 0.5, 0.0).with_visibility(0.95);
    lm[BodyLandmark::LeftElbow.index()] =
        Landmark::new(elbow.0 as f32, elbow.1 as f32, 0.0).with_visibility(0.95);
    lm[BodyLandmark::LeftWrist.index()] = Landmark::new(
        (elbow.0 - 0.2 * theta.cos()) as f32,
        (elbow.1 + 0.2 * theta.sin()) as f32,
        0.0,
    )
    .with_visibility(0.95);
    lm
}

/// Poll until `check` holds, failing the test after a few seconds
pub async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}

// ==============================================================================
// Estimator
// ==============================================================================

enum Scripted {
    Ready(Option<Vec<Landmark>>),
    Deferred(oneshot::Receiver<Option<Vec<Landmark>>>),
    Fail(PoseError),
}

/// Answers calls in order from a script; falls back to `fallback` when empty
pub struct ScriptedEstimator {
    available: bool,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<Vec<Landmark>>>,
    calls: AtomicUsize,
    resets: AtomicUsize,
    smoothing: Mutex<Vec<bool>>,
}

impl ScriptedEstimator {
    pub fn new() -> Self {
        Self {
            available: true,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            calls: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            smoothing: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn set_fallback(&self, landmarks: Option<Vec<Landmark>>) {
        *self.fallback.lock().unwrap() = landmarks;
    }

    pub fn push_immediate(&self, landmarks: Option<Vec<Landmark>>) {
        self.script.lock().unwrap().push_back(Scripted::Ready(landmarks));
    }

    /// The call consuming this entry resolves when the returned sender fires
    pub fn push_deferred(&self) -> oneshot::Sender<Option<Vec<Landmark>>> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().push_back(Scripted::Deferred(rx));
        tx
    }

    pub fn push_error(&self, error: PoseError) {
        self.script.lock().unwrap().push_back(Scripted::Fail(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn smoothing_log(&self) -> Vec<bool> {
        self.smoothing.lock().unwrap().clone()
    }
}

#[async_trait]
impl PoseEstimator for ScriptedEstimator {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn analyze(
        &self,
        _frame: &RawFrame,
        config: &EstimatorConfig,
    ) -> PoseResult<Option<Vec<Landmark>>> {
        self.smoothing.lock().unwrap().push(config.temporal_smoothing);
        let next = self.script.lock().unwrap().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);

        match next {
            Some(Scripted::Ready(landmarks)) => Ok(landmarks),
            Some(Scripted::Deferred(rx)) => Ok(rx.await.unwrap_or(None)),
            Some(Scripted::Fail(e)) => Err(e),
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }

    async fn reset_tracking(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn model_info(&self) -> String {
        "scripted".to_string()
    }
}

// ==============================================================================
// Camera
// ==============================================================================

pub struct StubTrack {
    live: AtomicBool,
}

impl MediaTrack for StubTrack {
    fn label(&self) -> String {
        "stub".to_string()
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Camera whose frames are pushed by the test
pub struct StubCapture {
    deny: bool,
    feeds: Mutex<Vec<(Option<mpsc::Sender<RawFrame>>, Arc<StubTrack>)>>,
}

impl StubCapture {
    pub fn new() -> Self {
        Self {
            deny: false,
            feeds: Mutex::new(Vec::new()),
        }
    }

    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    pub fn open_count(&self) -> usize {
        self.feeds.lock().unwrap().len()
    }

    /// Sender for the `n`th opened stream
    pub fn sender(&self, n: usize) -> mpsc::Sender<RawFrame> {
        self.feeds.lock().unwrap()[n]
            .0
            .clone()
            .expect("stream already closed")
    }

    /// Drop the held senders so every opened stream ends
    pub fn close_streams(&self) {
        for feed in self.feeds.lock().unwrap().iter_mut() {
            feed.0 = None;
        }
    }

    pub fn track(&self, n: usize) -> Arc<StubTrack> {
        self.feeds.lock().unwrap()[n].1.clone()
    }
}

#[async_trait]
impl MediaCapture for StubCapture {
    async fn open(&self, _width: u32, _height: u32) -> CaptureResult<CameraFeed> {
        if self.deny {
            return Err(CaptureError::PermissionDenied("denied by test".to_string()));
        }
        let (tx, rx) = mpsc::channel(4);
        let track = Arc::new(StubTrack {
            live: AtomicBool::new(true),
        });
        self.feeds.lock().unwrap().push((Some(tx), track.clone()));
        Ok(CameraFeed {
            frames: rx,
            tracks: vec![track],
        })
    }
}

// ==============================================================================
// Store
// ==============================================================================

/// Every operation fails as if the disk were gone
pub struct FailingStore;

#[async_trait]
impl AssetStore for FailingStore {
    async fn save(&self, _blob: Vec<u8>, _name: &str) -> StoreResult<AssetEntry> {
        Err(StoreError::Other("disk unavailable".to_string()))
    }

    async fn list(&self) -> StoreResult<Vec<AssetEntry>> {
        Err(StoreError::Other("disk unavailable".to_string()))
    }

    async fn get(&self, _id: &str) -> StoreResult<Option<AssetEntry>> {
        Err(StoreError::Other("disk unavailable".to_string()))
    }

    async fn delete(&self, _id: &str) -> StoreResult<()> {
        Err(StoreError::Other("disk unavailable".to_string()))
    }
}
