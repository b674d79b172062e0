// Single-shot analysis: decode an image, estimate its pose, draw the overlay,
// and hold the outcome in a latest-wins slot

use crate::core::display_handles::{DisplayHandle, DisplayHandleCache};
use crate::core::liveness::{AngleModeCell, LivenessToken, RequestSequence, ResultCounters};
use crate::core::pose_estimator::PoseEstimatorAdapter;
use crate::core::skeleton::{draw_skeleton, OverlayStyle};
use crate::models::asset::SlotSource;
use crate::models::capture::RawFrame;
use crate::models::pose::{AnalysisResult, AngleMode, Landmark};
use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Message shown on a slot whose image could not be decoded
pub const DECODE_FAILED_MESSAGE: &str = "Failed to load image";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unrecognised image format")]
    UnsupportedFormat,

    #[error("Decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Decode worker failed: {0}")]
    Worker(String),
}

pub type AnalysisOutcome<T> = Result<T, AnalysisError>;

/// The single-shot analysis primitive shared by browsing and comparison
pub struct Analyzer {
    adapter: Arc<PoseEstimatorAdapter>,
    overlay: OverlayStyle,
}

impl Analyzer {
    pub fn new(adapter: Arc<PoseEstimatorAdapter>, overlay: OverlayStyle) -> Self {
        Self { adapter, overlay }
    }

    pub fn adapter(&self) -> &Arc<PoseEstimatorAdapter> {
        &self.adapter
    }

    /// Decode uploaded or stored bytes on the blocking pool. Only byte streams
    /// with a recognisable image signature are accepted.
    pub async fn decode(bytes: Vec<u8>) -> AnalysisOutcome<RgbaImage> {
        if image::guess_format(&bytes).is_err() {
            return Err(AnalysisError::UnsupportedFormat);
        }
        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| img.to_rgba8())
        })
        .await
        .map_err(|e| AnalysisError::Worker(e.to_string()))?
        .map_err(AnalysisError::from)
    }

    /// Estimate a still image without temporal smoothing and return the
    /// landmarks with an annotated copy of the image
    pub async fn analyze_image(&self, image: RgbaImage) -> (Option<Vec<Landmark>>, RgbaImage) {
        let frame = RawFrame::from_rgba(image.clone(), chrono::Utc::now().timestamp_millis());
        let landmarks = self.adapter.analyze(&frame, false).await;

        let mut annotated = image;
        if let Some(lm) = &landmarks {
            self.render(&mut annotated, lm);
        }
        (landmarks, annotated)
    }

    pub async fn analyze_bytes(
        &self,
        bytes: Vec<u8>,
    ) -> AnalysisOutcome<(Option<Vec<Landmark>>, RgbaImage)> {
        let image = Self::decode(bytes).await?;
        Ok(self.analyze_image(image).await)
    }

    /// Draw the skeleton over a surface at the surface's own size
    pub fn render(&self, surface: &mut RgbaImage, landmarks: &[Landmark]) {
        let (width, height) = surface.dimensions();
        draw_skeleton(surface, landmarks, width, height, &self.overlay);
    }
}

// ==============================================================================
// Analysis Slot
// ==============================================================================

/// Everything one slot shows
#[derive(Debug, Clone)]
pub struct SlotState {
    pub source: Option<SlotSource>,
    pub result: AnalysisResult,
    /// Source image with the skeleton drawn over it
    pub annotated: Option<RgbaImage>,
    pub error: Option<String>,
    /// Display handle held while a gallery asset is shown
    pub handle: Option<DisplayHandle>,
    /// Stored bytes of a gallery source, used to re-acquire its handle
    pub blob: Option<Arc<[u8]>>,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            source: None,
            result: AnalysisResult::empty(),
            annotated: None,
            error: None,
            handle: None,
            blob: None,
        }
    }
}

impl SlotState {
    pub fn is_settled(&self) -> bool {
        self.source.is_some() && !self.result.is_loading
    }

    pub fn view(&self) -> SlotView {
        SlotView {
            source: self.source.clone(),
            result: self.result.clone(),
            image_size: self.annotated.as_ref().map(|img| img.dimensions()),
            handle_uri: self.handle.as_ref().map(|h| h.uri()),
            error: self.error.clone(),
        }
    }
}

/// Serializable projection of a slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub source: Option<SlotSource>,
    pub result: AnalysisResult,
    pub image_size: Option<(u32, u32)>,
    pub handle_uri: Option<String>,
    pub error: Option<String>,
}

/// One analysis slot. Each new request supersedes the previous one; a result
/// is applied only if its request is still the newest and its session token
/// is still live.
pub struct AnalysisSlot {
    label: &'static str,
    state: RwLock<SlotState>,
    sequence: RequestSequence,
    analyzer: Arc<Analyzer>,
    handles: Arc<DisplayHandleCache>,
    angle_mode: AngleModeCell,
    counters: Arc<ResultCounters>,
}

impl AnalysisSlot {
    pub fn new(
        label: &'static str,
        analyzer: Arc<Analyzer>,
        handles: Arc<DisplayHandleCache>,
        angle_mode: AngleModeCell,
        counters: Arc<ResultCounters>,
    ) -> Self {
        Self {
            label,
            state: RwLock::new(SlotState::default()),
            sequence: RequestSequence::new(),
            analyzer,
            handles,
            angle_mode,
            counters,
        }
    }

    /// Put the slot into the loading state for `source` and spawn its
    /// analysis. The returned handle resolves to whether the result was applied.
    pub async fn start(
        self: &Arc<Self>,
        token: &LivenessToken,
        source: SlotSource,
        bytes: Vec<u8>,
    ) -> JoinHandle<bool> {
        let ticket = {
            let mut state = self.state.write().await;
            // Issued under the lock so the newest ticket always matches the shown source
            let ticket = self.sequence.issue();
            let handle = source
                .asset_id()
                .map(|id| self.handles.acquire(id, &bytes));
            let blob = source.asset_id().map(|_| Arc::from(bytes.as_slice()));
            if let Some(old) = state.handle.take() {
                self.handles.release(old.asset_id());
            }
            *state = SlotState {
                result: AnalysisResult::loading(source.asset_id().map(str::to_string)),
                source: Some(source),
                annotated: None,
                error: None,
                handle,
                blob,
            };
            ticket
        };

        let slot = Arc::clone(self);
        let token = token.clone();
        tokio::spawn(async move { slot.complete(ticket, token, bytes).await })
    }

    async fn complete(&self, ticket: u64, token: LivenessToken, bytes: Vec<u8>) -> bool {
        let outcome = tokio::select! {
            _ = token.cancelled() => {
                self.counters.result_dropped();
                tracing::debug!(slot = self.label, "Analysis cancelled with its session");
                return false;
            }
            outcome = self.analyzer.analyze_bytes(bytes) => outcome,
        };

        let mut state = self.state.write().await;
        if !token.is_live() || !self.sequence.is_current(ticket) {
            self.counters.result_dropped();
            tracing::debug!(slot = self.label, ticket, "Dropped superseded analysis result");
            return false;
        }

        let source_id = state.result.source_asset_id.clone();
        match outcome {
            Ok((landmarks, annotated)) => {
                state.result = AnalysisResult::settled(source_id, landmarks, self.angle_mode.get());
                state.annotated = Some(annotated);
            }
            Err(e) => {
                let name = state.source.as_ref().map(|s| s.name().to_string()).unwrap_or_default();
                tracing::warn!(slot = self.label, name = %name, "Failed to decode image: {}", e);
                state.result = AnalysisResult::settled(source_id, None, self.angle_mode.get());
                state.error = Some(DECODE_FAILED_MESSAGE.to_string());
            }
        }
        true
    }

    pub async fn snapshot(&self) -> SlotState {
        self.state.read().await.clone()
    }

    pub async fn view(&self) -> SlotView {
        self.state.read().await.view()
    }

    /// Recompute angles from held landmarks; the estimator is not involved
    pub async fn recompute(&self, mode: AngleMode) {
        self.state.write().await.result.recompute(mode);
    }

    /// Drop whatever the slot shows and supersede any in-flight request
    pub async fn reset(&self) {
        self.sequence.invalidate();
        let mut state = self.state.write().await;
        if let Some(handle) = state.handle.take() {
            self.handles.release(handle.asset_id());
        }
        *state = SlotState::default();
    }

    /// Reset if the slot currently shows `asset_id`; returns whether it did
    pub async fn reset_if_showing(&self, asset_id: &str) -> bool {
        let showing = {
            let state = self.state.read().await;
            state.source.as_ref().and_then(|s| s.asset_id()) == Some(asset_id)
        };
        if showing {
            self.reset().await;
        }
        showing
    }

    /// Replace the slot's contents with a previously settled state. A gallery
    /// source takes a display handle again, as if freshly picked.
    pub async fn restore(&self, parked: SlotState) {
        self.sequence.invalidate();
        let handle = match (parked.source.as_ref().and_then(|s| s.asset_id()), &parked.blob) {
            (Some(id), Some(blob)) => Some(self.handles.acquire(id, blob)),
            _ => None,
        };

        let mut state = self.state.write().await;
        if let Some(old) = state.handle.take() {
            self.handles.release(old.asset_id());
        }
        *state = SlotState { handle, ..parked };
    }

    /// Release the display handle the slot holds; the contents stay readable
    pub async fn close(&self) {
        if let Some(handle) = self.state.write().await.handle.take() {
            self.handles.release(handle.asset_id());
        }
    }
}
