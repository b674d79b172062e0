// Session orchestrator - the Live / Browsing / Comparing mode state machine
//
// Lock order: session state, then any analysis slot. Background tasks only
// ever take one of the two.

use crate::core::analysis::{AnalysisError, AnalysisSlot, Analyzer, SlotState, SlotView};
use crate::core::asset_store::{AssetStore, StoreError};
use crate::core::camera::{stop_tracks, MediaCapture, MediaTrack};
use crate::core::comparison::{ComparisonEngine, ComparisonView, ParkedComparison, Side};
use crate::core::config::Config;
use crate::core::display_handles::{DisplayHandle, DisplayHandleCache};
use crate::core::liveness::{AngleModeCell, LivenessToken, ResultCounters, SessionStats};
use crate::core::pose_estimator::PoseEstimatorAdapter;
use crate::core::skeleton::OverlayStyle;
use crate::core::snapshot::{SnapshotComposer, SnapshotError};
use crate::models::asset::{AssetEntry, AssetSummary, SlotSource};
use crate::models::capture::RawFrame;
use crate::models::pose::{AnalysisResult, AngleMode};
use image::RgbaImage;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

pub const CAMERA_ERROR_MESSAGE: &str = "Camera access denied or unavailable.";
pub const STORE_ERROR_MESSAGE: &str = "Could not read the gallery.";
pub const ESTIMATOR_UNAVAILABLE_NOTICE: &str =
    "Pose model is not available; images will show no pose.";

// ==============================================================================
// Errors
// ==============================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Not available in {current} mode (requires {expected})")]
    NotInMode {
        expected: &'static str,
        current: &'static str,
    },

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Nothing to snapshot")]
    NothingToSnapshot,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Image rejected: {0}")]
    Image(#[from] AnalysisError),

    #[error("Worker failed: {0}")]
    Worker(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

// ==============================================================================
// Settings
// ==============================================================================

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub camera_width: u32,
    pub camera_height: u32,
    pub snapshot_dir: PathBuf,
    pub angle_mode: AngleMode,
    pub overlay: OverlayStyle,
    pub snapshot_scale: f32,
    pub font_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            camera_width: 640,
            camera_height: 480,
            snapshot_dir: std::env::temp_dir().join("posekit_snapshots"),
            angle_mode: AngleMode::Planar,
            overlay: OverlayStyle::default(),
            snapshot_scale: 1.35,
            font_path: None,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            camera_width: config.camera_width,
            camera_height: config.camera_height,
            snapshot_dir: config.snapshot_dir.clone(),
            angle_mode: config.default_angle_mode,
            overlay: OverlayStyle {
                line_width: config.overlay_line_width,
                marker_radius: config.overlay_marker_radius,
                ..OverlayStyle::default()
            },
            snapshot_scale: config.snapshot_scale,
            font_path: config.font_path.clone(),
        }
    }
}

// ==============================================================================
// Modes
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Live,
    Browsing,
    Comparing,
}

impl ModeKind {
    pub fn to_string(&self) -> &'static str {
        match self {
            ModeKind::Live => "live",
            ModeKind::Browsing => "browsing",
            ModeKind::Comparing => "comparing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivePhase {
    Starting,
    Streaming,
    Stopped,
}

struct LiveView {
    phase: LivePhase,
    token: LivenessToken,
    tracks: Vec<Arc<dyn MediaTrack>>,
    result: AnalysisResult,
    /// Latest frame with the overlay drawn
    frame: Option<RgbaImage>,
    error: Option<String>,
}

impl LiveView {
    fn new(phase: LivePhase, token: LivenessToken) -> Self {
        Self {
            phase,
            token,
            tracks: Vec::new(),
            result: AnalysisResult::empty(),
            frame: None,
            error: None,
        }
    }

    fn stop(&mut self) {
        self.token.cancel();
        stop_tracks(&self.tracks);
        self.tracks.clear();
        self.phase = LivePhase::Stopped;
    }
}

struct ListedAsset {
    summary: AssetSummary,
    handle: DisplayHandle,
}

/// Gallery listing shown by a view; holds one display handle per entry
#[derive(Default)]
struct Listing {
    items: Vec<ListedAsset>,
}

impl Listing {
    fn load(entries: &[AssetEntry], handles: &DisplayHandleCache) -> Self {
        Self {
            items: entries
                .iter()
                .map(|entry| ListedAsset {
                    summary: AssetSummary::from(entry),
                    handle: handles.acquire(&entry.id, &entry.blob),
                })
                .collect(),
        }
    }

    fn prepend(&mut self, entry: &AssetEntry, handles: &DisplayHandleCache) {
        self.items.insert(
            0,
            ListedAsset {
                summary: AssetSummary::from(entry),
                handle: handles.acquire(&entry.id, &entry.blob),
            },
        );
    }

    fn remove(&mut self, asset_id: &str, handles: &DisplayHandleCache) {
        if let Some(pos) = self.items.iter().position(|item| item.summary.id == asset_id) {
            let item = self.items.remove(pos);
            handles.release(item.handle.asset_id());
        }
    }

    fn close(&mut self, handles: &DisplayHandleCache) {
        handles.release_view(self.items.iter().map(|item| item.handle.asset_id()));
        self.items.clear();
    }

    fn view(&self) -> Vec<GalleryItem> {
        self.items
            .iter()
            .map(|item| GalleryItem {
                asset: item.summary.clone(),
                handle_uri: item.handle.uri(),
            })
            .collect()
    }
}

struct BrowseSession {
    token: LivenessToken,
    listing: Listing,
    slot: Arc<AnalysisSlot>,
    error: Option<String>,
}

struct CompareSession {
    engine: Arc<ComparisonEngine>,
    listing: Listing,
    error: Option<String>,
}

enum Mode {
    Live(LiveView),
    Browsing(BrowseSession),
    Comparing(CompareSession),
}

impl Mode {
    fn kind(&self) -> ModeKind {
        match self {
            Mode::Live(_) => ModeKind::Live,
            Mode::Browsing(_) => ModeKind::Browsing,
            Mode::Comparing(_) => ModeKind::Comparing,
        }
    }

    fn listing_mut(&mut self) -> Option<&mut Listing> {
        match self {
            Mode::Live(_) => None,
            Mode::Browsing(b) => Some(&mut b.listing),
            Mode::Comparing(c) => Some(&mut c.listing),
        }
    }
}

struct SessionState {
    mode: Mode,
    parked: ParkedComparison,
    notice: Option<String>,
}

// ==============================================================================
// Views
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryItem {
    #[serde(flatten)]
    pub asset: AssetSummary,
    pub handle_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeView {
    Live {
        phase: LivePhase,
        result: AnalysisResult,
        frame_size: Option<(u32, u32)>,
        error: Option<String>,
    },
    Browsing {
        entries: Vec<GalleryItem>,
        selection: SlotView,
        error: Option<String>,
    },
    Comparing {
        entries: Vec<GalleryItem>,
        comparison: ComparisonView,
        error: Option<String>,
    },
}

/// Outcome of a multi-file gallery upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadBatch {
    pub added: Vec<AssetSummary>,
    /// Files that were not recognisable images
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub angle_mode: AngleMode,
    pub notice: Option<String>,
    pub stats: SessionStats,
    #[serde(flatten)]
    pub mode: ModeView,
}

// ==============================================================================
// Orchestrator
// ==============================================================================

pub struct SessionOrchestrator {
    state: Arc<RwLock<SessionState>>,
    adapter: Arc<PoseEstimatorAdapter>,
    analyzer: Arc<Analyzer>,
    store: Arc<dyn AssetStore>,
    capture: Arc<dyn MediaCapture>,
    handles: Arc<DisplayHandleCache>,
    angle_mode: AngleModeCell,
    counters: Arc<ResultCounters>,
    snapshots: Arc<SnapshotComposer>,
    settings: SessionSettings,
}

impl SessionOrchestrator {
    pub fn new(
        adapter: Arc<PoseEstimatorAdapter>,
        store: Arc<dyn AssetStore>,
        capture: Arc<dyn MediaCapture>,
        settings: SessionSettings,
    ) -> Self {
        let analyzer = Arc::new(Analyzer::new(adapter.clone(), settings.overlay));
        let snapshots = Arc::new(SnapshotComposer::with_font_file(
            settings.snapshot_scale,
            settings.font_path.as_deref(),
        ));
        let state = SessionState {
            mode: Mode::Live(LiveView::new(LivePhase::Stopped, LivenessToken::new())),
            parked: ParkedComparison::default(),
            notice: None,
        };

        Self {
            state: Arc::new(RwLock::new(state)),
            adapter,
            analyzer,
            store,
            capture,
            handles: Arc::new(DisplayHandleCache::new()),
            angle_mode: AngleModeCell::new(settings.angle_mode),
            counters: Arc::new(ResultCounters::default()),
            snapshots,
            settings,
        }
    }

    pub fn display_handles(&self) -> &Arc<DisplayHandleCache> {
        &self.handles
    }

    pub fn angle_mode(&self) -> AngleMode {
        self.angle_mode.get()
    }

    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot()
    }

    pub async fn mode(&self) -> ModeKind {
        self.state.read().await.mode.kind()
    }

    // --- Live ----------------------------------------------------------------

    /// Acquire the camera and start the frame loop. Camera failure leaves the
    /// session in `Stopped` with an error; calling again retries.
    pub async fn enter_live(&self) -> LivePhase {
        let token = LivenessToken::new();
        {
            let mut state = self.state.write().await;
            if let Mode::Live(live) = &state.mode {
                if live.phase != LivePhase::Stopped {
                    return live.phase;
                }
            }
            self.teardown(&mut state).await;
            self.note_estimator(&mut state);
            state.mode = Mode::Live(LiveView::new(LivePhase::Starting, token.clone()));
            tracing::info!("Entering live mode");
        }

        let opened = self
            .capture
            .open(self.settings.camera_width, self.settings.camera_height)
            .await;
        if opened.is_ok() {
            // Each stream starts without smoothing history from the last one
            self.adapter.reset_tracking().await;
        }

        let mut state = self.state.write().await;
        let live = match &mut state.mode {
            Mode::Live(live) if token.is_live() => live,
            _ => {
                // Left live mode while the camera was being acquired
                if let Ok(feed) = &opened {
                    feed.stop_all();
                }
                return LivePhase::Stopped;
            }
        };

        match opened {
            Ok(feed) => {
                tracing::info!(tracks = feed.tracks.len(), "Camera acquired");
                live.phase = LivePhase::Streaming;
                live.tracks = feed.tracks;
                let frame_loop = FrameLoop {
                    state: self.state.clone(),
                    adapter: self.adapter.clone(),
                    analyzer: self.analyzer.clone(),
                    angle_mode: self.angle_mode.clone(),
                    counters: self.counters.clone(),
                    token,
                };
                tokio::spawn(frame_loop.run(feed.frames));
            }
            Err(e) => {
                tracing::warn!("Camera unavailable: {}", e);
                live.phase = LivePhase::Stopped;
                live.error = Some(CAMERA_ERROR_MESSAGE.to_string());
            }
        }
        live.phase
    }

    /// Stop the camera but stay in live mode
    pub async fn stop_live(&self) -> SessionResult<()> {
        let mut state = self.state.write().await;
        match &mut state.mode {
            Mode::Live(live) => {
                live.stop();
                tracing::info!("Live capture stopped");
                Ok(())
            }
            other => Err(not_in_mode(ModeKind::Live, other)),
        }
    }

    // --- Browsing ------------------------------------------------------------

    pub async fn enter_browsing(&self) {
        let mut state = self.state.write().await;
        if matches!(state.mode, Mode::Browsing(_)) {
            return;
        }
        self.teardown(&mut state).await;
        self.note_estimator(&mut state);

        let (listing, error) = self.load_listing().await;
        state.mode = Mode::Browsing(BrowseSession {
            token: LivenessToken::new(),
            listing,
            slot: Arc::new(self.new_slot("browse")),
            error,
        });
        tracing::info!("Entering browsing mode");
    }

    /// Analyse a gallery asset in the browsing slot
    pub async fn select_asset(&self, asset_id: &str) -> SessionResult<JoinHandle<bool>> {
        let state = self.state.read().await;
        let session = match &state.mode {
            Mode::Browsing(b) => b,
            other => return Err(not_in_mode(ModeKind::Browsing, other)),
        };
        let entry = self
            .store
            .get(asset_id)
            .await?
            .ok_or_else(|| SessionError::AssetNotFound(asset_id.to_string()))?;

        let source = SlotSource::Gallery {
            asset_id: entry.id,
            name: entry.name,
        };
        Ok(session.slot.start(&session.token, source, entry.blob).await)
    }

    /// Analyse an image without saving it to the gallery
    pub async fn analyze_upload(
        &self,
        bytes: Vec<u8>,
        name: &str,
    ) -> SessionResult<JoinHandle<bool>> {
        let state = self.state.read().await;
        let session = match &state.mode {
            Mode::Browsing(b) => b,
            other => return Err(not_in_mode(ModeKind::Browsing, other)),
        };
        let source = SlotSource::Upload {
            name: name.to_string(),
        };
        Ok(session.slot.start(&session.token, source, bytes).await)
    }

    /// Save an image to the gallery; the open listing shows it first
    pub async fn add_asset(&self, bytes: Vec<u8>, name: &str) -> SessionResult<AssetSummary> {
        if image::guess_format(&bytes).is_err() {
            return Err(SessionError::Image(AnalysisError::UnsupportedFormat));
        }

        let mut state = self.state.write().await;
        let entry = self.store.save(bytes, name).await.map_err(|e| {
            tracing::error!("Failed to save asset: {}", e);
            e
        })?;
        if let Some(listing) = state.mode.listing_mut() {
            listing.prepend(&entry, &self.handles);
        }
        tracing::info!(id = %entry.id, name = %entry.name, "Added asset");
        Ok(AssetSummary::from(&entry))
    }

    /// Save several files in order. Non-images are skipped and counted; a store
    /// failure stops the batch, keeping what was already saved.
    pub async fn add_assets(&self, files: Vec<(Vec<u8>, String)>) -> SessionResult<UploadBatch> {
        let mut batch = UploadBatch {
            added: Vec::new(),
            skipped: 0,
        };
        for (bytes, name) in files {
            match self.add_asset(bytes, &name).await {
                Ok(summary) => batch.added.push(summary),
                Err(SessionError::Image(_)) => {
                    tracing::debug!(name = %name, "Skipping non-image upload");
                    batch.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(
            added = batch.added.len(),
            skipped = batch.skipped,
            "Gallery upload finished"
        );
        Ok(batch)
    }

    /// Delete an asset and reset every view currently showing it
    pub async fn delete_asset(&self, asset_id: &str) -> SessionResult<()> {
        let mut state = self.state.write().await;
        self.store.delete(asset_id).await.map_err(|e| {
            tracing::error!(id = %asset_id, "Failed to delete asset: {}", e);
            e
        })?;

        if let Some(listing) = state.mode.listing_mut() {
            listing.remove(asset_id, &self.handles);
        }
        match &state.mode {
            Mode::Browsing(b) => {
                b.slot.reset_if_showing(asset_id).await;
            }
            Mode::Comparing(c) => {
                c.engine.forget_asset(asset_id).await;
            }
            Mode::Live(_) => {}
        }

        let shows = |side: &Option<SlotState>| {
            side.as_ref()
                .and_then(|s| s.source.as_ref())
                .and_then(|s| s.asset_id())
                == Some(asset_id)
        };
        if shows(&state.parked.a) {
            state.parked.a = None;
        }
        if shows(&state.parked.b) {
            state.parked.b = None;
        }

        tracing::info!(id = %asset_id, "Deleted asset");
        Ok(())
    }

    // --- Comparing -----------------------------------------------------------

    pub async fn enter_comparing(&self) {
        let mut state = self.state.write().await;
        if matches!(state.mode, Mode::Comparing(_)) {
            return;
        }
        self.teardown(&mut state).await;
        self.note_estimator(&mut state);

        let engine = Arc::new(ComparisonEngine::new(
            self.analyzer.clone(),
            self.handles.clone(),
            self.angle_mode.clone(),
            self.counters.clone(),
        ));
        let parked = std::mem::take(&mut state.parked);
        if !parked.is_empty() {
            engine.restore(parked).await;
            engine.recompute(self.angle_mode.get()).await;
        }

        let (listing, error) = self.load_listing().await;
        state.mode = Mode::Comparing(CompareSession {
            engine,
            listing,
            error,
        });
        tracing::info!("Entering comparing mode");
    }

    pub async fn compare_pick(
        &self,
        side: Side,
        asset_id: &str,
    ) -> SessionResult<JoinHandle<bool>> {
        let state = self.state.read().await;
        let session = match &state.mode {
            Mode::Comparing(c) => c,
            other => return Err(not_in_mode(ModeKind::Comparing, other)),
        };
        let entry = self
            .store
            .get(asset_id)
            .await?
            .ok_or_else(|| SessionError::AssetNotFound(asset_id.to_string()))?;

        let source = SlotSource::Gallery {
            asset_id: entry.id,
            name: entry.name,
        };
        Ok(session.engine.load_side(side, source, entry.blob).await)
    }

    pub async fn compare_upload(
        &self,
        side: Side,
        bytes: Vec<u8>,
        name: &str,
    ) -> SessionResult<JoinHandle<bool>> {
        let state = self.state.read().await;
        let session = match &state.mode {
            Mode::Comparing(c) => c,
            other => return Err(not_in_mode(ModeKind::Comparing, other)),
        };
        let source = SlotSource::Upload {
            name: name.to_string(),
        };
        Ok(session.engine.load_side(side, source, bytes).await)
    }

    // --- Shared --------------------------------------------------------------

    /// Switch planar/spatial and recompute every populated slot from the
    /// landmarks it already holds
    pub async fn set_angle_mode(&self, mode: AngleMode) {
        self.angle_mode.set(mode);
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match &mut state.mode {
            Mode::Live(live) => live.result.recompute(mode),
            Mode::Browsing(b) => b.slot.recompute(mode).await,
            Mode::Comparing(c) => c.engine.recompute(mode).await,
        }
        for side in [&mut state.parked.a, &mut state.parked.b].into_iter().flatten() {
            side.result.recompute(mode);
        }
        tracing::debug!(mode = mode.to_string(), "Angle mode changed");
    }

    /// Write the displayed image with its angle panel to the snapshot directory
    pub async fn save_snapshot(&self) -> SessionResult<PathBuf> {
        let (frame, angles) = {
            let state = self.state.read().await;
            match &state.mode {
                Mode::Live(live) => match (&live.frame, live.result.has_pose()) {
                    (Some(frame), true) => (frame.clone(), live.result.angles.clone()),
                    _ => return Err(SessionError::NothingToSnapshot),
                },
                Mode::Browsing(b) => {
                    let slot = b.slot.snapshot().await;
                    let settled = slot.is_settled();
                    match (slot.annotated, settled) {
                        (Some(frame), true) => (frame, slot.result.angles),
                        _ => return Err(SessionError::NothingToSnapshot),
                    }
                }
                other => return Err(not_in_mode(ModeKind::Browsing, other)),
            }
        };

        let composer = self.snapshots.clone();
        let dir = self.settings.snapshot_dir.clone();
        let path = tokio::task::spawn_blocking(move || composer.export(&dir, &frame, &angles))
            .await
            .map_err(|e| SessionError::Worker(e.to_string()))??;
        Ok(path)
    }

    /// The image currently shown: the latest live frame or the browsing selection
    pub async fn displayed_image(&self) -> Option<RgbaImage> {
        let state = self.state.read().await;
        match &state.mode {
            Mode::Live(live) => live.frame.clone(),
            Mode::Browsing(b) => b.slot.snapshot().await.annotated,
            Mode::Comparing(_) => None,
        }
    }

    pub async fn view(&self) -> SessionView {
        let state = self.state.read().await;
        let mode = match &state.mode {
            Mode::Live(live) => ModeView::Live {
                phase: live.phase,
                result: live.result.clone(),
                frame_size: live.frame.as_ref().map(|f| f.dimensions()),
                error: live.error.clone(),
            },
            Mode::Browsing(b) => ModeView::Browsing {
                entries: b.listing.view(),
                selection: b.slot.view().await,
                error: b.error.clone(),
            },
            Mode::Comparing(c) => ModeView::Comparing {
                entries: c.listing.view(),
                comparison: c.engine.view().await,
                error: c.error.clone(),
            },
        };
        SessionView {
            angle_mode: self.angle_mode.get(),
            notice: state.notice.clone(),
            stats: self.counters.snapshot(),
            mode,
        }
    }

    /// Tear down the current mode; the session stays in a clean stopped state
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        self.teardown(&mut state).await;
        state.mode = Mode::Live(LiveView::new(LivePhase::Stopped, LivenessToken::new()));
        tracing::info!("Session shut down");
    }

    async fn teardown(&self, state: &mut SessionState) {
        match &mut state.mode {
            Mode::Live(live) => live.stop(),
            Mode::Browsing(b) => {
                b.token.cancel();
                b.slot.close().await;
                b.listing.close(&self.handles);
            }
            Mode::Comparing(c) => {
                state.parked = c.engine.close().await;
                c.listing.close(&self.handles);
            }
        }
        tracing::debug!(mode = state.mode.kind().to_string(), "Tore down mode");
    }

    fn note_estimator(&self, state: &mut SessionState) {
        if state.notice.is_none() && !self.adapter.is_available() {
            self.adapter.report_unavailable();
            state.notice = Some(ESTIMATOR_UNAVAILABLE_NOTICE.to_string());
        }
    }

    async fn load_listing(&self) -> (Listing, Option<String>) {
        match self.store.list().await {
            Ok(entries) => (Listing::load(&entries, &self.handles), None),
            Err(e) => {
                tracing::error!("Failed to list assets: {}", e);
                (Listing::default(), Some(STORE_ERROR_MESSAGE.to_string()))
            }
        }
    }

    fn new_slot(&self, label: &'static str) -> AnalysisSlot {
        AnalysisSlot::new(
            label,
            self.analyzer.clone(),
            self.handles.clone(),
            self.angle_mode.clone(),
            self.counters.clone(),
        )
    }
}

fn not_in_mode(expected: ModeKind, current: &Mode) -> SessionError {
    SessionError::NotInMode {
        expected: expected.to_string(),
        current: current.kind().to_string(),
    }
}

/// Sequential live inference: frame n+1 is not requested until frame n's
/// result has been applied or dropped
struct FrameLoop {
    state: Arc<RwLock<SessionState>>,
    adapter: Arc<PoseEstimatorAdapter>,
    analyzer: Arc<Analyzer>,
    angle_mode: AngleModeCell,
    counters: Arc<ResultCounters>,
    token: LivenessToken,
}

impl FrameLoop {
    async fn run(self, mut frames: mpsc::Receiver<RawFrame>) {
        tracing::debug!("Frame loop started");
        loop {
            let frame = tokio::select! {
                _ = self.token.cancelled() => break,
                frame = frames.recv() => frame,
            };
            let Some(frame) = frame else {
                self.stream_ended().await;
                break;
            };

            let Some(mut image) = frame.to_rgba_image() else {
                tracing::warn!(
                    width = frame.width,
                    height = frame.height,
                    "Malformed camera frame"
                );
                continue;
            };

            let landmarks = tokio::select! {
                _ = self.token.cancelled() => {
                    self.counters.result_dropped();
                    tracing::debug!("Dropped in-flight frame result after cancellation");
                    break;
                }
                landmarks = self.adapter.analyze(&frame, true) => landmarks,
            };

            if let Some(lm) = &landmarks {
                self.analyzer.render(&mut image, lm);
            }

            let mut state = self.state.write().await;
            let live = match &mut state.mode {
                Mode::Live(live) if self.token.is_live() => live,
                _ => {
                    self.counters.result_dropped();
                    tracing::debug!("Dropped frame result for a closed session");
                    break;
                }
            };
            live.result = AnalysisResult::settled(None, landmarks, self.angle_mode.get());
            live.frame = Some(image);
            self.counters.frame_applied();
        }
        tracing::debug!("Frame loop finished");
    }

    async fn stream_ended(&self) {
        let mut state = self.state.write().await;
        if let Mode::Live(live) = &mut state.mode {
            if self.token.is_live() {
                tracing::warn!("Camera stream ended");
                live.stop();
            }
        }
    }
}
