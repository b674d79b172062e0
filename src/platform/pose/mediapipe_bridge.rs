// MediaPipe integration bridge
// Abstracts a blocking pose-landmark backend and exposes it as an async PoseEstimator

use crate::core::pose_estimator::PoseEstimator;
use crate::models::capture::RawFrame;
use crate::models::pose::{EstimatorConfig, Landmark, PoseError, PoseResult};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// MediaPipe bridge trait
/// Implement this for an inference backend. Calls block; `BridgeEstimator`
/// moves them onto the blocking pool.
pub trait MediaPipeBridge: Send + Sync {
    /// Initialize the model with a fixed configuration
    fn new(config: &EstimatorConfig) -> PoseResult<Self>
    where
        Self: Sized;

    /// Run inference on a frame; `None` when no body was found
    fn process_frame(&self, frame: &RawFrame) -> PoseResult<Option<Vec<Landmark>>>;

    /// Check if models are loaded
    fn is_initialized(&self) -> bool;

    /// Get model info
    fn get_model_info(&self) -> String;
}

// ==============================================================================
// Dummy Implementation (no model available)
// ==============================================================================

pub struct DummyMediaPipe {
    config: EstimatorConfig,
}

impl MediaPipeBridge for DummyMediaPipe {
    fn new(config: &EstimatorConfig) -> PoseResult<Self> {
        tracing::info!("Using dummy MediaPipe implementation (no inference)");
        Ok(Self {
            config: config.clone(),
        })
    }

    fn process_frame(&self, _frame: &RawFrame) -> PoseResult<Option<Vec<Landmark>>> {
        Err(PoseError::Unavailable)
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn get_model_info(&self) -> String {
        format!(
            "Dummy MediaPipe (no ML inference, smoothing={})",
            self.config.temporal_smoothing
        )
    }
}

// ==============================================================================
// Default Backend Selection
// ==============================================================================

pub type DefaultMediaPipe = DummyMediaPipe;

// ==============================================================================
// Async Estimator
// ==============================================================================

/// Runs a bridge backend as a `PoseEstimator`.
///
/// Smoothed (live) and unsmoothed (single-shot) requests go to separate
/// backend instances so temporal state never leaks between the two. The
/// smoothed instance is rebuilt for every live stream.
pub struct BridgeEstimator<B: MediaPipeBridge> {
    config: EstimatorConfig,
    smoothed: RwLock<Option<Arc<B>>>,
    still: Option<Arc<B>>,
}

impl<B: MediaPipeBridge + 'static> BridgeEstimator<B> {
    pub fn new(config: &EstimatorConfig) -> Self {
        Self {
            config: config.clone(),
            smoothed: RwLock::new(Self::load(&config.with_smoothing(true))),
            still: Self::load(&config.with_smoothing(false)),
        }
    }

    fn load(config: &EstimatorConfig) -> Option<Arc<B>> {
        match B::new(config) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(e) => {
                tracing::warn!(
                    smoothing = config.temporal_smoothing,
                    "Failed to load pose backend: {}",
                    e
                );
                None
            }
        }
    }

    fn backend(&self, temporal_smoothing: bool) -> Option<Arc<B>> {
        if temporal_smoothing {
            self.smoothed.read().ok().and_then(|slot| slot.clone())
        } else {
            self.still.clone()
        }
    }
}

#[async_trait]
impl<B: MediaPipeBridge + 'static> PoseEstimator for BridgeEstimator<B> {
    fn is_available(&self) -> bool {
        let ready = |backend: Option<Arc<B>>| backend.map_or(false, |b| b.is_initialized());
        ready(self.backend(true)) && ready(self.backend(false))
    }

    async fn analyze(
        &self,
        frame: &RawFrame,
        config: &EstimatorConfig,
    ) -> PoseResult<Option<Vec<Landmark>>> {
        let backend = self
            .backend(config.temporal_smoothing)
            .filter(|b| b.is_initialized())
            .ok_or(PoseError::Unavailable)?;

        if frame.width == 0 || frame.height == 0 {
            return Err(PoseError::InvalidFrame("empty frame".to_string()));
        }

        let frame = frame.clone();
        tokio::task::spawn_blocking(move || backend.process_frame(&frame))
            .await
            .map_err(|e| PoseError::InferenceFailed(format!("Backend task failed: {}", e)))?
    }

    async fn reset_tracking(&self) {
        let config = self.config.with_smoothing(true);
        let fresh = match tokio::task::spawn_blocking(move || Self::load(&config)).await {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!("Failed to reload smoothed pose backend: {}", e);
                return;
            }
        };
        match self.smoothed.write() {
            Ok(mut slot) => *slot = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        tracing::debug!("Pose tracking state reset");
    }

    fn model_info(&self) -> String {
        self.still
            .as_ref()
            .map(|b| b.get_model_info())
            .unwrap_or_else(|| "no backend loaded".to_string())
    }
}
