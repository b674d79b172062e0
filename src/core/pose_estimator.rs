// Pose estimator capability and the adapter the session talks to

use crate::models::capture::RawFrame;
use crate::models::pose::{EstimatorConfig, Landmark, PoseResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// External pose estimation capability
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    /// Whether the model is loaded and usable
    fn is_available(&self) -> bool;

    /// Estimate one pose for a frame. `Ok(None)` when no body was found.
    async fn analyze(
        &self,
        frame: &RawFrame,
        config: &EstimatorConfig,
    ) -> PoseResult<Option<Vec<Landmark>>>;

    /// Forget temporal tracking state before a new live stream
    async fn reset_tracking(&self) {}

    fn model_info(&self) -> String {
        "unknown".to_string()
    }
}

/// Normalises estimator outcomes to "landmarks or none".
///
/// Unavailability and inference errors are data conditions here: they resolve
/// to `None` and are logged, never returned.
pub struct PoseEstimatorAdapter {
    estimator: Arc<dyn PoseEstimator>,
    base_config: EstimatorConfig,
    unavailable_reported: AtomicBool,
    calls: AtomicU64,
    failures: AtomicU64,
}

impl PoseEstimatorAdapter {
    pub fn new(estimator: Arc<dyn PoseEstimator>, base_config: EstimatorConfig) -> Self {
        Self {
            estimator,
            base_config,
            unavailable_reported: AtomicBool::new(false),
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.estimator.is_available()
    }

    /// Run one estimation. `temporal_smoothing` is on for live capture and
    /// off for single-shot analysis.
    pub async fn analyze(
        &self,
        frame: &RawFrame,
        temporal_smoothing: bool,
    ) -> Option<Vec<Landmark>> {
        if !self.estimator.is_available() {
            self.report_unavailable();
            return None;
        }

        self.calls.fetch_add(1, Ordering::Relaxed);
        let config = self.base_config.with_smoothing(temporal_smoothing);
        match self.estimator.analyze(frame, &config).await {
            Ok(Some(landmarks)) if !landmarks.is_empty() => Some(landmarks),
            Ok(_) => None,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Pose estimation failed: {}", e);
                None
            }
        }
    }

    /// Start smoothing afresh for a new camera stream
    pub async fn reset_tracking(&self) {
        if self.estimator.is_available() {
            self.estimator.reset_tracking().await;
        }
    }

    /// Log unavailability once; returns true the first time
    pub fn report_unavailable(&self) -> bool {
        let first = !self.unavailable_reported.swap(true, Ordering::AcqRel);
        if first {
            tracing::warn!(
                model = %self.estimator.model_info(),
                "Pose estimator not available; analysis will report no pose"
            );
        }
        first
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
