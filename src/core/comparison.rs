// Two-sided comparison: independent A/B analysis slots and the A minus B diff

use crate::core::analysis::{AnalysisSlot, Analyzer, SlotState, SlotView};
use crate::core::angles::diff_angles;
use crate::core::display_handles::DisplayHandleCache;
use crate::core::liveness::{AngleModeCell, LivenessToken, ResultCounters};
use crate::models::asset::SlotSource;
use crate::models::pose::{AngleDiffRow, AngleMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn to_string(&self) -> &'static str {
        match self {
            Side::A => "a",
            Side::B => "b",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "a" => Ok(Side::A),
            "b" => Ok(Side::B),
            _ => Err(format!("Unknown comparison side: {}", s)),
        }
    }
}

/// Settled sides kept across a switch away from comparison
#[derive(Debug, Clone, Default)]
pub struct ParkedComparison {
    pub a: Option<SlotState>,
    pub b: Option<SlotState>,
}

impl ParkedComparison {
    pub fn is_empty(&self) -> bool {
        self.a.is_none() && self.b.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonView {
    pub a: SlotView,
    pub b: SlotView,
    /// Present once both sides settled with a pose
    pub diff: Option<Vec<AngleDiffRow>>,
}

pub struct ComparisonEngine {
    token: LivenessToken,
    a: Arc<AnalysisSlot>,
    b: Arc<AnalysisSlot>,
}

impl ComparisonEngine {
    pub fn new(
        analyzer: Arc<Analyzer>,
        handles: Arc<DisplayHandleCache>,
        angle_mode: AngleModeCell,
        counters: Arc<ResultCounters>,
    ) -> Self {
        let slot = |label: &'static str| {
            Arc::new(AnalysisSlot::new(
                label,
                analyzer.clone(),
                handles.clone(),
                angle_mode.clone(),
                counters.clone(),
            ))
        };
        Self {
            token: LivenessToken::new(),
            a: slot("compare-a"),
            b: slot("compare-b"),
        }
    }

    pub fn token(&self) -> &LivenessToken {
        &self.token
    }

    pub fn slot(&self, side: Side) -> &Arc<AnalysisSlot> {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    /// Start analysing `bytes` on one side. The other side is untouched.
    pub async fn load_side(
        &self,
        side: Side,
        source: SlotSource,
        bytes: Vec<u8>,
    ) -> JoinHandle<bool> {
        tracing::debug!(side = side.to_string(), name = %source.name(), "Loading comparison side");
        self.slot(side).start(&self.token, source, bytes).await
    }

    /// Per-joint A minus B, once both sides have settled with a pose
    pub async fn diff(&self) -> Option<Vec<AngleDiffRow>> {
        let a = self.a.snapshot().await;
        let b = self.b.snapshot().await;
        if a.result.has_pose() && b.result.has_pose() {
            Some(diff_angles(&a.result.angles, &b.result.angles))
        } else {
            None
        }
    }

    pub async fn recompute(&self, mode: AngleMode) {
        self.a.recompute(mode).await;
        self.b.recompute(mode).await;
    }

    /// Reset any side showing `asset_id`
    pub async fn forget_asset(&self, asset_id: &str) -> bool {
        let a = self.a.reset_if_showing(asset_id).await;
        let b = self.b.reset_if_showing(asset_id).await;
        a || b
    }

    pub async fn view(&self) -> ComparisonView {
        ComparisonView {
            a: self.a.view().await,
            b: self.b.view().await,
            diff: self.diff().await,
        }
    }

    /// Cancel in-flight loads, release handles, and hand back the settled sides
    pub async fn close(&self) -> ParkedComparison {
        self.token.cancel();
        self.a.close().await;
        self.b.close().await;

        let keep = |state: SlotState| state.is_settled().then_some(state);
        ParkedComparison {
            a: keep(self.a.snapshot().await),
            b: keep(self.b.snapshot().await),
        }
    }

    pub async fn restore(&self, parked: ParkedComparison) {
        if let Some(a) = parked.a {
            self.a.restore(a).await;
        }
        if let Some(b) = parked.b {
            self.b.restore(b).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pose_estimator::PoseEstimatorAdapter;
    use crate::core::skeleton::OverlayStyle;
    use crate::core::testing::{png_bytes, pose_with_left_elbow, wait_until, ScriptedEstimator};
    use crate::models::pose::{EstimatorConfig, Landmark};

    fn engine(estimator: Arc<ScriptedEstimator>) -> ComparisonEngine {
        let adapter = Arc::new(PoseEstimatorAdapter::new(estimator, EstimatorConfig::default()));
        ComparisonEngine::new(
            Arc::new(Analyzer::new(adapter, OverlayStyle::default())),
            Arc::new(DisplayHandleCache::new()),
            AngleModeCell::new(AngleMode::Planar),
            Arc::new(ResultCounters::default()),
        )
    }

    fn upload(name: &str) -> SlotSource {
        SlotSource::Upload {
            name: name.to_string(),
        }
    }

    fn occlude_left_wrist(mut pose: Vec<Landmark>) -> Vec<Landmark> {
        pose[crate::models::pose::BodyLandmark::LeftWrist.index()].visibility = Some(0.1);
        pose
    }

    #[test]
    fn test_side_strings() {
        assert_eq!(Side::from_string("A"), Ok(Side::A));
        assert_eq!(Side::B.to_string(), "b");
        assert!(Side::from_string("c").is_err());
    }

    #[tokio::test]
    async fn test_diff_is_a_minus_b() {
        let estimator = Arc::new(ScriptedEstimator::new());
        estimator.push_immediate(Some(pose_with_left_elbow(170.0)));
        estimator.push_immediate(Some(pose_with_left_elbow(150.0)));
        let engine = engine(estimator);

        engine.load_side(Side::A, upload("a.png"), png_bytes(8, 8)).await.await.unwrap();
        assert!(engine.diff().await.is_none());
        engine.load_side(Side::B, upload("b.png"), png_bytes(8, 8)).await.await.unwrap();

        let diff = engine.diff().await.expect("both sides settled");
        assert_eq!(diff.len(), 10);
        assert_eq!(diff[0].name, "Left elbow");
        assert!((diff[0].diff.unwrap() - 20.0).abs() < 1e-3);
        assert_eq!(diff[0].display_value(), "+20.0°");
    }

    #[tokio::test]
    async fn test_diff_row_null_when_one_side_null() {
        let estimator = Arc::new(ScriptedEstimator::new());
        estimator.push_immediate(Some(pose_with_left_elbow(170.0)));
        estimator.push_immediate(Some(occlude_left_wrist(pose_with_left_elbow(150.0))));
        let engine = engine(estimator);

        engine.load_side(Side::A, upload("a.png"), png_bytes(8, 8)).await.await.unwrap();
        engine.load_side(Side::B, upload("b.png"), png_bytes(8, 8)).await.await.unwrap();

        let diff = engine.diff().await.unwrap();
        assert_eq!(diff[0].diff, None);
        assert_eq!(diff[0].display_value(), "—");
    }

    #[tokio::test]
    async fn test_no_diff_without_pose_on_both_sides() {
        let estimator = Arc::new(ScriptedEstimator::new());
        estimator.push_immediate(Some(pose_with_left_elbow(170.0)));
        estimator.push_immediate(None);
        let engine = engine(estimator);

        engine.load_side(Side::A, upload("a.png"), png_bytes(8, 8)).await.await.unwrap();
        engine.load_side(Side::B, upload("b.png"), png_bytes(8, 8)).await.await.unwrap();
        assert!(engine.diff().await.is_none());
    }

    #[tokio::test]
    async fn test_sides_are_isolated() {
        let estimator = Arc::new(ScriptedEstimator::new());
        let a_reply = estimator.push_deferred();
        estimator.push_immediate(Some(pose_with_left_elbow(100.0)));
        estimator.push_immediate(Some(pose_with_left_elbow(110.0)));
        let engine = engine(estimator.clone());

        let a_task = engine.load_side(Side::A, upload("a.png"), png_bytes(8, 8)).await;
        wait_until(|| estimator.call_count() == 1).await;

        // Re-select B twice while A is still in flight
        engine.load_side(Side::B, upload("b1.png"), png_bytes(8, 8)).await.await.unwrap();
        engine.load_side(Side::B, upload("b2.png"), png_bytes(8, 8)).await.await.unwrap();
        assert!(engine.slot(Side::A).snapshot().await.result.is_loading);

        let _ = a_reply.send(Some(pose_with_left_elbow(160.0)));
        assert!(a_task.await.unwrap());

        let a = engine.slot(Side::A).snapshot().await;
        let b = engine.slot(Side::B).snapshot().await;
        assert!((a.result.angles[0].value.unwrap() - 160.0).abs() < 1e-3);
        assert!((b.result.angles[0].value.unwrap() - 110.0).abs() < 1e-3);
        assert_eq!(b.source.map(|s| s.name().to_string()).as_deref(), Some("b2.png"));
    }

    #[tokio::test]
    async fn test_close_parks_only_settled_sides() {
        let estimator = Arc::new(ScriptedEstimator::new());
        estimator.push_immediate(Some(pose_with_left_elbow(90.0)));
        let _pending = estimator.push_deferred();
        let engine = engine(estimator.clone());

        engine.load_side(Side::A, upload("a.png"), png_bytes(8, 8)).await.await.unwrap();
        let b_task = engine.load_side(Side::B, upload("b.png"), png_bytes(8, 8)).await;
        wait_until(|| estimator.call_count() == 2).await;

        let parked = engine.close().await;
        assert!(!b_task.await.unwrap());
        assert!(parked.a.is_some());
        assert!(parked.b.is_none());

        let reopened = self::engine(Arc::new(ScriptedEstimator::new()));
        reopened.restore(parked).await;
        let a = reopened.slot(Side::A).snapshot().await;
        assert!(a.result.has_pose());
        assert_eq!(a.source.map(|s| s.name().to_string()).as_deref(), Some("a.png"));
    }

    #[tokio::test]
    async fn test_recompute_switches_mode_without_estimator() {
        let estimator = Arc::new(ScriptedEstimator::new());
        let mut pose = pose_with_left_elbow(180.0);
        pose[crate::models::pose::BodyLandmark::LeftWrist.index()].z = 0.2;
        estimator.push_immediate(Some(pose));
        let engine = engine(estimator.clone());

        engine.load_side(Side::A, upload("a.png"), png_bytes(8, 8)).await.await.unwrap();
        let planar = engine.slot(Side::A).snapshot().await.result.angles[0].value.unwrap();
        assert!((planar - 180.0).abs() < 1e-3);

        engine.recompute(AngleMode::Spatial).await;
        let spatial = engine.slot(Side::A).snapshot().await.result.angles[0].value.unwrap();
        assert!(spatial < 179.0);
        assert_eq!(estimator.call_count(), 1);
    }
}
