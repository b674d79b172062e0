// Pose estimation platform integration
// Provides the MediaPipe bridge and its async estimator wrapper

pub mod mediapipe_bridge;

pub use mediapipe_bridge::{BridgeEstimator, DefaultMediaPipe, DummyMediaPipe, MediaPipeBridge};
