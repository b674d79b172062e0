// Data models for body-pose landmarks, joint angles and analysis results

use serde::{Deserialize, Serialize};

// ==============================================================================
// Landmarks (33 keypoints)
// ==============================================================================

/// Number of landmarks in a full body pose
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Landmarks whose visibility is below this are treated as occluded
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// A single tracked body point.
///
/// `x` and `y` are normalized to the source image (`[0, 1]` per axis), `z` is a
/// relative depth estimate with no fixed unit. `visibility` is the estimator's
/// confidence that the point is unoccluded; some estimators omit it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn with_visibility(mut self, visibility: f32) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// A landmark without a visibility score is always considered visible
    pub fn is_visible(&self) -> bool {
        self.visibility.map_or(true, |v| v >= VISIBILITY_THRESHOLD)
    }
}

/// BlazePose landmark indices (33 total). The numbering is fixed by the
/// estimator and must not be changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub const fn index(self) -> usize {
        self as usize
    }
}

// ==============================================================================
// Joint Angles
// ==============================================================================

/// Which coordinates participate in an angle computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleMode {
    /// `x, y` only; matches what is drawn on screen
    #[default]
    Planar,
    /// `x, y, z`
    Spatial,
}

impl AngleMode {
    pub fn to_string(&self) -> &'static str {
        match self {
            AngleMode::Planar => "planar",
            AngleMode::Spatial => "spatial",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "planar" | "2d" => Ok(AngleMode::Planar),
            "spatial" | "3d" => Ok(AngleMode::Spatial),
            _ => Err(format!("Unknown angle mode: {}", s)),
        }
    }
}

/// Static catalog entry naming a joint and the landmark triple that defines it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JointAngleSpec {
    pub name: &'static str,
    /// (proximal, joint, distal); the angle is measured at the middle landmark
    pub joint_triple: (usize, usize, usize),
    pub description: &'static str,
}

/// One computed joint angle. `None` means undeterminable, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointAngleRow {
    pub name: String,
    pub value: Option<f64>,
}

impl JointAngleRow {
    /// Display text for the value column: `"170.0°"` or `"—"`
    pub fn display_value(&self) -> String {
        match self.value {
            Some(v) => format!("{:.1}°", v),
            None => "—".to_string(),
        }
    }
}

/// Per-joint difference between comparison sides (A minus B)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleDiffRow {
    pub name: String,
    pub diff: Option<f64>,
}

impl AngleDiffRow {
    /// Signed display text: `"+20.0°"`, `"-3.5°"` or `"—"`
    pub fn display_value(&self) -> String {
        match self.diff {
            Some(d) if d > 0.0 => format!("+{:.1}°", d),
            Some(d) => format!("{:.1}°", d),
            None => "—".to_string(),
        }
    }
}

// ==============================================================================
// Analysis Result
// ==============================================================================

/// Outcome of one analysis request. Superseded wholesale on every new request.
///
/// `landmarks == None` with `is_loading == false` means the analysis finished and
/// no pose was detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub source_asset_id: Option<String>,
    pub landmarks: Option<Vec<Landmark>>,
    pub angles: Vec<JointAngleRow>,
    pub is_loading: bool,
}

// ==============================================================================
// Estimator Configuration
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstimatorConfig {
    /// Smooth landmarks across consecutive frames (live capture only)
    pub temporal_smoothing: bool,
    pub model_complexity: ModelComplexity,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelComplexity {
    Lite = 0,   // Fastest, less accurate
    Full = 1,   // Balanced
    Heavy = 2,  // Slowest, most accurate
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            temporal_smoothing: false,
            model_complexity: ModelComplexity::Full,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

impl EstimatorConfig {
    pub fn with_smoothing(&self, temporal_smoothing: bool) -> Self {
        Self {
            temporal_smoothing,
            ..self.clone()
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose estimator not available")]
    Unavailable,

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}

pub type PoseResult<T> = Result<T, PoseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_visibility() {
        assert!(Landmark::new(0.5, 0.5, 0.0).is_visible());
        assert!(Landmark::new(0.5, 0.5, 0.0).with_visibility(0.5).is_visible());
        assert!(!Landmark::new(0.5, 0.5, 0.0).with_visibility(0.2).is_visible());
    }

    #[test]
    fn test_landmark_json_without_visibility() {
        let lm: Landmark = serde_json::from_str(r#"{"x":0.1,"y":0.2,"z":-0.3}"#).unwrap();
        assert_eq!(lm.visibility, None);

        let json = serde_json::to_string(&lm).unwrap();
        assert!(!json.contains("visibility"));
    }

    #[test]
    fn test_row_display() {
        let row = JointAngleRow { name: "Left elbow".into(), value: Some(170.04) };
        assert_eq!(row.display_value(), "170.0°");

        let row = JointAngleRow { name: "Left elbow".into(), value: None };
        assert_eq!(row.display_value(), "—");
    }

    #[test]
    fn test_diff_display_sign() {
        let up = AngleDiffRow { name: "Left elbow".into(), diff: Some(20.0) };
        let down = AngleDiffRow { name: "Left elbow".into(), diff: Some(-3.5) };
        let none = AngleDiffRow { name: "Left elbow".into(), diff: None };
        assert_eq!(up.display_value(), "+20.0°");
        assert_eq!(down.display_value(), "-3.5°");
        assert_eq!(none.display_value(), "—");
    }

    #[test]
    fn test_angle_mode_parsing() {
        assert_eq!(AngleMode::from_string("2D").unwrap(), AngleMode::Planar);
        assert_eq!(AngleMode::from_string("spatial").unwrap(), AngleMode::Spatial);
        assert!(AngleMode::from_string("4d").is_err());
    }

    #[test]
    fn test_estimator_config_default() {
        let config = EstimatorConfig::default();
        assert!(!config.temporal_smoothing);
        assert_eq!(config.min_detection_confidence, 0.5);
        assert_eq!(config.model_complexity, ModelComplexity::Full);
        assert!(config.with_smoothing(true).temporal_smoothing);
    }
}
