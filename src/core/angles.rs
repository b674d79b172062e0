//! Maps a landmark set to the ordered joint-angle rows of the catalog.

use crate::core::geometry::{angle_at_joint, JOINT_ANGLES};
use crate::models::pose::{AngleDiffRow, AnalysisResult, AngleMode, JointAngleRow, Landmark};

/// Compute one row per catalog entry, in catalog order.
///
/// A row is `None` when any landmark of its triple is missing or below the
/// visibility threshold, even if the geometry would yield a value.
pub fn compute_angles(landmarks: &[Landmark], mode: AngleMode) -> Vec<JointAngleRow> {
    JOINT_ANGLES
        .iter()
        .map(|spec| {
            let (i, j, k) = spec.joint_triple;
            let value = match (landmarks.get(i), landmarks.get(j), landmarks.get(k)) {
                (Some(a), Some(b), Some(c))
                    if a.is_visible() && b.is_visible() && c.is_visible() =>
                {
                    angle_at_joint(a, b, c, mode)
                }
                _ => None,
            };
            JointAngleRow {
                name: spec.name.to_string(),
                value,
            }
        })
        .collect()
}

/// Catalog rows with every value `None`
pub fn empty_angles() -> Vec<JointAngleRow> {
    JOINT_ANGLES
        .iter()
        .map(|spec| JointAngleRow {
            name: spec.name.to_string(),
            value: None,
        })
        .collect()
}

/// Row-wise `a - b`; `None` unless both sides hold a value
pub fn diff_angles(a: &[JointAngleRow], b: &[JointAngleRow]) -> Vec<AngleDiffRow> {
    a.iter()
        .enumerate()
        .map(|(idx, row_a)| {
            let value_b = b.get(idx).and_then(|row| row.value);
            AngleDiffRow {
                name: row_a.name.clone(),
                diff: match (row_a.value, value_b) {
                    (Some(va), Some(vb)) => Some(va - vb),
                    _ => None,
                },
            }
        })
        .collect()
}

impl AnalysisResult {
    /// Initial and reset state: settled, nothing detected
    pub fn empty() -> Self {
        Self {
            source_asset_id: None,
            landmarks: None,
            angles: empty_angles(),
            is_loading: false,
        }
    }

    pub fn loading(source_asset_id: Option<String>) -> Self {
        Self {
            source_asset_id,
            landmarks: None,
            angles: empty_angles(),
            is_loading: true,
        }
    }

    pub fn settled(
        source_asset_id: Option<String>,
        landmarks: Option<Vec<Landmark>>,
        mode: AngleMode,
    ) -> Self {
        let angles = match &landmarks {
            Some(lm) => compute_angles(lm, mode),
            None => empty_angles(),
        };
        Self {
            source_asset_id,
            landmarks,
            angles,
            is_loading: false,
        }
    }

    /// Settled with a detected pose
    pub fn has_pose(&self) -> bool {
        !self.is_loading && self.landmarks.is_some()
    }

    /// Re-derive angles from the held landmarks; no-op while loading or without a pose
    pub fn recompute(&mut self, mode: AngleMode) {
        if self.is_loading {
            return;
        }
        if let Some(lm) = &self.landmarks {
            self.angles = compute_angles(lm, mode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::{BodyLandmark, POSE_LANDMARK_COUNT};

    /// Standing figure with arms out to the sides and straight legs
    fn standing_pose() -> Vec<Landmark> {
        let mut lm = vec![Landmark::new(0.5, 0.5, 0.0).with_visibility(0.9); POSE_LANDMARK_COUNT];
        let mut set = |idx: BodyLandmark, x: f32, y: f32| {
            lm[idx.index()] = Landmark::new(x, y, 0.0).with_visibility(0.9);
        };
        set(BodyLandmark::Nose, 0.5, 0.1);
        set(BodyLandmark::LeftShoulder, 0.4, 0.25);
        set(BodyLandmark::RightShoulder, 0.6, 0.25);
        set(BodyLandmark::LeftElbow, 0.3, 0.25);
        set(BodyLandmark::RightElbow, 0.7, 0.25);
        set(BodyLandmark::LeftWrist, 0.2, 0.25);
        set(BodyLandmark::RightWrist, 0.8, 0.25);
        set(BodyLandmark::LeftHip, 0.45, 0.55);
        set(BodyLandmark::RightHip, 0.55, 0.55);
        set(BodyLandmark::LeftKnee, 0.45, 0.75);
        set(BodyLandmark::RightKnee, 0.55, 0.75);
        set(BodyLandmark::LeftAnkle, 0.45, 0.95);
        set(BodyLandmark::RightAnkle, 0.55, 0.95);
        lm
    }

    #[test]
    fn test_rows_follow_catalog() {
        let rows = compute_angles(&standing_pose(), AngleMode::Planar);
        assert_eq!(rows.len(), JOINT_ANGLES.len());
        for (row, spec) in rows.iter().zip(JOINT_ANGLES.iter()) {
            assert_eq!(row.name, spec.name);
        }

        let left_elbow = rows[0].value.unwrap();
        let left_knee = rows[2].value.unwrap();
        assert!((left_elbow - 180.0).abs() < 1e-4);
        assert!((left_knee - 180.0).abs() < 1e-4);
    }

    #[test]
    fn test_incomplete_pose_keeps_shape() {
        let partial = &standing_pose()[..12];
        let rows = compute_angles(partial, AngleMode::Spatial);
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.value.is_none()));

        assert_eq!(compute_angles(&[], AngleMode::Planar).len(), 10);
    }

    #[test]
    fn test_low_visibility_gates_row() {
        let mut lm = standing_pose();
        lm[BodyLandmark::LeftWrist.index()].visibility = Some(0.2);

        let rows = compute_angles(&lm, AngleMode::Planar);
        assert_eq!(rows[0].name, "Left elbow");
        assert_eq!(rows[0].value, None);
        // Other rows unaffected
        assert!(rows[1].value.is_some());
    }

    #[test]
    fn test_absent_visibility_counts_as_visible() {
        let lm: Vec<Landmark> = standing_pose()
            .into_iter()
            .map(|l| Landmark::new(l.x, l.y, l.z))
            .collect();
        let rows = compute_angles(&lm, AngleMode::Planar);
        assert!(rows[0].value.is_some());
    }

    #[test]
    fn test_deterministic() {
        let lm = standing_pose();
        assert_eq!(
            compute_angles(&lm, AngleMode::Spatial),
            compute_angles(&lm, AngleMode::Spatial)
        );
    }

    #[test]
    fn test_empty_angles() {
        let rows = empty_angles();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|r| r.value.is_none()));
        assert_eq!(rows[9].name, "Torso lean");
    }

    #[test]
    fn test_diff_sign_and_nulls() {
        let mut a = empty_angles();
        let mut b = empty_angles();
        a[0].value = Some(170.0);
        b[0].value = Some(150.0);
        a[1].value = Some(120.0);

        let diff = diff_angles(&a, &b);
        assert_eq!(diff.len(), 10);
        assert!((diff[0].diff.unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(diff[0].display_value(), "+20.0°");
        assert_eq!(diff[1].diff, None);
    }

    #[test]
    fn test_recompute_uses_held_landmarks() {
        let mut lm = standing_pose();
        lm[BodyLandmark::LeftWrist.index()].z = -0.1;

        let mut result = AnalysisResult::settled(None, Some(lm), AngleMode::Planar);
        let planar = result.angles[0].value.unwrap();
        result.recompute(AngleMode::Spatial);
        let spatial = result.angles[0].value.unwrap();

        assert!((planar - 180.0).abs() < 1e-4);
        assert!(spatial < planar);
    }

    #[test]
    fn test_recompute_skips_loading() {
        let mut result = AnalysisResult::loading(Some("a".into()));
        result.recompute(AngleMode::Spatial);
        assert!(result.is_loading);
        assert!(result.angles.iter().all(|r| r.value.is_none()));
    }
}
