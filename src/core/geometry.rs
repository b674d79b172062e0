//! Joint topology and the angle-at-joint formula.

use crate::models::pose::{AngleMode, BodyLandmark as L, JointAngleSpec, Landmark};

/// Vectors shorter than this are treated as degenerate
pub const MIN_SEGMENT_LENGTH: f64 = 1e-6;

/// Skeleton connections drawn by the overlay, as landmark index pairs
pub const POSE_CONNECTIONS: [(usize, usize); 31] = [
    // shoulders, arms
    (L::LeftShoulder.index(), L::RightShoulder.index()),
    (L::LeftShoulder.index(), L::LeftElbow.index()),
    (L::LeftElbow.index(), L::LeftWrist.index()),
    (L::RightShoulder.index(), L::RightElbow.index()),
    (L::RightElbow.index(), L::RightWrist.index()),
    // torso, legs
    (L::LeftShoulder.index(), L::LeftHip.index()),
    (L::RightShoulder.index(), L::RightHip.index()),
    (L::LeftHip.index(), L::RightHip.index()),
    (L::LeftHip.index(), L::LeftKnee.index()),
    (L::LeftKnee.index(), L::LeftAnkle.index()),
    (L::RightHip.index(), L::RightKnee.index()),
    (L::RightKnee.index(), L::RightAnkle.index()),
    // feet
    (L::LeftAnkle.index(), L::LeftHeel.index()),
    (L::LeftHeel.index(), L::LeftFootIndex.index()),
    (L::RightAnkle.index(), L::RightHeel.index()),
    (L::RightHeel.index(), L::RightFootIndex.index()),
    // hands
    (L::LeftWrist.index(), L::LeftPinky.index()),
    (L::LeftWrist.index(), L::LeftIndex.index()),
    (L::LeftWrist.index(), L::LeftThumb.index()),
    (L::RightWrist.index(), L::RightPinky.index()),
    (L::RightWrist.index(), L::RightIndex.index()),
    (L::RightWrist.index(), L::RightThumb.index()),
    // face
    (L::Nose.index(), L::LeftEyeInner.index()),
    (L::LeftEyeInner.index(), L::LeftEye.index()),
    (L::LeftEye.index(), L::LeftEyeOuter.index()),
    (L::LeftEyeOuter.index(), L::LeftEar.index()),
    (L::Nose.index(), L::RightEyeInner.index()),
    (L::RightEyeInner.index(), L::RightEye.index()),
    (L::RightEye.index(), L::RightEyeOuter.index()),
    (L::RightEyeOuter.index(), L::RightEar.index()),
    (L::MouthLeft.index(), L::MouthRight.index()),
];

const fn joint(
    name: &'static str,
    proximal: L,
    at: L,
    distal: L,
    description: &'static str,
) -> JointAngleSpec {
    JointAngleSpec {
        name,
        joint_triple: (proximal.index(), at.index(), distal.index()),
        description,
    }
}

/// The fixed joint-angle catalog, in display order
pub const JOINT_ANGLES: [JointAngleSpec; 10] = [
    joint(
        "Left elbow",
        L::LeftShoulder,
        L::LeftElbow,
        L::LeftWrist,
        "Bend at elbow (shoulder-elbow-wrist). 180° straight.",
    ),
    joint(
        "Right elbow",
        L::RightShoulder,
        L::RightElbow,
        L::RightWrist,
        "Same for right arm.",
    ),
    joint(
        "Left knee",
        L::LeftHip,
        L::LeftKnee,
        L::LeftAnkle,
        "Bend at knee (hip-knee-ankle). 180° straight.",
    ),
    joint(
        "Right knee",
        L::RightHip,
        L::RightKnee,
        L::RightAnkle,
        "Same for right leg.",
    ),
    joint(
        "Left shoulder",
        L::LeftHip,
        L::LeftShoulder,
        L::LeftElbow,
        "Angle between torso (hip to shoulder) and upper arm.",
    ),
    joint(
        "Right shoulder",
        L::RightHip,
        L::RightShoulder,
        L::RightElbow,
        "Same for right.",
    ),
    joint(
        "Left hip",
        L::LeftShoulder,
        L::LeftHip,
        L::LeftKnee,
        "Angle at hip between torso and thigh.",
    ),
    joint(
        "Right hip",
        L::RightShoulder,
        L::RightHip,
        L::RightKnee,
        "Same for right.",
    ),
    joint(
        "Neck (L)",
        L::LeftShoulder,
        L::Nose,
        L::RightShoulder,
        "Head tilt: angle at nose between shoulders.",
    ),
    joint(
        "Torso lean",
        L::LeftHip,
        L::LeftShoulder,
        L::RightHip,
        "Angle at left shoulder between the two hips (torso orientation).",
    ),
];

/// Angle at `b` between `b->a` and `b->c`, in degrees within `[0, 180]`.
///
/// Returns `None` when either segment is shorter than [`MIN_SEGMENT_LENGTH`].
pub fn angle_at_joint(a: &Landmark, b: &Landmark, c: &Landmark, mode: AngleMode) -> Option<f64> {
    let ba = components(a, b, mode);
    let bc = components(c, b, mode);

    let dot: f64 = ba.iter().zip(bc.iter()).map(|(p, q)| p * q).sum();
    let mag_ba = ba.iter().map(|v| v * v).sum::<f64>().sqrt();
    let mag_bc = bc.iter().map(|v| v * v).sum::<f64>().sqrt();

    if mag_ba < MIN_SEGMENT_LENGTH || mag_bc < MIN_SEGMENT_LENGTH {
        return None;
    }

    let cos = (dot / (mag_ba * mag_bc)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// `p - origin`; the z component is zeroed in planar mode
fn components(p: &Landmark, origin: &Landmark, mode: AngleMode) -> [f64; 3] {
    let dz = match mode {
        AngleMode::Planar => 0.0,
        AngleMode::Spatial => p.z as f64 - origin.z as f64,
    };
    [p.x as f64 - origin.x as f64, p.y as f64 - origin.y as f64, dz]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::POSE_LANDMARK_COUNT;

    fn p(x: f32, y: f32, z: f32) -> Landmark {
        Landmark::new(x, y, z)
    }

    #[test]
    fn test_straight_is_180() {
        let angle = angle_at_joint(
            &p(0.0, 0.0, 0.0),
            &p(0.5, 0.0, 0.0),
            &p(1.0, 0.0, 0.0),
            AngleMode::Planar,
        )
        .unwrap();
        assert!((angle - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_direction_is_0() {
        let angle = angle_at_joint(
            &p(1.0, 0.0, 0.0),
            &p(0.0, 0.0, 0.0),
            &p(2.0, 0.0, 0.0),
            AngleMode::Spatial,
        )
        .unwrap();
        assert!(angle.abs() < 1e-9);
    }

    #[test]
    fn test_right_angle() {
        let angle = angle_at_joint(
            &p(0.0, 0.0, 0.0),
            &p(0.5, 0.0, 0.0),
            &p(0.5, 0.5, 0.0),
            AngleMode::Planar,
        )
        .unwrap();
        assert!((angle - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_segment_is_none() {
        let b = p(0.3, 0.3, 0.1);
        assert_eq!(angle_at_joint(&b, &b, &p(0.5, 0.5, 0.0), AngleMode::Planar), None);
        assert_eq!(angle_at_joint(&p(0.5, 0.5, 0.0), &b, &b, AngleMode::Spatial), None);
    }

    #[test]
    fn test_depth_only_bend() {
        // Straight in the image plane, bent toward the camera
        let shoulder = p(0.4, 0.5, 0.0);
        let elbow = p(0.5, 0.5, 0.0);
        let wrist = p(0.6, 0.5, -0.1);

        let planar = angle_at_joint(&shoulder, &elbow, &wrist, AngleMode::Planar).unwrap();
        let spatial = angle_at_joint(&shoulder, &elbow, &wrist, AngleMode::Spatial).unwrap();

        assert!((planar - 180.0).abs() < 1e-6);
        assert!(spatial < 179.0);
    }

    #[test]
    fn test_planar_ignores_z_for_degeneracy() {
        // Distinct only in z: degenerate in the plane, measurable in space
        let a = p(0.5, 0.5, 0.2);
        let b = p(0.5, 0.5, 0.0);
        let c = p(0.5, 0.5, -0.2);
        assert_eq!(angle_at_joint(&a, &b, &c, AngleMode::Planar), None);
        assert!(angle_at_joint(&a, &b, &c, AngleMode::Spatial).is_some());
    }

    #[test]
    fn test_range_over_grid() {
        let b = p(0.5, 0.5, 0.0);
        for i in 0..12 {
            for j in 0..12 {
                let ta = i as f32 * 0.5;
                let tc = j as f32 * 0.5;
                let a = p(0.5 + ta.cos() * 0.2, 0.5 + ta.sin() * 0.2, 0.05 * i as f32);
                let c = p(0.5 + tc.cos() * 0.3, 0.5 + tc.sin() * 0.3, -0.05 * j as f32);
                for mode in [AngleMode::Planar, AngleMode::Spatial] {
                    let angle = angle_at_joint(&a, &b, &c, mode).unwrap();
                    assert!((0.0..=180.0).contains(&angle), "{} out of range", angle);
                }
            }
        }
    }

    #[test]
    fn test_topology_indices_in_range() {
        for (i, j) in POSE_CONNECTIONS {
            assert!(i < POSE_LANDMARK_COUNT && j < POSE_LANDMARK_COUNT);
        }
        for spec in JOINT_ANGLES {
            let (a, b, c) = spec.joint_triple;
            assert!(a < POSE_LANDMARK_COUNT && b < POSE_LANDMARK_COUNT && c < POSE_LANDMARK_COUNT);
        }
    }
}
