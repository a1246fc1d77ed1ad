//! Pixel-to-world backprojection.
//!
//! Pure per-pixel computation with no failure modes: a depth without a
//! measurement (`depth <= 0`) yields no point, which is a valid outcome
//! rather than an error.

use nalgebra::Vector3;

use crate::meta::CameraMeta;

/// Backproject pixel (`col`, `row`) with measured depth into world space.
///
/// The homogeneous pixel coordinate `(col, row, 1)` is mapped through the
/// inverse intrinsics to a camera-space ray, scaled by depth, and carried
/// into the world frame by the live-to-world pose. Returns `None` for a
/// non-positive (or non-finite) depth.
#[inline]
pub fn backproject(meta: &CameraMeta, col: usize, row: usize, depth: f32) -> Option<Vector3<f32>> {
    if !(depth > 0.0) || !depth.is_finite() {
        return None;
    }
    let ray = meta.inv_intrinsics * Vector3::new(col as f32, row as f32, 1.0);
    let camera = ray * depth;
    Some(meta.live_to_world.apply(&camera))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion};

    #[test]
    fn test_nonpositive_depth_is_undefined() {
        let meta = CameraMeta::identity();
        assert!(backproject(&meta, 3, 4, 0.0).is_none());
        assert!(backproject(&meta, 3, 4, -1.5).is_none());
        assert!(backproject(&meta, 3, 4, f32::NAN).is_none());
        assert!(backproject(&meta, 3, 4, f32::INFINITY).is_none());
    }

    #[test]
    fn test_identity_camera() {
        let meta = CameraMeta::identity();
        let p = backproject(&meta, 2, 5, 3.0).unwrap();
        assert_eq!(p, Vector3::new(6.0, 15.0, 3.0));
    }

    #[test]
    fn test_pinhole_principal_point() {
        // The pixel at the principal point backprojects onto the optical
        // axis: (0, 0, depth) in the camera frame.
        let meta =
            CameraMeta::from_pinhole(500.0, 500.0, 320.0, 240.0, Isometry3::identity()).unwrap();
        let p = backproject(&meta, 320, 240, 2.0).unwrap();

        assert_relative_eq!(p.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(p.z, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_pose_applied_after_backprojection() {
        let pose = Isometry3::from_parts(
            Translation3::new(1.0, -2.0, 0.5),
            UnitQuaternion::identity(),
        );
        let meta = CameraMeta::from_pinhole(500.0, 500.0, 320.0, 240.0, pose).unwrap();
        let p = backproject(&meta, 320, 240, 2.0).unwrap();

        assert_relative_eq!(p.x, 1.0, epsilon = 1e-4);
        assert_relative_eq!(p.y, -2.0, epsilon = 1e-4);
        assert_relative_eq!(p.z, 2.5, epsilon = 1e-4);
    }

    #[test]
    fn test_ray_scales_linearly_with_depth() {
        let meta =
            CameraMeta::from_pinhole(400.0, 400.0, 100.0, 100.0, Isometry3::identity()).unwrap();
        let near = backproject(&meta, 150, 80, 1.0).unwrap();
        let far = backproject(&meta, 150, 80, 4.0).unwrap();

        assert_relative_eq!(far.x, 4.0 * near.x, epsilon = 1e-4);
        assert_relative_eq!(far.y, 4.0 * near.y, epsilon = 1e-4);
        assert_relative_eq!(far.z, 4.0 * near.z, epsilon = 1e-4);
    }
}
