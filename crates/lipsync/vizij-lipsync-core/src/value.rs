//! Transform values written to bones, plus small vector/quaternion aliases.

use serde::{Deserialize, Serialize};

use crate::interp::functions::quat_mul;

/// 3D vector (x, y, z)
pub type Vec3 = [f32; 3];
/// Quaternion (x, y, z, w)
pub type Quat = [f32; 4];

pub const QUAT_IDENTITY: Quat = [0.0, 0.0, 0.0, 1.0];

/// Local TRS of a bone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTransform {
    pub position: Vec3,
    /// Unit quaternion (x, y, z, w)
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: QUAT_IDENTITY,
            scale: [1.0; 3],
        }
    }
}

impl BoneTransform {
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// True when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation.iter().all(|v| v.is_finite())
            && self.scale.iter().all(|v| v.is_finite())
    }
}

/// Euler angles in degrees to a unit quaternion.
///
/// Rotation order matches common rig tooling: Z first, then X, then Y
/// (`q = qy * qx * qz`).
pub fn quat_from_euler_degrees(euler: Vec3) -> Quat {
    let half = |deg: f32| (deg.to_radians() * 0.5).sin_cos();
    let (sx, cx) = half(euler[0]);
    let (sy, cy) = half(euler[1]);
    let (sz, cz) = half(euler[2]);
    let qx = [sx, 0.0, 0.0, cx];
    let qy = [0.0, sy, 0.0, cy];
    let qz = [0.0, 0.0, sz, cz];
    quat_mul(quat_mul(qy, qx), qz)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-5, "left={a} right={b}");
    }

    #[test]
    fn zero_euler_is_identity() {
        assert_eq!(quat_from_euler_degrees([0.0; 3]), QUAT_IDENTITY);
    }

    #[test]
    fn single_axis_euler_matches_axis_angle() {
        let q = quat_from_euler_degrees([90.0, 0.0, 0.0]);
        let h = std::f32::consts::FRAC_1_SQRT_2;
        approx(q[0], h);
        approx(q[1], 0.0);
        approx(q[2], 0.0);
        approx(q[3], h);

        let q = quat_from_euler_degrees([0.0, 0.0, 180.0]);
        approx(q[2], 1.0);
        approx(q[3], 0.0);
    }

    #[test]
    fn default_transform_is_identity_trs() {
        let t = BoneTransform::default();
        assert_eq!(t.position, [0.0; 3]);
        assert_eq!(t.rotation, QUAT_IDENTITY);
        assert_eq!(t.scale, [1.0; 3]);
        assert!(t.is_finite());
    }
}
