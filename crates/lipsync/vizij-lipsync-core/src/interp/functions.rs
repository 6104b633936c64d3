//! Interpolation helpers:
//! - lerp_f32 / lerp_vec3 (component-wise)
//! - hermite (cubic Hermite segment with per-key tangents)
//! - quaternion NLERP/SLERP with shortest-arc normalization

use crate::value::{Quat, Vec3};

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn scale_vec3(v: Vec3, s: f32) -> Vec3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[inline]
pub fn dot4(a: Quat, b: Quat) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
pub fn negate4(q: Quat) -> Quat {
    [-q[0], -q[1], -q[2], -q[3]]
}

/// Normalize a quaternion; a zero quaternion maps to identity.
#[inline]
pub fn normalize4(q: Quat) -> Quat {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        [q[0] * inv_len, q[1] * inv_len, q[2] * inv_len, q[3] * inv_len]
    } else {
        [0.0, 0.0, 0.0, 1.0]
    }
}

/// Hamilton product `a * b` for (x, y, z, w) quaternions.
#[inline]
pub fn quat_mul(a: Quat, b: Quat) -> Quat {
    [
        a[3] * b[0] + a[0] * b[3] + a[1] * b[2] - a[2] * b[1],
        a[3] * b[1] - a[0] * b[2] + a[1] * b[3] + a[2] * b[0],
        a[3] * b[2] + a[0] * b[1] - a[1] * b[0] + a[2] * b[3],
        a[3] * b[3] - a[0] * b[0] - a[1] * b[1] - a[2] * b[2],
    ]
}

/// Quaternion NLERP with shortest-arc correction.
/// If dot < 0, negate the second quaternion to ensure the shortest path.
/// Returns a normalized quaternion (x,y,z,w).
#[inline]
pub fn nlerp_quat(a: Quat, mut b: Quat, t: f32) -> Quat {
    if dot4(a, b) < 0.0 {
        b = negate4(b);
    }
    normalize4([
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ])
}

/// Spherical interpolation between two rotations along the shorter arc.
/// Falls back to NLERP when the inputs are nearly parallel.
pub fn slerp_quat(a: Quat, b: Quat, t: f32) -> Quat {
    let qa = normalize4(a);
    let mut qb = normalize4(b);
    let mut dot = dot4(qa, qb);
    if dot < 0.0 {
        qb = negate4(qb);
        dot = -dot;
    }

    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return nlerp_quat(qa, qb, t);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;
    normalize4([
        qa[0] * s0 + qb[0] * s1,
        qa[1] * s0 + qb[1] * s1,
        qa[2] * s0 + qb[2] * s1,
        qa[3] * s0 + qb[3] * s1,
    ])
}

/// Cubic Hermite segment between `(t0, v0)` and `(t1, v1)` evaluated at `t`.
///
/// `m0` is the outgoing tangent of the left key and `m1` the incoming tangent
/// of the right key, both expressed as value-per-unit-time.
#[inline]
pub fn hermite(t0: f32, v0: f32, m0: f32, t1: f32, v1: f32, m1: f32, t: f32) -> f32 {
    let dt = t1 - t0;
    if dt <= 0.0 {
        return v1;
    }
    let s = ((t - t0) / dt).clamp(0.0, 1.0);
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * v0 + h10 * dt * m0 + h01 * v1 + h11 * dt * m1
}

/// Smoothstep weight used by flat-tangent segments: `hermite` with zero
/// tangents reduces to this curve.
#[inline]
pub fn smoothstep(s: f32) -> f32 {
    let s = s.clamp(0.0, 1.0);
    s * s * (3.0 - 2.0 * s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn hermite_hits_endpoints_and_flat_midpoint() {
        approx(hermite(0.0, 1.0, 0.0, 1.0, 3.0, 0.0, 0.0), 1.0, 1e-6);
        approx(hermite(0.0, 1.0, 0.0, 1.0, 3.0, 0.0, 1.0), 3.0, 1e-6);
        approx(hermite(0.0, 1.0, 0.0, 1.0, 3.0, 0.0, 0.5), 2.0, 1e-6);
        approx(
            hermite(0.2, 0.0, 0.0, 0.6, 1.0, 0.0, 0.3),
            smoothstep(0.25),
            1e-6,
        );
    }

    #[test]
    fn hermite_with_slopes_can_overshoot() {
        // Steep outgoing tangent on a flat segment bulges above both keys.
        let mid = hermite(0.0, 1.0, 4.0, 1.0, 1.0, 0.0, 0.3);
        assert!(mid > 1.0);
    }

    #[test]
    fn nlerp_takes_short_arc() {
        let a = [0.0, 0.0, 0.0, 1.0];
        let b = [0.0, 0.0, 0.0, -1.0];
        let q = nlerp_quat(a, b, 0.5);
        approx(q[3], 1.0, 1e-6);
    }

    #[test]
    fn slerp_halfway_about_z() {
        let a = [0.0, 0.0, 0.0, 1.0];
        let half = std::f32::consts::FRAC_1_SQRT_2;
        let b = [0.0, 0.0, half, half]; // 90 deg about Z
        let q = slerp_quat(a, b, 0.5);
        let expected = (std::f32::consts::PI / 8.0).sin();
        approx(q[2], expected, 1e-5);
        approx(dot4(q, q), 1.0, 1e-5);
    }

    #[test]
    fn quat_mul_identity() {
        let q = normalize4([0.1, 0.2, 0.3, 0.9]);
        let r = quat_mul([0.0, 0.0, 0.0, 1.0], q);
        for i in 0..4 {
            approx(r[i], q[i], 1e-6);
        }
    }
}
