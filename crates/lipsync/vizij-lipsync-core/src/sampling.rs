//! Curve sampling for scalar and bone curves.
//!
//! Model:
//! - Keys are sorted by time; time may lie outside [0,1].
//! - Before the first key the first value holds, after the last key the last
//!   value holds.
//! - Scalar segments are cubic Hermite using the left key's out tangent and
//!   the right key's in tangent.
//! - Bone segments use flat tangents: smoothstep on position/scale and a
//!   normalized component blend on rotation.
//!
//! Sampling never allocates; segment lookup is a binary search.

use crate::curve::{BoneKey, CurveKey};
use crate::interp::functions::{hermite, lerp_vec3, nlerp_quat, smoothstep};
use crate::value::BoneTransform;

/// Locate the segment `[i, i+1]` containing `t`.
/// Returns `None` when `t` lies outside the key range or there are fewer
/// than two keys; callers then hold the nearest end key.
#[inline]
fn find_segment(times: impl Fn(usize) -> f32, n: usize, t: f32) -> Option<usize> {
    if n < 2 || t <= times(0) || t >= times(n - 1) {
        return None;
    }
    // First index whose time is > t, minus one.
    let (mut lo, mut hi) = (0usize, n - 1);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if times(mid) <= t {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(lo)
}

/// Sample a scalar curve at normalized time `t`.
pub fn sample_curve(keys: &[CurveKey], t: f32) -> f32 {
    let n = keys.len();
    match n {
        0 => 0.0,
        1 => keys[0].value,
        _ => {
            if t.is_nan() {
                return keys[0].value;
            }
            match find_segment(|i| keys[i].time, n, t) {
                Some(i) => {
                    let a = &keys[i];
                    let b = &keys[i + 1];
                    hermite(
                        a.time,
                        a.value,
                        a.out_tangent,
                        b.time,
                        b.value,
                        b.in_tangent,
                        t,
                    )
                }
                None if t <= keys[0].time => keys[0].value,
                None => keys[n - 1].value,
            }
        }
    }
}

/// Sample a bone curve at normalized time `t`.
pub fn sample_bone_curve(keys: &[BoneKey], t: f32) -> BoneTransform {
    let n = keys.len();
    match n {
        0 => BoneTransform::default(),
        1 => keys[0].transform,
        _ => {
            if t.is_nan() {
                return keys[0].transform;
            }
            match find_segment(|i| keys[i].time, n, t) {
                Some(i) => {
                    let a = &keys[i];
                    let b = &keys[i + 1];
                    let dt = b.time - a.time;
                    let s = if dt > 0.0 {
                        smoothstep((t - a.time) / dt)
                    } else {
                        1.0
                    };
                    BoneTransform {
                        position: lerp_vec3(a.transform.position, b.transform.position, s),
                        rotation: nlerp_quat(a.transform.rotation, b.transform.rotation, s),
                        scale: lerp_vec3(a.transform.scale, b.transform.scale, s),
                    }
                }
                None if t <= keys[0].time => keys[0].transform,
                None => keys[n - 1].transform,
            }
        }
    }
}
