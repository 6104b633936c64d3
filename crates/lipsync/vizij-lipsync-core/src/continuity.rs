//! Quaternion continuity for bone rotation curves.
//!
//! `q` and `-q` encode the same rotation but blend along opposite arcs. Walking
//! keys in time order and flipping any key whose dot product with its
//! predecessor is negative keeps every segment on the shorter arc.

use crate::curve::{BoneCurve, CurveSet};
use crate::interp::functions::{dot4, negate4};

/// Flip rotation keys so consecutive pairs satisfy `dot(q[i], q[i+1]) >= 0`.
/// Returns the number of keys negated.
pub fn fix_quaternion_continuity(curve: &mut BoneCurve) -> usize {
    let keys = curve.keys_mut();
    let mut flipped = 0;
    for i in 1..keys.len() {
        let prev = keys[i - 1].transform.rotation;
        let cur = keys[i].transform.rotation;
        if dot4(prev, cur) < 0.0 {
            keys[i].transform.rotation = negate4(cur);
            flipped += 1;
        }
    }
    flipped
}

/// Apply [`fix_quaternion_continuity`] to every bone curve of a set.
pub fn fix_curve_set(set: &mut CurveSet) -> usize {
    set.bones
        .iter_mut()
        .map(|track| fix_quaternion_continuity(&mut track.curve))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::BoneKey;
    use crate::value::{quat_from_euler_degrees, BoneTransform};

    fn key(time: f32, rotation: [f32; 4]) -> BoneKey {
        BoneKey {
            time,
            transform: BoneTransform {
                rotation,
                ..BoneTransform::default()
            },
        }
    }

    #[test]
    fn flips_opposite_hemisphere_keys() {
        let q = quat_from_euler_degrees([0.0, 30.0, 0.0]);
        let neg = negate4(q);
        let mut curve = BoneCurve::from_keys(vec![
            key(0.0, q),
            key(0.3, neg),
            key(0.6, q),
            key(1.0, neg),
        ]);
        let flipped = fix_quaternion_continuity(&mut curve);
        assert_eq!(flipped, 2);
        for pair in curve.keys().windows(2) {
            assert!(dot4(pair[0].transform.rotation, pair[1].transform.rotation) >= 0.0);
        }
    }

    #[test]
    fn chains_against_already_flipped_predecessor() {
        // each key is ~120 degrees from the previous around Y, alternating sign
        let a = quat_from_euler_degrees([0.0, 0.0, 0.0]);
        let b = negate4(quat_from_euler_degrees([0.0, 120.0, 0.0]));
        let c = quat_from_euler_degrees([0.0, 240.0, 0.0]);
        let mut curve = BoneCurve::from_keys(vec![key(0.0, a), key(0.5, b), key(1.0, c)]);
        fix_quaternion_continuity(&mut curve);
        for pair in curve.keys().windows(2) {
            assert!(dot4(pair[0].transform.rotation, pair[1].transform.rotation) >= 0.0);
        }
    }

    #[test]
    fn short_curves_are_untouched() {
        let mut curve = BoneCurve::from_keys(vec![key(0.0, [0.0, 0.0, 0.0, -1.0])]);
        assert_eq!(fix_quaternion_continuity(&mut curve), 0);
        assert_eq!(curve.keys()[0].transform.rotation[3], -1.0);
    }
}
