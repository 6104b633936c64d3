//! Curve model produced by synthesis and consumed by playback.
//!
//! - [`Curve`]: scalar keys with in/out tangents (one per blend channel).
//! - [`BoneCurve`]: TRS keys with unit-quaternion rotations (one per bone).
//! - [`CurveSet`]: everything one synthesis pass produced.
//!
//! Key times are normalized clip time and may fall outside [0,1] (pre-roll
//! keys); evaluation clamps to the first/last key.

use serde::{Deserialize, Serialize};

use crate::config::{SynthesisConfig, TangentMode};
use crate::ids::{BoneId, ChannelId};
use crate::sampling::{sample_bone_curve, sample_curve};
use crate::value::BoneTransform;

/// One scalar keyframe. Tangents are value-per-normalized-time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
}

impl CurveKey {
    #[inline]
    pub fn flat(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }
}

/// Sort keys by time; among equal times the key inserted last wins.
fn sort_dedup_last_wins<K: Copy>(mut keys: Vec<K>, time: impl Fn(&K) -> f32) -> Vec<K> {
    keys.sort_by(|a, b| time(a).total_cmp(&time(b)));
    let mut out: Vec<K> = Vec::with_capacity(keys.len());
    for key in keys {
        match out.last_mut() {
            Some(last) if time(last) == time(&key) => *last = key,
            _ => out.push(key),
        }
    }
    out
}

/// Scalar animation curve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<CurveKey>,
}

impl Curve {
    /// Build from keys in insertion order, applying the tangent policy.
    pub fn from_keys(keys: Vec<CurveKey>, mode: TangentMode) -> Self {
        let mut curve = Self {
            keys: sort_dedup_last_wins(keys, |k| k.time),
        };
        match mode {
            TangentMode::Tight => curve.flatten_tangents(),
            TangentMode::Loose => curve.smooth_tangents(),
        }
        curve
    }

    /// Two flat keys blending `from` at t=0 to `to` at t=1.
    pub fn blend(from: f32, to: f32) -> Self {
        Self {
            keys: vec![CurveKey::flat(0.0, from), CurveKey::flat(1.0, to)],
        }
    }

    /// Reset in place to a two-key blend, keeping capacity.
    pub fn set_blend(&mut self, from: f32, to: f32) {
        self.keys.clear();
        self.keys.push(CurveKey::flat(0.0, from));
        self.keys.push(CurveKey::flat(1.0, to));
    }

    #[inline]
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn evaluate(&self, t: f32) -> f32 {
        sample_curve(&self.keys, t)
    }

    /// Zero every tangent (plateau at each key).
    pub fn flatten_tangents(&mut self) {
        for k in &mut self.keys {
            k.in_tangent = 0.0;
            k.out_tangent = 0.0;
        }
    }

    /// Automatic tangents: interior keys take the slope between their
    /// neighbours, end keys stay flat.
    pub fn smooth_tangents(&mut self) {
        let n = self.keys.len();
        for i in 0..n {
            let slope = if i == 0 || i + 1 == n {
                0.0
            } else {
                let prev = self.keys[i - 1];
                let next = self.keys[i + 1];
                let dt = next.time - prev.time;
                if dt > 0.0 {
                    (next.value - prev.value) / dt
                } else {
                    0.0
                }
            };
            self.keys[i].in_tangent = slope;
            self.keys[i].out_tangent = slope;
        }
    }
}

/// One bone keyframe.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneKey {
    pub time: f32,
    pub transform: BoneTransform,
}

/// Bone transform curve; rotations are unit quaternions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoneCurve {
    keys: Vec<BoneKey>,
}

impl BoneCurve {
    pub fn from_keys(keys: Vec<BoneKey>) -> Self {
        Self {
            keys: sort_dedup_last_wins(keys, |k| k.time),
        }
    }

    /// Two keys blending `from` at t=0 to `to` at t=1.
    pub fn blend(from: BoneTransform, to: BoneTransform) -> Self {
        Self {
            keys: vec![
                BoneKey {
                    time: 0.0,
                    transform: from,
                },
                BoneKey {
                    time: 1.0,
                    transform: to,
                },
            ],
        }
    }

    pub fn set_blend(&mut self, from: BoneTransform, to: BoneTransform) {
        self.keys.clear();
        self.keys.push(BoneKey {
            time: 0.0,
            transform: from,
        });
        self.keys.push(BoneKey {
            time: 1.0,
            transform: to,
        });
    }

    #[inline]
    pub fn keys(&self) -> &[BoneKey] {
        &self.keys
    }

    #[inline]
    pub(crate) fn keys_mut(&mut self) -> &mut [BoneKey] {
        &mut self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn evaluate(&self, t: f32) -> BoneTransform {
        sample_bone_curve(&self.keys, t)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelCurve {
    pub channel: ChannelId,
    pub curve: Curve,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone: BoneId,
    pub curve: BoneCurve,
}

/// All curves produced by one synthesis pass, in discovery order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveSet {
    pub channels: Vec<ChannelCurve>,
    pub bones: Vec<BoneTrack>,
    /// Clip length in seconds the normalized times refer to.
    pub length: f32,
    /// Marker-store revision the set was synthesized from, if any.
    #[serde(default)]
    pub source_revision: Option<u64>,
    /// Synthesis settings the set was built with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_config: Option<SynthesisConfig>,
}

impl CurveSet {
    pub fn channel_curve(&self, channel: ChannelId) -> Option<&Curve> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| &c.curve)
    }

    pub fn bone_curve(&self, bone: BoneId) -> Option<&BoneCurve> {
        self.bones.iter().find(|b| b.bone == bone).map(|b| &b.curve)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.bones.is_empty()
    }

    /// Build a blend from each curve's value at `from_t` to its value at t=1.
    /// Used when a session stops mid-clip.
    pub fn blend_to_end(&self, from_t: f32) -> CurveSet {
        let mut out = CurveSet::default();
        self.blend_to_end_into(from_t, &mut out);
        out
    }

    /// [`CurveSet::blend_to_end`] into an existing set, reusing its curves.
    pub fn blend_to_end_into(&self, from_t: f32, out: &mut CurveSet) {
        out.channels.truncate(self.channels.len());
        for (i, c) in self.channels.iter().enumerate() {
            let from = c.curve.evaluate(from_t);
            let to = c.curve.evaluate(1.0);
            match out.channels.get_mut(i) {
                Some(slot) => {
                    slot.channel = c.channel;
                    slot.curve.set_blend(from, to);
                }
                None => out.channels.push(ChannelCurve {
                    channel: c.channel,
                    curve: Curve::blend(from, to),
                }),
            }
        }
        out.bones.truncate(self.bones.len());
        for (i, b) in self.bones.iter().enumerate() {
            let from = b.curve.evaluate(from_t);
            let to = b.curve.evaluate(1.0);
            match out.bones.get_mut(i) {
                Some(slot) => {
                    slot.bone = b.bone;
                    slot.curve.set_blend(from, to);
                }
                None => out.bones.push(BoneTrack {
                    bone: b.bone,
                    curve: BoneCurve::blend(from, to),
                }),
            }
        }
        out.length = self.length;
        out.source_revision = self.source_revision;
        out.source_config.clone_from(&self.source_config);
    }
}
