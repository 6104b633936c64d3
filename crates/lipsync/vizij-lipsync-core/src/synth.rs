//! Curve synthesis: sparse phoneme markers → dense per-channel / per-bone curves.
//!
//! Pass outline:
//! 1. discover every channel/bone referenced by a marker's shape or the rest shape
//! 2. resolve neutral values (rest shape overrides, else 0 / captured bind pose)
//! 3. seed each curve with neutral keys at t=0 and t=1
//! 4. per marker (time order): main key, first-marker pre-roll, rest hold/release
//!    and the next marker's pre-roll when the gap test passes
//! 5. composite the collected keys into sorted curves with the tangent policy
//! 6. fix quaternion continuity on bone curves
//!
//! Synthesis is synchronous and returns a fresh [`CurveSet`]; on error nothing
//! is produced, so a previously installed set stays valid.

use hashbrown::HashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{SynthesisConfig, TangentMode};
use crate::continuity::fix_curve_set;
use crate::curve::{BoneCurve, BoneKey, BoneTrack, ChannelCurve, Curve, CurveKey, CurveSet};
use crate::data::{BonePose, PhonemeMarker, Shape, ShapeLibrary};
use crate::ids::{BoneId, ChannelId};
use crate::interp::functions::{lerp_vec3, scale_vec3, slerp_quat};
use crate::markers::MarkerStore;
use crate::value::{quat_from_euler_degrees, BoneTransform};
use crate::Result;

/// Multiplier drawn uniformly from `[1 - range/2, 1 + range/2]`.
fn random_factor<R: Rng>(rng: &mut R, range: f32) -> f32 {
    if !(range.is_finite() && range > 0.0) {
        return 1.0;
    }
    let half = range * 0.5;
    rng.random_range((1.0 - half)..=(1.0 + half))
}

/// Working keys of one channel before compositing.
struct ChannelSlot {
    channel: ChannelId,
    neutral: f32,
    keys: Vec<CurveKey>,
}

impl ChannelSlot {
    #[inline]
    fn key(&mut self, time: f32, value: f32) {
        self.keys.push(CurveKey::flat(time, value));
    }
}

/// Working keys of one bone before compositing.
struct BoneSlot {
    bone: BoneId,
    neutral: BoneTransform,
    keys: Vec<BoneKey>,
}

impl BoneSlot {
    #[inline]
    fn key(&mut self, time: f32, transform: BoneTransform) {
        self.keys.push(BoneKey { time, transform });
    }
}

/// Channel and bone registry built during discovery.
#[derive(Default)]
struct Registry {
    channels: Vec<ChannelSlot>,
    channel_index: HashMap<ChannelId, usize>,
    bones: Vec<BoneSlot>,
    bone_index: HashMap<BoneId, usize>,
}

impl Registry {
    fn register_shape(&mut self, shape: &Shape) {
        for cw in &shape.channels {
            if !self.channel_index.contains_key(&cw.channel) {
                self.channel_index.insert(cw.channel, self.channels.len());
                self.channels.push(ChannelSlot {
                    channel: cw.channel,
                    neutral: 0.0,
                    keys: Vec::new(),
                });
            }
        }
        for pose in &shape.bones {
            if !self.bone_index.contains_key(&pose.bone) {
                self.bone_index.insert(pose.bone, self.bones.len());
                self.bones.push(BoneSlot {
                    bone: pose.bone,
                    // captured bind pose of the first shape that names the bone
                    neutral: pose.neutral_transform(),
                    keys: Vec::new(),
                });
            }
        }
    }

    fn resolve_neutrals(&mut self, rest: Option<&Shape>) {
        for slot in &mut self.channels {
            slot.neutral = rest.and_then(|r| r.weight_of(slot.channel)).unwrap_or(0.0);
        }
        if let Some(rest) = rest {
            for slot in &mut self.bones {
                if let Some(pose) = rest.bone_pose(slot.bone) {
                    slot.neutral = pose.end_transform();
                }
            }
        }
    }

    fn seed(&mut self) {
        for slot in &mut self.channels {
            let v = slot.neutral;
            slot.key(0.0, v);
            slot.key(1.0, v);
        }
        for slot in &mut self.bones {
            let v = slot.neutral;
            slot.key(0.0, v);
            slot.key(1.0, v);
        }
    }
}

/// Pose a bone reaches for a marker. Locked components hold `neutral`.
fn posed_bone(
    pose: &BonePose,
    neutral: &BoneTransform,
    amount: f32,
    position_mod: f32,
    rotation_mod: f32,
) -> BoneTransform {
    let position = if pose.locks.position {
        neutral.position
    } else {
        lerp_vec3(
            pose.neutral_position,
            scale_vec3(pose.end_position, position_mod),
            amount,
        )
    };
    let rotation = if pose.locks.rotation {
        neutral.rotation
    } else {
        slerp_quat(
            quat_from_euler_degrees(pose.neutral_rotation),
            quat_from_euler_degrees(scale_vec3(pose.end_rotation, rotation_mod)),
            amount,
        )
    };
    let scale = if pose.locks.scale {
        neutral.scale
    } else {
        lerp_vec3(pose.neutral_scale, pose.end_scale, amount)
    };
    BoneTransform::new(position, rotation, scale)
}

/// Gap test: a rest follows `marker` unless it sustains, or the next marker
/// starts within `rest + hold` (normalized).
#[inline]
pub fn needs_rest(
    marker: &PhonemeMarker,
    next: Option<&PhonemeMarker>,
    rest_n: f32,
    hold_n: f32,
) -> bool {
    if marker.sustain {
        return false;
    }
    match next {
        None => true,
        Some(n) => n.time > marker.time + rest_n + hold_n,
    }
}

/// Synthesize a curve set from time-ordered markers.
///
/// Markers are re-ordered by time if needed. Markers whose phoneme is missing
/// from the library hold every channel at neutral.
pub fn synthesize<R: Rng>(
    markers: &[PhonemeMarker],
    library: &ShapeLibrary,
    config: &SynthesisConfig,
    rng: &mut R,
) -> Result<CurveSet> {
    config.validate()?;

    let mut ordered: Vec<&PhonemeMarker> = markers.iter().collect();
    ordered.sort_by(|a, b| a.time.total_cmp(&b.time));

    let rest_shape = library.rest_shape();
    let mut reg = Registry::default();

    // 1) discovery; stop once every library shape has contributed
    let mut seen = vec![false; library.len()];
    let mut seen_count = 0usize;
    for marker in &ordered {
        if seen_count == library.len() {
            break;
        }
        let idx = marker.phoneme_index;
        let Some(shape) = library.get(idx) else {
            continue;
        };
        if seen[idx] {
            continue;
        }
        seen[idx] = true;
        seen_count += 1;
        reg.register_shape(shape);
    }
    if let Some(rest) = rest_shape {
        reg.register_shape(rest);
    }

    // 2) neutral values, 3) seed keys
    reg.resolve_neutrals(rest_shape);
    reg.seed();

    // 4) per-marker keys
    let rest_n = config.rest_time_normalized();
    let hold_n = config.rest_hold_normalized();
    let mut unknown = 0usize;
    for (i, marker) in ordered.iter().enumerate() {
        let next = ordered.get(i + 1).copied();
        let shape = library.get(marker.phoneme_index);
        if shape.is_none() {
            unknown += 1;
        }
        let randomize = marker.use_randomness;
        let intensity_mod = if randomize {
            random_factor(rng, marker.intensity_randomness)
        } else {
            1.0
        };
        let add_rest = needs_rest(marker, next, rest_n, hold_n);

        for slot in &mut reg.channels {
            match shape.and_then(|s| s.weight_of(slot.channel)) {
                Some(weight) => {
                    let weight_mod = if randomize {
                        random_factor(rng, marker.weight_randomness)
                    } else {
                        1.0
                    };
                    let value = weight * marker.intensity * intensity_mod * weight_mod;
                    let neutral = slot.neutral;
                    slot.key(marker.time, value);
                    if i == 0 {
                        slot.key(marker.time - hold_n, neutral);
                    }
                    if add_rest {
                        slot.key(marker.time + hold_n, value);
                        slot.key(marker.time + 2.0 * hold_n, neutral);
                        if let Some(n) = next {
                            slot.key(n.time - hold_n, neutral);
                        }
                    }
                }
                None => {
                    let neutral = slot.neutral;
                    slot.key(marker.time, neutral);
                    if add_rest {
                        if let Some(n) = next {
                            slot.key(n.time - hold_n, neutral);
                        }
                    }
                }
            }
        }

        for slot in &mut reg.bones {
            match shape.and_then(|s| s.bone_pose(slot.bone)) {
                Some(pose) => {
                    let (position_mod, rotation_mod) = if randomize {
                        (
                            random_factor(rng, marker.bone_position_randomness),
                            random_factor(rng, marker.bone_rotation_randomness),
                        )
                    } else {
                        (1.0, 1.0)
                    };
                    let amount = marker.intensity * intensity_mod;
                    let neutral = slot.neutral;
                    let posed = posed_bone(pose, &neutral, amount, position_mod, rotation_mod);
                    slot.key(marker.time, posed);
                    if i == 0 {
                        slot.key(marker.time - hold_n, neutral);
                    }
                    if add_rest {
                        slot.key(marker.time + hold_n, posed);
                        slot.key(marker.time + 2.0 * hold_n, neutral);
                        if let Some(n) = next {
                            slot.key(n.time - hold_n, neutral);
                        }
                    }
                }
                None => {
                    let neutral = slot.neutral;
                    slot.key(marker.time, neutral);
                    if add_rest {
                        if let Some(n) = next {
                            slot.key(n.time - hold_n, neutral);
                        }
                    }
                }
            }
        }
    }
    if unknown > 0 {
        log::warn!(
            "{unknown} marker(s) reference phonemes missing from the shape library; holding neutral"
        );
    }

    // 5) composite
    let mut set = CurveSet {
        channels: reg
            .channels
            .into_iter()
            .map(|slot| ChannelCurve {
                channel: slot.channel,
                curve: Curve::from_keys(slot.keys, config.tangent_mode),
            })
            .collect(),
        bones: reg
            .bones
            .into_iter()
            .map(|slot| BoneTrack {
                bone: slot.bone,
                curve: BoneCurve::from_keys(slot.keys),
            })
            .collect(),
        length: config.length,
        source_revision: None,
        source_config: Some(config.clone()),
    };

    // 6) shortest-arc rotations
    let flipped = fix_curve_set(&mut set);
    log::debug!(
        "synthesized {} channel curve(s), {} bone curve(s) from {} marker(s); {} rotation key(s) flipped",
        set.channels.len(),
        set.bones.len(),
        ordered.len(),
        flipped
    );
    Ok(set)
}

/// One curve per library phoneme: the marker intensity at each of its own
/// markers, 0 at every other marker, seeded with 0 at t=0 and t=1.
pub fn phoneme_pose_curves(
    markers: &[PhonemeMarker],
    phoneme_count: usize,
    mode: TangentMode,
) -> Vec<Curve> {
    let mut keys: Vec<Vec<CurveKey>> = (0..phoneme_count)
        .map(|_| vec![CurveKey::flat(0.0, 0.0), CurveKey::flat(1.0, 0.0)])
        .collect();
    for marker in markers {
        if marker.phoneme_index >= phoneme_count {
            continue;
        }
        for (p, curve_keys) in keys.iter_mut().enumerate() {
            if p != marker.phoneme_index {
                curve_keys.push(CurveKey::flat(marker.time, 0.0));
            }
        }
        keys[marker.phoneme_index].push(CurveKey::flat(marker.time, marker.intensity));
    }
    keys.into_iter()
        .map(|k| Curve::from_keys(k, mode))
        .collect()
}

/// Stateful synthesizer owning its config and random source.
#[derive(Debug)]
pub struct Synthesizer {
    config: SynthesisConfig,
    rng: SmallRng,
}

impl Synthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Ok(Self { config, rng })
    }

    #[inline]
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Replace the config; the random stream restarts when a seed is set.
    pub fn set_config(&mut self, config: SynthesisConfig) -> Result<()> {
        config.validate()?;
        if let Some(seed) = config.seed {
            self.rng = SmallRng::seed_from_u64(seed);
        }
        self.config = config;
        Ok(())
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    pub fn synthesize(
        &mut self,
        markers: &[PhonemeMarker],
        library: &ShapeLibrary,
    ) -> Result<CurveSet> {
        synthesize(markers, library, &self.config, &mut self.rng)
    }

    /// Synthesize from a store and stamp the result with the store revision.
    pub fn synthesize_store(
        &mut self,
        store: &MarkerStore,
        library: &ShapeLibrary,
    ) -> Result<CurveSet> {
        let mut set = self.synthesize(store.markers(), library)?;
        set.source_revision = Some(store.revision());
        Ok(set)
    }
}
