//! Lip-sync data model: phoneme markers, pose shapes and the shape library.
//!
//! Marker times are normalized to [0,1] over the clip length. Shapes are
//! addressed by their position in the [`ShapeLibrary`]; the loader performs any
//! name/legacy-enum resolution before markers reach this model.

use serde::{Deserialize, Serialize};

use crate::error::LipSyncError;
use crate::ids::{BoneId, ChannelId, PhonemeIndex};
use crate::value::{quat_from_euler_degrees, BoneTransform, Vec3};
use crate::Result;

/// Reserved shape name (case-insensitive) supplying neutral-pose overrides.
pub const REST_SHAPE_NAME: &str = "rest";

pub const DEFAULT_INTENSITY_RANDOMNESS: f32 = 0.1;
pub const DEFAULT_WEIGHT_RANDOMNESS: f32 = 0.3;
pub const DEFAULT_BONE_POSITION_RANDOMNESS: f32 = 0.3;
pub const DEFAULT_BONE_ROTATION_RANDOMNESS: f32 = 0.3;

/// A timed instruction to assume a phoneme's pose.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeMarker {
    pub phoneme_index: PhonemeIndex,
    /// Normalized time in [0,1] within the clip.
    pub time: f32,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    /// Skip the rest before the next marker when it shares this phoneme.
    #[serde(default)]
    pub sustain: bool,
    #[serde(default)]
    pub use_randomness: bool,
    #[serde(default = "default_intensity_randomness")]
    pub intensity_randomness: f32,
    #[serde(default = "default_weight_randomness", alias = "blendableRandomness")]
    pub weight_randomness: f32,
    #[serde(default = "default_bone_position_randomness")]
    pub bone_position_randomness: f32,
    #[serde(default = "default_bone_rotation_randomness")]
    pub bone_rotation_randomness: f32,
}

fn default_intensity() -> f32 {
    1.0
}
fn default_intensity_randomness() -> f32 {
    DEFAULT_INTENSITY_RANDOMNESS
}
fn default_weight_randomness() -> f32 {
    DEFAULT_WEIGHT_RANDOMNESS
}
fn default_bone_position_randomness() -> f32 {
    DEFAULT_BONE_POSITION_RANDOMNESS
}
fn default_bone_rotation_randomness() -> f32 {
    DEFAULT_BONE_ROTATION_RANDOMNESS
}

impl PhonemeMarker {
    pub fn new(phoneme_index: PhonemeIndex, time: f32, intensity: f32, sustain: bool) -> Self {
        Self {
            phoneme_index,
            time,
            intensity,
            sustain,
            use_randomness: false,
            intensity_randomness: DEFAULT_INTENSITY_RANDOMNESS,
            weight_randomness: DEFAULT_WEIGHT_RANDOMNESS,
            bone_position_randomness: DEFAULT_BONE_POSITION_RANDOMNESS,
            bone_rotation_randomness: DEFAULT_BONE_ROTATION_RANDOMNESS,
        }
    }

    /// Enable randomness with explicit ranges (intensity, weight, bone position, bone rotation).
    pub fn with_randomness(mut self, intensity: f32, weight: f32, position: f32, rotation: f32) -> Self {
        self.use_randomness = true;
        self.intensity_randomness = intensity;
        self.weight_randomness = weight;
        self.bone_position_randomness = position;
        self.bone_rotation_randomness = rotation;
        self
    }

    /// Check the marker's own fields and, when a library is given, its phoneme index.
    /// `index` is only used for error reporting.
    pub fn validate(&self, index: usize, library: Option<&ShapeLibrary>) -> Result<()> {
        if !self.time.is_finite() || !(0.0..=1.0).contains(&self.time) {
            return Err(LipSyncError::InvalidMarker {
                index,
                reason: format!("time must be finite and within [0,1], got {}", self.time),
            });
        }
        if !self.intensity.is_finite() {
            return Err(LipSyncError::InvalidMarker {
                index,
                reason: format!("intensity must be finite, got {}", self.intensity),
            });
        }
        let ranges = [
            self.intensity_randomness,
            self.weight_randomness,
            self.bone_position_randomness,
            self.bone_rotation_randomness,
        ];
        if ranges.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(LipSyncError::InvalidMarker {
                index,
                reason: "randomness ranges must be finite and >= 0".into(),
            });
        }
        if let Some(lib) = library {
            if !lib.contains(self.phoneme_index) {
                return Err(LipSyncError::UnknownPhoneme {
                    phoneme: self.phoneme_index,
                    available: lib.len(),
                });
            }
        }
        Ok(())
    }
}

/// Contribution of a shape to one blend channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelWeight {
    pub channel: ChannelId,
    pub weight: f32,
}

/// Per-component locks; a locked component always holds its neutral value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoneLocks {
    pub position: bool,
    pub rotation: bool,
    pub scale: bool,
}

/// Bone pose target of a shape. Rotations are Euler angles in degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonePose {
    pub bone: BoneId,
    /// Captured once at bind time.
    pub neutral_position: Vec3,
    pub neutral_rotation: Vec3,
    pub neutral_scale: Vec3,
    pub end_position: Vec3,
    pub end_rotation: Vec3,
    pub end_scale: Vec3,
    #[serde(default)]
    pub locks: BoneLocks,
}

impl BonePose {
    pub fn neutral_transform(&self) -> BoneTransform {
        BoneTransform::new(
            self.neutral_position,
            quat_from_euler_degrees(self.neutral_rotation),
            self.neutral_scale,
        )
    }

    pub fn end_transform(&self) -> BoneTransform {
        BoneTransform::new(
            self.end_position,
            quat_from_euler_degrees(self.end_rotation),
            self.end_scale,
        )
    }
}

/// A named pose: weighted blend channels plus optional bone poses.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    #[serde(default)]
    pub channels: Vec<ChannelWeight>,
    #[serde(default)]
    pub bones: Vec<BonePose>,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: u32, weight: f32) -> Self {
        self.channels.push(ChannelWeight {
            channel: ChannelId(channel),
            weight,
        });
        self
    }

    pub fn with_bone(mut self, pose: BonePose) -> Self {
        self.bones.push(pose);
        self
    }

    #[inline]
    pub fn is_rest(&self) -> bool {
        self.name.eq_ignore_ascii_case(REST_SHAPE_NAME)
    }

    /// Weight of `channel` in this shape, if the shape drives it.
    pub fn weight_of(&self, channel: ChannelId) -> Option<f32> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| c.weight)
    }

    pub fn bone_pose(&self, bone: BoneId) -> Option<&BonePose> {
        self.bones.iter().find(|b| b.bone == bone)
    }
}

/// Ordered collection of shapes; a marker's `phoneme_index` indexes into it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeLibrary {
    pub shapes: Vec<Shape>,
}

impl ShapeLibrary {
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    #[inline]
    pub fn contains(&self, index: PhonemeIndex) -> bool {
        index < self.shapes.len()
    }

    #[inline]
    pub fn get(&self, index: PhonemeIndex) -> Option<&Shape> {
        self.shapes.get(index)
    }

    /// The designated rest shape (matched by reserved name, case-insensitive).
    pub fn rest_shape(&self) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.is_rest())
    }

    /// Exact-name lookup used by loaders.
    pub fn index_of(&self, name: &str) -> Option<PhonemeIndex> {
        self.shapes.iter().position(|s| s.name == name)
    }

    /// Channel ids must be unique within each shape, bones likewise.
    pub fn validate(&self) -> Result<()> {
        for shape in &self.shapes {
            for (i, c) in shape.channels.iter().enumerate() {
                if shape.channels[..i].iter().any(|o| o.channel == c.channel) {
                    return Err(LipSyncError::InvalidConfig {
                        reason: format!("shape '{}' lists {} twice", shape.name, c.channel),
                    });
                }
                if !c.weight.is_finite() {
                    return Err(LipSyncError::InvalidConfig {
                        reason: format!("shape '{}' has a non-finite weight", shape.name),
                    });
                }
            }
            for (i, b) in shape.bones.iter().enumerate() {
                if shape.bones[..i].iter().any(|o| o.bone == b.bone) {
                    return Err(LipSyncError::InvalidConfig {
                        reason: format!("shape '{}' lists {} twice", shape.name, b.bone),
                    });
                }
            }
        }
        Ok(())
    }
}
