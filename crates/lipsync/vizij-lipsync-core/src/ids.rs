//! Identifiers for blend channels, bones and phoneme shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Addressable scalar target on the host (e.g. a blendshape index).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

/// Addressable transform target on the host (a bone in the face rig).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoneId(pub u32);

/// Index of a shape inside a [`crate::data::ShapeLibrary`].
pub type PhonemeIndex = usize;

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

impl fmt::Display for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bone#{}", self.0)
    }
}
