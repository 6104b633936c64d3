//! Host seams: the blend/transform sink and the audio clock.
//!
//! Adapters implement [`BlendSink`] to receive per-tick channel and bone
//! writes, and optionally [`AudioClock`] so `TimingMode::AudioPlayback` can
//! follow real audio. [`SinkFrame`] is a ready-made sink that records one
//! tick's writes as a serializable batch.

use serde::{Deserialize, Serialize};

use crate::ids::{BoneId, ChannelId};
use crate::value::BoneTransform;

/// Receives evaluated values. Called once per channel and once per bone per tick.
pub trait BlendSink {
    fn set_channel(&mut self, channel: ChannelId, value: f32);
    fn set_bone(&mut self, bone: BoneId, transform: &BoneTransform);
}

/// Polled once per tick for the current audio playback position.
pub trait AudioClock {
    /// Playback position in seconds, or `None` when no clip is playing.
    fn position(&self) -> Option<f32>;

    /// (Re)start the clip at `from_seconds` after `delay` seconds. Called when
    /// a session starts and on every loop.
    fn play(&mut self, from_seconds: f32, delay: f32) {
        let _ = (from_seconds, delay);
    }
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    /// Flush host audio (`stop(true)` on the controller).
    fn stop(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelWrite {
    pub channel: ChannelId,
    pub value: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneWrite {
    pub bone: BoneId,
    pub transform: BoneTransform,
}

/// Recorded writes of a tick. Reuse across ticks with [`SinkFrame::clear`]
/// to keep capacity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkFrame {
    #[serde(default)]
    pub channels: Vec<ChannelWrite>,
    #[serde(default)]
    pub bones: Vec<BoneWrite>,
}

impl SinkFrame {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.channels.clear();
        self.bones.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.bones.is_empty()
    }

    /// Last value written to `channel` in this frame.
    pub fn channel(&self, channel: ChannelId) -> Option<f32> {
        self.channels
            .iter()
            .rev()
            .find(|w| w.channel == channel)
            .map(|w| w.value)
    }

    pub fn bone(&self, bone: BoneId) -> Option<&BoneTransform> {
        self.bones
            .iter()
            .rev()
            .find(|w| w.bone == bone)
            .map(|w| &w.transform)
    }
}

impl BlendSink for SinkFrame {
    fn set_channel(&mut self, channel: ChannelId, value: f32) {
        self.channels.push(ChannelWrite { channel, value });
    }

    fn set_bone(&mut self, bone: BoneId, transform: &BoneTransform) {
        self.bones.push(BoneWrite {
            bone,
            transform: *transform,
        });
    }
}
