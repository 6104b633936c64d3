//! Vizij Lip-Sync Core (engine-agnostic)
//!
//! Turns sparse, timed phoneme markers into dense per-channel and per-bone
//! animation curves, then plays those curves back through a tick-driven
//! controller that writes values to a host-provided sink.
//!
//! Pipeline: [`MarkerStore`] → [`Synthesizer`] → [`CurveSet`] →
//! [`PlaybackController::tick`] → [`BlendSink`].
//!
//! Hosts adapt the [`BlendSink`] and [`AudioClock`] traits; everything else is
//! plain data with `serde` support.

pub mod binding;
pub mod config;
pub mod continuity;
pub mod curve;
pub mod data;
pub mod error;
pub mod ids;
pub mod interchange;
pub mod interp;
pub mod markers;
pub mod outputs;
pub mod player;
pub mod sampling;
pub mod synth;
pub mod value;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, LipSyncError>;

// Re-exports for consumers (adapters)
pub use binding::{AudioClock, BlendSink, BoneWrite, ChannelWrite, SinkFrame};
pub use config::{PlaybackConfig, SynthesisConfig, TangentMode, TimingMode};
pub use continuity::{fix_curve_set, fix_quaternion_continuity};
pub use curve::{BoneCurve, BoneKey, BoneTrack, ChannelCurve, Curve, CurveKey, CurveSet};
pub use data::{BoneLocks, BonePose, ChannelWeight, PhonemeMarker, Shape, ShapeLibrary};
pub use error::LipSyncError;
pub use ids::{BoneId, ChannelId, PhonemeIndex};
pub use interchange::{DocumentMarker, LipSyncDocument};
pub use markers::{validate_sustain_chains, MarkerStore};
pub use outputs::PlaybackEvent;
pub use player::{PlaybackController, PlaybackState};
pub use synth::{phoneme_pose_curves, Synthesizer};
pub use value::{BoneTransform, Quat, Vec3};
