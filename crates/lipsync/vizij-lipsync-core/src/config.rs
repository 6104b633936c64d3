//! Core configuration for vizij-lipsync-core.
//!
//! Synthesis and playback are configured separately so a curve set can be
//! rebuilt without touching an active session's timing settings.

use serde::{Deserialize, Serialize};

use crate::error::LipSyncError;
use crate::Result;

/// Default completion threshold on the normalized cursor.
pub const DEFAULT_COMPLETION_THRESHOLD: f32 = 0.98;

/// Rest times below this are known to produce popping transitions.
const RECOMMENDED_MIN_REST_TIME: f32 = 0.1;

/// Tangent generation policy for channel keys.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TangentMode {
    /// Flat tangents: every key is hit exactly, transitions look crisp.
    Tight,
    /// Smoothed tangents from neighbouring keys; natural but may overshoot.
    #[default]
    Loose,
}

/// How the playback cursor advances each tick.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimingMode {
    /// Cursor follows the bound audio clock; falls back to `CustomTimer`.
    #[default]
    AudioPlayback,
    /// Cursor accumulates real elapsed time.
    CustomTimer,
    /// Cursor accumulates `1 / frame_rate` per tick (offline rendering).
    FixedFrameRate,
}

impl TimingMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AudioPlayback => "audioPlayback",
            Self::CustomTimer => "customTimer",
            Self::FixedFrameRate => "fixedFrameRate",
        }
    }
}

/// Parameters of one synthesis pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesisConfig {
    /// Clip length in seconds; marker times are normalized against it.
    pub length: f32,
    /// Minimum silence (seconds) between markers before a rest is inserted.
    pub rest_time: f32,
    /// Seconds a pose is held before blending back to neutral.
    pub rest_hold_time: f32,
    pub tangent_mode: TangentMode,
    /// Seed for marker randomness; `None` draws a fresh seed per synthesizer.
    pub seed: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            length: 1.0,
            rest_time: 0.2,
            rest_hold_time: 0.4,
            tangent_mode: TangentMode::Loose,
            seed: None,
        }
    }
}

impl SynthesisConfig {
    pub fn with_length(length: f32) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    /// Rest time as a fraction of the clip.
    #[inline]
    pub fn rest_time_normalized(&self) -> f32 {
        self.rest_time / self.length
    }

    /// Hold time as a fraction of the clip.
    #[inline]
    pub fn rest_hold_normalized(&self) -> f32 {
        self.rest_hold_time / self.length
    }

    pub fn validate(&self) -> Result<()> {
        if !self.length.is_finite() || self.length <= 0.0 {
            return Err(LipSyncError::InvalidConfig {
                reason: format!("clip length must be > 0 seconds, got {}", self.length),
            });
        }
        if !self.rest_time.is_finite() || self.rest_time < 0.0 {
            return Err(LipSyncError::InvalidConfig {
                reason: format!("rest time must be >= 0, got {}", self.rest_time),
            });
        }
        if !self.rest_hold_time.is_finite() || self.rest_hold_time < 0.0 {
            return Err(LipSyncError::InvalidConfig {
                reason: format!("rest hold time must be >= 0, got {}", self.rest_hold_time),
            });
        }
        if self.rest_time < RECOMMENDED_MIN_REST_TIME {
            log::warn!(
                "rest time {}s is lower than the recommended {}s and may cause animation errors",
                self.rest_time,
                RECOMMENDED_MIN_REST_TIME
            );
        }
        Ok(())
    }
}

/// Parameters of a playback session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    pub timing_mode: TimingMode,
    /// Frames per second for `TimingMode::FixedFrameRate`.
    pub frame_rate: u32,
    /// Restart at cursor 0 when the clip completes.
    pub loop_playback: bool,
    /// Normalized cursor position that counts as "finished".
    pub completion_threshold: f32,
    /// Duration (seconds) of the blend back to the clip's end values on stop.
    pub rest_hold_time: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            timing_mode: TimingMode::AudioPlayback,
            frame_rate: 30,
            loop_playback: false,
            completion_threshold: DEFAULT_COMPLETION_THRESHOLD,
            rest_hold_time: 0.4,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            return Err(LipSyncError::InvalidConfig {
                reason: "frame rate must be > 0".into(),
            });
        }
        if !(self.completion_threshold > 0.0 && self.completion_threshold <= 1.0) {
            return Err(LipSyncError::InvalidConfig {
                reason: format!(
                    "completion threshold must be in (0, 1], got {}",
                    self.completion_threshold
                ),
            });
        }
        if !self.rest_hold_time.is_finite() || self.rest_hold_time < 0.0 {
            return Err(LipSyncError::InvalidConfig {
                reason: format!("rest hold time must be >= 0, got {}", self.rest_hold_time),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SynthesisConfig::default().validate().unwrap();
        PlaybackConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let cfg = SynthesisConfig::with_length(0.0);
        assert!(matches!(
            cfg.validate(),
            Err(LipSyncError::InvalidConfig { .. })
        ));
        let cfg = PlaybackConfig {
            frame_rate: 0,
            ..PlaybackConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = PlaybackConfig {
            completion_threshold: 1.5,
            ..PlaybackConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn normalizes_against_length() {
        let cfg = SynthesisConfig {
            length: 2.0,
            rest_time: 0.2,
            rest_hold_time: 0.4,
            ..SynthesisConfig::default()
        };
        assert!((cfg.rest_time_normalized() - 0.1).abs() < 1e-6);
        assert!((cfg.rest_hold_normalized() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn deserializes_partial_json() {
        let cfg: SynthesisConfig =
            serde_json::from_str(r#"{ "length": 3.5, "tangentMode": "tight" }"#).unwrap();
        assert_eq!(cfg.tangent_mode, TangentMode::Tight);
        assert_eq!(cfg.rest_time, 0.2);
        let cfg: PlaybackConfig =
            serde_json::from_str(r#"{ "timingMode": "fixedFrameRate", "frameRate": 24 }"#)
                .unwrap();
        assert_eq!(cfg.timing_mode, TimingMode::FixedFrameRate);
        assert_eq!(cfg.frame_rate, 24);
    }
}
