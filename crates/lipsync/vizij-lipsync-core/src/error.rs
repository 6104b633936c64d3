//! Error types for lip-sync synthesis and playback

use serde::{Deserialize, Serialize};

/// Error type shared by the marker store, synthesizer, controller and loader.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LipSyncError {
    /// Marker rejected at insertion (non-finite or out-of-range fields)
    #[error("Invalid marker at index {index}: {reason}")]
    InvalidMarker { index: usize, reason: String },

    /// Marker references a phoneme the shape library does not contain
    #[error("Unknown phoneme index {phoneme} (library has {available} shapes)")]
    UnknownPhoneme { phoneme: usize, available: usize },

    /// Marker index outside the store
    #[error("Marker index {index} out of range (store has {len} markers)")]
    MarkerIndexOutOfRange { index: usize, len: usize },

    /// Playback or preview requested before any curve set was synthesized
    #[error("No synthesized curve set available")]
    NoCurveSet,

    /// Invalid state machine transition
    #[error("Invalid player state: {current_state} -> {requested_state}")]
    InvalidPlayerState {
        current_state: String,
        requested_state: String,
    },

    /// Seek position at or beyond the clip length
    #[error("Seek time {time}s is out of range for clip length {length}s")]
    SeekOutOfRange { time: f32, length: f32 },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Interchange document failed structural checks
    #[error("Malformed lip-sync document: {reason}")]
    MalformedDocument { reason: String },

    /// Interchange document version cannot be migrated
    #[error("Unsupported lip-sync document version {version}")]
    UnsupportedVersion { version: f32 },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl LipSyncError {
    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidMarker { .. }
            | Self::UnknownPhoneme { .. }
            | Self::MarkerIndexOutOfRange { .. }
            | Self::InvalidConfig { .. } => "validation",
            Self::NoCurveSet | Self::InvalidPlayerState { .. } | Self::SeekOutOfRange { .. } => {
                "player"
            }
            Self::MalformedDocument { .. } | Self::UnsupportedVersion { .. } => "data",
            Self::Serialization { .. } => "serialization",
        }
    }

    /// Check if the caller can keep going with the current state intact
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NoCurveSet | Self::InvalidPlayerState { .. } | Self::SeekOutOfRange { .. }
        )
    }

    pub(crate) fn invalid_state(current: &str, requested: &str) -> Self {
        Self::InvalidPlayerState {
            current_state: current.to_string(),
            requested_state: requested.to_string(),
        }
    }
}

impl From<serde_json::Error> for LipSyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let marker = LipSyncError::InvalidMarker {
            index: 2,
            reason: "time is NaN".into(),
        };
        assert_eq!(marker.category(), "validation");
        assert_eq!(LipSyncError::NoCurveSet.category(), "player");
        assert_eq!(
            LipSyncError::UnsupportedVersion { version: 0.5 }.category(),
            "data"
        );
    }

    #[test]
    fn test_error_recoverability() {
        assert!(LipSyncError::SeekOutOfRange {
            time: 4.0,
            length: 2.0
        }
        .is_recoverable());
        assert!(!LipSyncError::MalformedDocument {
            reason: "missing length".into()
        }
        .is_recoverable());
    }

    #[test]
    fn test_serialization() {
        let error = LipSyncError::invalid_state("idle", "pause");
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: LipSyncError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
        assert_eq!(
            error.to_string(),
            "Invalid player state: idle -> pause".to_string()
        );
    }
}
