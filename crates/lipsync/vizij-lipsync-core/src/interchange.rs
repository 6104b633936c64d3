//! JSON interchange document for lip-sync clips.
//!
//! Shape of the document (times in seconds):
//!
//! ```json
//! {
//!   "version": 1.501,
//!   "length": 2.4,
//!   "transcript": "hello",
//!   "phonemes": [
//!     { "phonemeName": "E", "phonemeNumber": 1, "time": 0.3, "intensity": 0.9, "sustain": false }
//!   ]
//! }
//! ```
//!
//! Notes:
//! - Documents older than 1.3 identify phonemes by the legacy enum name
//!   (`"phoneme": "MBP"`); they are migrated once to library indices here, so
//!   the synthesizer only ever sees indices.
//! - Newer documents use `phonemeNumber`, falling back to `phonemeName`
//!   resolved against the shape library.
//! - Conversion is all-or-nothing: any bad marker fails the whole document.

use serde::{Deserialize, Serialize};

use crate::data::{
    PhonemeMarker, ShapeLibrary, DEFAULT_BONE_POSITION_RANDOMNESS,
    DEFAULT_BONE_ROTATION_RANDOMNESS, DEFAULT_INTENSITY_RANDOMNESS, DEFAULT_WEIGHT_RANDOMNESS,
};
use crate::error::LipSyncError;
use crate::markers::MarkerStore;
use crate::Result;

/// Version written by [`LipSyncDocument::from_markers`].
pub const CURRENT_VERSION: f32 = 1.501;
/// First version carrying integer phoneme numbers.
pub const PHONEME_NUMBER_VERSION: f32 = 1.3;

/// Legacy phoneme enum, in enum order.
pub const LEGACY_PHONEMES: [&str; 10] = [
    "AI",
    "E",
    "U",
    "O",
    "CDGKNRSThYZ",
    "FV",
    "L",
    "MBP",
    "WQ",
    "Rest",
];

/// Index of a legacy phoneme enum name (case-insensitive).
pub fn legacy_phoneme_index(name: &str) -> Option<usize> {
    LEGACY_PHONEMES
        .iter()
        .position(|p| p.eq_ignore_ascii_case(name))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LipSyncDocument {
    pub version: f32,
    /// Clip length in seconds.
    pub length: f32,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub phonemes: Vec<DocumentMarker>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phoneme_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phoneme_number: Option<usize>,
    /// Legacy enum name (pre-1.3 documents).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phoneme: Option<String>,
    /// Seconds from clip start.
    pub time: f32,
    #[serde(default = "one")]
    pub intensity: f32,
    #[serde(default)]
    pub sustain: bool,
    #[serde(default)]
    pub use_randomness: bool,
    #[serde(default = "intensity_randomness")]
    pub intensity_randomness: f32,
    #[serde(default = "weight_randomness")]
    pub blendable_randomness: f32,
    #[serde(default = "bone_position_randomness")]
    pub bone_position_randomness: f32,
    #[serde(default = "bone_rotation_randomness")]
    pub bone_rotation_randomness: f32,
}

fn one() -> f32 {
    1.0
}
fn intensity_randomness() -> f32 {
    DEFAULT_INTENSITY_RANDOMNESS
}
fn weight_randomness() -> f32 {
    DEFAULT_WEIGHT_RANDOMNESS
}
fn bone_position_randomness() -> f32 {
    DEFAULT_BONE_POSITION_RANDOMNESS
}
fn bone_rotation_randomness() -> f32 {
    DEFAULT_BONE_ROTATION_RANDOMNESS
}

fn malformed(reason: impl Into<String>) -> LipSyncError {
    LipSyncError::MalformedDocument {
        reason: reason.into(),
    }
}

impl LipSyncDocument {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| malformed(format!("parse error: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[inline]
    pub fn is_legacy(&self) -> bool {
        self.version < PHONEME_NUMBER_VERSION
    }

    fn check_header(&self) -> Result<()> {
        if !self.version.is_finite() || self.version < 0.0 {
            return Err(LipSyncError::UnsupportedVersion {
                version: self.version,
            });
        }
        if !(self.length.is_finite() && self.length > 0.0) {
            return Err(malformed(format!(
                "length must be a positive number of seconds, got {}",
                self.length
            )));
        }
        Ok(())
    }

    fn resolve_phoneme(
        &self,
        index: usize,
        marker: &DocumentMarker,
        library: &ShapeLibrary,
    ) -> Result<usize> {
        let resolved = if self.is_legacy() {
            match (&marker.phoneme, marker.phoneme_number) {
                (Some(name), _) => legacy_phoneme_index(name).ok_or_else(|| {
                    malformed(format!("marker {index}: unknown legacy phoneme '{name}'"))
                })?,
                (None, Some(number)) => number,
                (None, None) => {
                    return Err(malformed(format!("marker {index}: missing phoneme")));
                }
            }
        } else {
            match (marker.phoneme_number, &marker.phoneme_name) {
                (Some(number), _) => number,
                (None, Some(name)) => library.index_of(name).ok_or_else(|| {
                    malformed(format!("marker {index}: no shape named '{name}'"))
                })?,
                (None, None) => {
                    return Err(malformed(format!(
                        "marker {index}: missing phonemeNumber/phonemeName"
                    )));
                }
            }
        };
        if !library.contains(resolved) {
            return Err(LipSyncError::UnknownPhoneme {
                phoneme: resolved,
                available: library.len(),
            });
        }
        Ok(resolved)
    }

    /// Convert to time-sorted, validated markers with normalized times.
    pub fn to_markers(&self, library: &ShapeLibrary) -> Result<Vec<PhonemeMarker>> {
        self.check_header()?;
        if self.is_legacy() && !self.phonemes.is_empty() {
            log::warn!(
                "migrating lip-sync document version {} to phoneme numbers",
                self.version
            );
        }
        let mut markers = Vec::with_capacity(self.phonemes.len());
        for (i, m) in self.phonemes.iter().enumerate() {
            let phoneme_index = self.resolve_phoneme(i, m, library)?;
            let marker = PhonemeMarker {
                phoneme_index,
                time: m.time / self.length,
                intensity: m.intensity,
                sustain: m.sustain,
                use_randomness: m.use_randomness,
                intensity_randomness: m.intensity_randomness,
                weight_randomness: m.blendable_randomness,
                bone_position_randomness: m.bone_position_randomness,
                bone_rotation_randomness: m.bone_rotation_randomness,
            };
            marker.validate(i, Some(library))?;
            markers.push(marker);
        }
        markers.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(markers)
    }

    /// Replace the contents of `store`. On error the store is untouched.
    pub fn load_into(&self, store: &mut MarkerStore, library: &ShapeLibrary) -> Result<()> {
        let markers = self.to_markers(library)?;
        store.load_checked(markers, library)
    }

    /// Build a current-version document; marker times are scaled back to seconds.
    pub fn from_markers(
        markers: &[PhonemeMarker],
        library: &ShapeLibrary,
        length: f32,
        transcript: impl Into<String>,
    ) -> Self {
        let phonemes = markers
            .iter()
            .map(|m| DocumentMarker {
                phoneme_name: library.get(m.phoneme_index).map(|s| s.name.clone()),
                phoneme_number: Some(m.phoneme_index),
                phoneme: None,
                time: m.time * length,
                intensity: m.intensity,
                sustain: m.sustain,
                use_randomness: m.use_randomness,
                intensity_randomness: m.intensity_randomness,
                blendable_randomness: m.weight_randomness,
                bone_position_randomness: m.bone_position_randomness,
                bone_rotation_randomness: m.bone_rotation_randomness,
            })
            .collect();
        Self {
            version: CURRENT_VERSION,
            length,
            transcript: transcript.into(),
            phonemes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Shape;

    fn library() -> ShapeLibrary {
        ShapeLibrary::new(
            LEGACY_PHONEMES
                .iter()
                .enumerate()
                .map(|(i, name)| Shape::new(*name).with_channel(i as u32, 1.0))
                .collect(),
        )
    }

    #[test]
    fn legacy_names_resolve_case_insensitively() {
        assert_eq!(legacy_phoneme_index("mbp"), Some(7));
        assert_eq!(legacy_phoneme_index("Rest"), Some(9));
        assert_eq!(legacy_phoneme_index("TH"), None);
    }

    #[test]
    fn legacy_document_migrates_enum_names() {
        let doc = LipSyncDocument::from_json(
            r#"{"version":1.2,"length":2.0,"phonemes":[
                {"phoneme":"FV","time":1.0},
                {"phoneme":"AI","time":0.5,"sustain":true}
            ]}"#,
        )
        .unwrap();
        let markers = doc.to_markers(&library()).unwrap();
        assert_eq!(markers[0].phoneme_index, 0);
        assert_eq!(markers[0].time, 0.25);
        assert!(markers[0].sustain);
        assert_eq!(markers[1].phoneme_index, 5);
        assert_eq!(markers[1].intensity, 1.0);
        assert_eq!(markers[1].weight_randomness, DEFAULT_WEIGHT_RANDOMNESS);
    }

    #[test]
    fn current_document_falls_back_to_names() {
        let doc = LipSyncDocument::from_json(
            r#"{"version":1.501,"length":1.0,"phonemes":[{"phonemeName":"WQ","time":0.4}]}"#,
        )
        .unwrap();
        let markers = doc.to_markers(&library()).unwrap();
        assert_eq!(markers[0].phoneme_index, 8);
    }

    #[test]
    fn bad_marker_fails_the_whole_document() {
        let doc = LipSyncDocument::from_json(
            r#"{"version":1.5,"length":1.0,"phonemes":[
                {"phonemeNumber":0,"time":0.2},
                {"phonemeNumber":0,"time":1.5}
            ]}"#,
        )
        .unwrap();
        let mut store = MarkerStore::new();
        let err = doc.load_into(&mut store, &library()).unwrap_err();
        assert!(matches!(err, LipSyncError::InvalidMarker { index: 1, .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn rejects_bad_headers() {
        let lib = library();
        let zero = LipSyncDocument {
            version: 1.5,
            length: 0.0,
            transcript: String::new(),
            phonemes: Vec::new(),
        };
        assert!(matches!(
            zero.to_markers(&lib),
            Err(LipSyncError::MalformedDocument { .. })
        ));
        let nan = LipSyncDocument {
            version: f32::NAN,
            length: 1.0,
            ..zero
        };
        assert!(matches!(
            nan.to_markers(&lib),
            Err(LipSyncError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            LipSyncDocument::from_json("{not json"),
            Err(LipSyncError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn unknown_phoneme_number_is_reported() {
        let doc = LipSyncDocument::from_json(
            r#"{"version":1.5,"length":1.0,"phonemes":[{"phonemeNumber":42,"time":0.2}]}"#,
        )
        .unwrap();
        assert_eq!(
            doc.to_markers(&library()).unwrap_err(),
            LipSyncError::UnknownPhoneme {
                phoneme: 42,
                available: 10
            }
        );
    }
}
