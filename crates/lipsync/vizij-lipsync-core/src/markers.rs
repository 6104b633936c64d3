//! Marker store: the time-sorted set of phoneme markers for one clip.
//!
//! Every mutation re-sorts by time, re-validates sustain chains and bumps the
//! revision counter. Curve sets remember the revision they were built from,
//! which is how the controller detects staleness.

use crate::data::{PhonemeMarker, ShapeLibrary};
use crate::error::LipSyncError;
use crate::Result;

/// Correct sustain flags so that a flag survives only where the following
/// marker shares the phoneme.
///
/// A marker whose flag is invalid hands it back one step when the previous
/// marker shares its phoneme. The last marker never keeps a flag. Pure:
/// returns a new sequence and is idempotent.
pub fn validate_sustain_chains(markers: &[PhonemeMarker]) -> Vec<PhonemeMarker> {
    let mut out = markers.to_vec();
    let n = out.len();
    for i in 0..n {
        if !out[i].sustain {
            continue;
        }
        let phoneme = out[i].phoneme_index;
        let next_matches = i + 1 < n && out[i + 1].phoneme_index == phoneme;
        if next_matches {
            continue;
        }
        out[i].sustain = false;
        if i > 0 && out[i - 1].phoneme_index == phoneme {
            out[i - 1].sustain = true;
        }
    }
    out
}

fn sort_by_time(markers: &mut [PhonemeMarker]) {
    markers.sort_by(|a, b| a.time.total_cmp(&b.time));
}

/// Owns the ordered markers of one loaded clip.
#[derive(Clone, Debug, Default)]
pub struct MarkerStore {
    markers: Vec<PhonemeMarker>,
    revision: u64,
}

impl MarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set. Nothing is stored unless every marker validates.
    pub fn load(&mut self, markers: Vec<PhonemeMarker>) -> Result<()> {
        self.load_inner(markers, None)
    }

    /// Like [`MarkerStore::load`], additionally rejecting unknown phoneme indices.
    pub fn load_checked(
        &mut self,
        markers: Vec<PhonemeMarker>,
        library: &ShapeLibrary,
    ) -> Result<()> {
        self.load_inner(markers, Some(library))
    }

    fn load_inner(
        &mut self,
        mut markers: Vec<PhonemeMarker>,
        library: Option<&ShapeLibrary>,
    ) -> Result<()> {
        for (i, m) in markers.iter().enumerate() {
            m.validate(i, library)?;
        }
        sort_by_time(&mut markers);
        self.markers = validate_sustain_chains(&markers);
        self.bump();
        log::debug!("marker store loaded {} markers", self.markers.len());
        Ok(())
    }

    /// Insert one marker, returning its index in time order.
    pub fn insert(
        &mut self,
        marker: PhonemeMarker,
        library: Option<&ShapeLibrary>,
    ) -> Result<usize> {
        marker.validate(self.markers.len(), library)?;
        // Equal times keep insertion order, so the new marker lands after its peers.
        let index = self.markers.partition_point(|m| m.time <= marker.time);
        self.markers.insert(index, marker);
        self.markers = validate_sustain_chains(&self.markers);
        self.bump();
        Ok(index)
    }

    pub fn remove(&mut self, index: usize) -> Result<PhonemeMarker> {
        if index >= self.markers.len() {
            return Err(LipSyncError::MarkerIndexOutOfRange {
                index,
                len: self.markers.len(),
            });
        }
        let removed = self.markers.remove(index);
        self.markers = validate_sustain_chains(&self.markers);
        self.bump();
        Ok(removed)
    }

    /// Move a marker in time (drag edit). Returns the marker's new index.
    pub fn set_time(&mut self, index: usize, time: f32) -> Result<usize> {
        let len = self.markers.len();
        let marker = self
            .markers
            .get(index)
            .ok_or(LipSyncError::MarkerIndexOutOfRange { index, len })?;
        let mut moved = marker.clone();
        moved.time = time;
        moved.validate(index, None)?;
        self.markers.remove(index);
        let new_index = self.markers.partition_point(|m| m.time <= time);
        self.markers.insert(new_index, moved);
        self.markers = validate_sustain_chains(&self.markers);
        self.bump();
        Ok(new_index)
    }

    /// Toggle or set the sustain flag of one marker; chain validation may move it.
    pub fn set_sustain(&mut self, index: usize, sustain: bool) -> Result<()> {
        let len = self.markers.len();
        let marker = self
            .markers
            .get_mut(index)
            .ok_or(LipSyncError::MarkerIndexOutOfRange { index, len })?;
        marker.sustain = sustain;
        self.markers = validate_sustain_chains(&self.markers);
        self.bump();
        Ok(())
    }

    /// Re-establish time order and sustain validity.
    pub fn sort(&mut self) {
        sort_by_time(&mut self.markers);
        self.markers = validate_sustain_chains(&self.markers);
        self.bump();
    }

    /// Apply sustain-chain correction in place of the current markers.
    pub fn validate_sustain_chains(&mut self) {
        let validated = validate_sustain_chains(&self.markers);
        if validated != self.markers {
            self.markers = validated;
            self.bump();
        }
    }

    pub fn clear(&mut self) {
        self.markers.clear();
        self.bump();
    }

    #[inline]
    pub fn markers(&self) -> &[PhonemeMarker] {
        &self.markers
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Monotonic mutation counter.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}
