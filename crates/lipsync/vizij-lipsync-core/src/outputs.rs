//! Events emitted by the playback controller.
//!
//! Channel/bone values go straight to the host [`BlendSink`](crate::binding::BlendSink);
//! the controller only keeps the list of semantic events raised by the last
//! call, reusing its capacity across ticks.

use serde::{Deserialize, Serialize};

/// Discrete playback signals.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
#[non_exhaustive]
pub enum PlaybackEvent {
    /// Playback began (or the delay elapsed and sampling began).
    Started { cursor: f32 },
    Paused { cursor: f32 },
    Resumed { cursor: f32 },
    /// Blend-to-end began.
    Stopping { cursor: f32 },
    /// Cursor wrapped back to 0 with the same curve set.
    Looped,
    /// Session ended and the controller is idle again.
    Finished,
}

/// Event buffer cleared at the start of each controller call.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Events {
    #[serde(default)]
    pub events: Vec<PlaybackEvent>,
}

impl Events {
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn push(&mut self, event: PlaybackEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn as_slice(&self) -> &[PlaybackEvent] {
        &self.events
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, event: &PlaybackEvent) -> bool {
        self.events.contains(event)
    }
}
