//! Playback controller: state machine, timing modes and per-tick sampling.
//!
//! States: `Idle → Playing ⇄ Paused`, `Playing/Paused → Stopping → Idle`.
//! `Stopping` blends every curve from its value at the stop cursor to its
//! end value over `rest_hold_time`, then raises [`PlaybackEvent::Finished`]
//! and the completion callback.
//!
//! The controller owns the installed [`CurveSet`] between synthesis calls.
//! Synthesis runs outside [`PlaybackController::tick`] and either replaces the
//! set whole or fails leaving the previous one installed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::binding::{AudioClock, BlendSink};
use crate::config::{PlaybackConfig, TimingMode};
use crate::curve::CurveSet;
use crate::data::ShapeLibrary;
use crate::error::LipSyncError;
use crate::markers::MarkerStore;
use crate::outputs::{Events, PlaybackEvent};
use crate::synth::Synthesizer;
use crate::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
    Stopping,
}

impl PlaybackState {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopping => "stopping",
        }
    }

    #[inline]
    pub fn can_pause(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    #[inline]
    pub fn can_resume(&self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    #[inline]
    pub fn can_stop(&self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }

    /// Playing, paused or stopping.
    #[inline]
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Evaluate every curve of `set` at `t` and push the results to `sink`.
pub fn write_curves<S: BlendSink + ?Sized>(set: &CurveSet, t: f32, sink: &mut S) {
    for c in &set.channels {
        sink.set_channel(c.channel, c.curve.evaluate(t));
    }
    for b in &set.bones {
        sink.set_bone(b.bone, &b.curve.evaluate(t));
    }
}

pub struct PlaybackController {
    config: PlaybackConfig,
    state: PlaybackState,

    curves: Option<CurveSet>,
    stale: bool,
    // stop blend; kept apart from `curves` so a replay starts from the same set
    blend: CurveSet,

    // normalized session cursor and its fixed-frame bookkeeping
    cursor: f32,
    origin: f32,
    frames: u64,
    delay_remaining: f32,

    blend_cursor: f32,
    blend_frames: u64,

    clock: Option<Box<dyn AudioClock>>,
    // set on loop until the audio position drops back below the threshold
    awaiting_rewind: bool,
    on_finished: Option<Box<dyn FnMut()>>,
    warned_fallback: bool,

    events: Events,
    delivered: bool,
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("has_curves", &self.curves.is_some())
            .field("stale", &self.stale)
            .field("has_clock", &self.clock.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::with_config(PlaybackConfig::default())
    }
}

impl PlaybackController {
    pub fn new(config: PlaybackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: PlaybackConfig) -> Self {
        Self {
            config,
            state: PlaybackState::Idle,
            curves: None,
            stale: false,
            blend: CurveSet::default(),
            cursor: 0.0,
            origin: 0.0,
            frames: 0,
            delay_remaining: 0.0,
            blend_cursor: 0.0,
            blend_frames: 0,
            clock: None,
            awaiting_rewind: false,
            on_finished: None,
            warned_fallback: false,
            events: Events::default(),
            delivered: false,
        }
    }

    // ---- accessors ----

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Normalized session cursor. Holds its last value while stopping.
    #[inline]
    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    #[inline]
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    #[inline]
    pub fn curves(&self) -> Option<&CurveSet> {
        self.curves.as_ref()
    }

    #[inline]
    pub fn delay_remaining(&self) -> f32 {
        self.delay_remaining
    }

    /// Events raised since the last tick returned.
    #[inline]
    pub fn events(&self) -> &[PlaybackEvent] {
        self.events.as_slice()
    }

    /// True when the installed set was invalidated, or was synthesized from
    /// an older revision of `store` or with settings other than `synth`'s.
    /// Externally loaded sets only go stale through [`invalidate`](Self::invalidate).
    pub fn is_stale(&self, store: &MarkerStore, synth: &Synthesizer) -> bool {
        match &self.curves {
            None => true,
            Some(set) => {
                self.stale
                    || matches!(set.source_revision, Some(r) if r != store.revision())
                    || matches!(&set.source_config, Some(c) if c != synth.config())
            }
        }
    }

    // ---- configuration and host seams ----

    pub fn set_config(&mut self, config: PlaybackConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn bind_audio_clock(&mut self, clock: Box<dyn AudioClock>) {
        self.clock = Some(clock);
        self.warned_fallback = false;
    }

    pub fn unbind_audio_clock(&mut self) -> Option<Box<dyn AudioClock>> {
        self.clock.take()
    }

    /// Called once each time a session finishes stopping.
    pub fn set_on_finished(&mut self, callback: impl FnMut() + 'static) {
        self.on_finished = Some(Box::new(callback));
    }

    pub fn clear_on_finished(&mut self) {
        self.on_finished = None;
    }

    // ---- curve ownership ----

    /// Install a curve set, replacing any previous one.
    pub fn load_curves(&mut self, set: CurveSet) -> Result<()> {
        if !(set.length.is_finite() && set.length > 0.0) {
            return Err(LipSyncError::InvalidConfig {
                reason: format!("curve set length must be > 0 (got {})", set.length),
            });
        }
        log::debug!(
            "installing curve set: {} channel(s), {} bone(s), length {}s",
            set.channels.len(),
            set.bones.len(),
            set.length
        );
        self.curves = Some(set);
        self.stale = false;
        Ok(())
    }

    /// Synthesize from `store` and install the result. On error the previous
    /// set stays installed.
    pub fn synthesize(
        &mut self,
        store: &MarkerStore,
        library: &ShapeLibrary,
        synth: &mut Synthesizer,
    ) -> Result<()> {
        let set = synth.synthesize_store(store, library)?;
        self.load_curves(set)
    }

    /// Mark the installed set stale so the next preview re-synthesizes.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    pub fn take_curves(&mut self) -> Option<CurveSet> {
        self.curves.take()
    }

    // ---- state machine ----

    fn begin_call(&mut self) {
        if self.delivered {
            self.events.clear();
            self.delivered = false;
        }
    }

    fn length(&self) -> Option<f32> {
        self.curves.as_ref().map(|c| c.length)
    }

    /// Start playback from cursor 0 after `delay` seconds.
    pub fn play(&mut self, delay: f32) -> Result<()> {
        if self.curves.is_none() {
            return Err(LipSyncError::NoCurveSet);
        }
        self.start_session(0.0, delay);
        Ok(())
    }

    /// Start playback at `seconds` into the clip after `delay` seconds.
    pub fn play_from(&mut self, seconds: f32, delay: f32) -> Result<()> {
        let length = self.length().ok_or(LipSyncError::NoCurveSet)?;
        if !(seconds.is_finite() && seconds >= 0.0 && seconds < length) {
            return Err(LipSyncError::SeekOutOfRange {
                time: seconds,
                length,
            });
        }
        self.start_session(seconds / length, delay);
        Ok(())
    }

    fn start_session(&mut self, cursor: f32, delay: f32) {
        self.begin_call();
        self.cursor = cursor;
        self.origin = cursor;
        self.frames = 0;
        self.delay_remaining = delay.max(0.0);
        self.blend_cursor = 0.0;
        self.blend_frames = 0;
        self.warned_fallback = false;
        self.awaiting_rewind = false;
        self.state = PlaybackState::Playing;
        let seconds = cursor * self.length().unwrap_or(0.0);
        if let Some(clock) = self.clock.as_mut() {
            clock.play(seconds, self.delay_remaining);
        }
        log::debug!("playback started at cursor {cursor} (delay {}s)", self.delay_remaining);
        self.events.push(PlaybackEvent::Started { cursor });
    }

    pub fn pause(&mut self) -> Result<()> {
        if !self.state.can_pause() {
            return Err(LipSyncError::invalid_state(self.state.name(), "paused"));
        }
        self.begin_call();
        self.state = PlaybackState::Paused;
        if let Some(clock) = self.clock.as_mut() {
            clock.pause();
        }
        self.events.push(PlaybackEvent::Paused {
            cursor: self.cursor,
        });
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.state.can_resume() {
            return Err(LipSyncError::invalid_state(self.state.name(), "playing"));
        }
        self.begin_call();
        self.state = PlaybackState::Playing;
        if let Some(clock) = self.clock.as_mut() {
            clock.resume();
        }
        self.events.push(PlaybackEvent::Resumed {
            cursor: self.cursor,
        });
        Ok(())
    }

    /// Blend every curve from its current value to its end value, then go idle.
    /// `flush_audio` forwards a stop to the bound audio clock.
    pub fn stop(&mut self, flush_audio: bool) -> Result<()> {
        if !self.state.can_stop() {
            return Err(LipSyncError::invalid_state(self.state.name(), "stopping"));
        }
        self.begin_call();
        self.enter_stopping(flush_audio);
        Ok(())
    }

    fn enter_stopping(&mut self, flush_audio: bool) {
        match &self.curves {
            Some(curves) => curves.blend_to_end_into(self.cursor, &mut self.blend),
            None => {
                self.blend.channels.clear();
                self.blend.bones.clear();
            }
        }
        if flush_audio {
            if let Some(clock) = self.clock.as_mut() {
                clock.stop();
            }
        }
        self.delay_remaining = 0.0;
        self.blend_cursor = 0.0;
        self.blend_frames = 0;
        self.state = PlaybackState::Stopping;
        log::debug!("stopping at cursor {}", self.cursor);
        self.events.push(PlaybackEvent::Stopping {
            cursor: self.cursor,
        });
    }

    fn finish(&mut self) {
        self.state = PlaybackState::Idle;
        log::debug!("playback finished");
        self.events.push(PlaybackEvent::Finished);
        if let Some(callback) = self.on_finished.as_mut() {
            callback();
        }
    }

    // ---- per-tick ----

    /// Advance by `dt` seconds, polling the bound audio clock in
    /// `AudioPlayback` mode, and write values to `sink`.
    /// Returns the events raised since the previous tick.
    pub fn tick<S: BlendSink + ?Sized>(&mut self, dt: f32, sink: &mut S) -> &[PlaybackEvent] {
        let position = match (self.config.timing_mode, self.clock.as_ref()) {
            (TimingMode::AudioPlayback, Some(clock)) if self.state == PlaybackState::Playing => {
                clock.position()
            }
            _ => None,
        };
        self.tick_with_position(dt, position, sink)
    }

    /// Like [`tick`](Self::tick) with an externally sampled audio position
    /// (seconds) instead of the bound clock.
    pub fn tick_with_position<S: BlendSink + ?Sized>(
        &mut self,
        dt: f32,
        position: Option<f32>,
        sink: &mut S,
    ) -> &[PlaybackEvent] {
        self.begin_call();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        match self.state {
            PlaybackState::Idle | PlaybackState::Paused => {}
            PlaybackState::Playing => self.step_playing(dt, position, sink),
            PlaybackState::Stopping => self.step_stopping(dt, sink),
        }
        self.delivered = true;
        self.events.as_slice()
    }

    #[inline]
    fn frame_step(&self) -> f32 {
        1.0 / self.config.frame_rate as f32
    }

    fn step_playing<S: BlendSink + ?Sized>(&mut self, dt: f32, position: Option<f32>, sink: &mut S) {
        let Some(curves) = self.curves.as_ref() else {
            self.state = PlaybackState::Idle;
            return;
        };
        let length = curves.length;
        let fixed = self.config.timing_mode == TimingMode::FixedFrameRate;

        if self.delay_remaining > 0.0 {
            let step = if fixed { self.frame_step() } else { dt };
            self.delay_remaining -= step;
            if self.delay_remaining <= 0.0 {
                self.delay_remaining = 0.0;
                self.frames = 0;
                self.cursor = self.origin;
                log::debug!("start delay elapsed");
            }
            return;
        }

        match self.config.timing_mode {
            TimingMode::AudioPlayback => match position {
                Some(seconds) if seconds.is_finite() => {
                    let cursor = seconds / length;
                    if self.awaiting_rewind && cursor >= self.config.completion_threshold {
                        // audio has not restarted yet; run on the frame delta
                        self.cursor += dt / length;
                    } else {
                        self.awaiting_rewind = false;
                        self.cursor = cursor;
                    }
                }
                _ => {
                    if !self.warned_fallback {
                        log::warn!("no audio position available; falling back to custom timer");
                        self.warned_fallback = true;
                    }
                    self.cursor += dt / length;
                }
            },
            TimingMode::CustomTimer => self.cursor += dt / length,
            TimingMode::FixedFrameRate => {
                self.frames += 1;
                let per_clip = self.config.frame_rate as f32 * length;
                self.cursor = self.origin + self.frames as f32 / per_clip;
            }
        }

        write_curves(curves, self.cursor, sink);

        if self.cursor >= self.config.completion_threshold {
            if self.config.loop_playback {
                self.cursor = 0.0;
                self.origin = 0.0;
                self.frames = 0;
                self.awaiting_rewind = true;
                if let Some(clock) = self.clock.as_mut() {
                    clock.play(0.0, 0.0);
                }
                log::debug!("looping");
                self.events.push(PlaybackEvent::Looped);
            } else {
                self.enter_stopping(false);
            }
        }
    }

    fn step_stopping<S: BlendSink + ?Sized>(&mut self, dt: f32, sink: &mut S) {
        let hold = self.config.rest_hold_time;
        if hold <= 0.0 {
            self.blend_cursor = 1.0;
        } else if self.config.timing_mode == TimingMode::FixedFrameRate {
            self.blend_frames += 1;
            self.blend_cursor = self.blend_frames as f32 / (self.config.frame_rate as f32 * hold);
        } else {
            self.blend_cursor += dt / hold;
        }

        if self.blend_cursor >= self.config.completion_threshold {
            // land exactly on the end values
            write_curves(&self.blend, 1.0, sink);
            self.finish();
        } else {
            write_curves(&self.blend, self.blend_cursor, sink);
        }
    }

    // ---- scrubbing ----

    /// Sample every curve at normalized time `t` without touching playback
    /// state. Re-synthesizes first when the installed set is missing or stale.
    pub fn preview_at_time<S: BlendSink + ?Sized>(
        &mut self,
        t: f32,
        store: &MarkerStore,
        library: &ShapeLibrary,
        synth: &mut Synthesizer,
        sink: &mut S,
    ) -> Result<()> {
        if self.is_stale(store, synth) {
            if self.curves.is_none() && store.is_empty() {
                return Err(LipSyncError::NoCurveSet);
            }
            self.synthesize(store, library, synth)?;
        }
        let curves = self.curves.as_ref().ok_or(LipSyncError::NoCurveSet)?;
        write_curves(curves, t, sink);
        Ok(())
    }
}
