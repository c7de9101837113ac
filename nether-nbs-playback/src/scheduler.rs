//! Tick-based playback state machine
//!
//! ```text
//!            play()                    advance() at end, not looping
//!  Paused ───────────► Playing ─────────────────────────────► Paused
//!    ▲                    │
//!    └────── pause() ─────┘
//! ```
//!
//! The scheduler owns its [`Song`] and exactly one [`TickSource`]. It is the
//! only writer of the song's cursor and paused flag.

use std::time::Duration;

use nether_nbs::Song;
use tracing::{debug, trace, warn};

use crate::{DEFAULT_SPEED, MAX_TICK_PERIOD, MIN_TICK_PERIOD};
use crate::clock::TickSource;
use crate::error::PlaybackError;
use crate::events::{NoteEvent, PlayState, PlaybackListener};


/// What a single tick advance did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Tick whose notes were dispatched
    pub tick: u32,
    /// Notes emitted to listeners
    pub triggered: usize,
    /// Notes dropped for an unresolved instrument
    pub skipped: usize,
    pub outcome: TickOutcome,
}

/// Cursor movement at the end of a tick advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cursor moved to the next tick
    Continued,
    /// End reached with looping on; cursor moved to the loop start
    Looped,
    /// End reached; playback paused
    Finished,
}

/// Drives a song's cursor from a tick source and emits note events
pub struct Scheduler<T: TickSource> {
    song: Song,
    source: T,
    listeners: Vec<Box<dyn PlaybackListener>>,
    speed: f64,
    loops_done: u32,
}

impl<T: TickSource> Scheduler<T> {
    /// Take ownership of a song, starting Paused at its current tick
    pub fn new(mut song: Song, source: T) -> Self {
        song.set_paused(true);
        Self {
            song,
            source,
            listeners: Vec::new(),
            speed: DEFAULT_SPEED,
            loops_done: 0,
        }
    }

    /// Tempo multiplier applied to the tick period (2.0 plays twice as fast)
    ///
    /// Takes effect the next time the source starts. Non-positive or
    /// non-finite values are ignored.
    pub fn with_speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        } else {
            warn!(speed, "Ignoring invalid playback speed");
        }
        self
    }

    pub fn with_listener(mut self, listener: impl PlaybackListener + 'static) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&mut self, listener: impl PlaybackListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // ---- inspection ---------------------------------------------------------

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn source(&self) -> &T {
        &self.source
    }

    pub fn state(&self) -> PlayState {
        if self.song.is_paused() {
            PlayState::Paused
        } else {
            PlayState::Playing
        }
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.song.is_paused()
    }

    #[inline]
    pub fn current_tick(&self) -> u32 {
        self.song.current_tick()
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.song.length()
    }

    /// Loop restarts taken since playback last finished
    pub fn loops_done(&self) -> u32 {
        self.loops_done
    }

    /// Real time between ticks at the song tempo and the configured speed
    ///
    /// Scaled periods are kept within `[MIN_TICK_PERIOD, MAX_TICK_PERIOD]`.
    pub fn tick_period(&self) -> Duration {
        let period = self.song.tempo.tick_period();
        if self.speed == DEFAULT_SPEED {
            return period;
        }
        Duration::try_from_secs_f64(period.as_secs_f64() / self.speed)
            .unwrap_or(MAX_TICK_PERIOD)
            .clamp(MIN_TICK_PERIOD, MAX_TICK_PERIOD)
    }

    // ---- control ------------------------------------------------------------

    /// Paused -> Playing
    ///
    /// No-op while already Playing. Starts the tick source only if it is not
    /// already active. A cursor left at the end of the song rewinds to 0.
    /// On a clock failure the scheduler stays Paused.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if !self.song.is_paused() {
            return Ok(());
        }
        if self.song.current_tick() >= self.song.length() {
            self.song.set_current_tick(0);
        }
        if !self.source.is_active() {
            self.source.start(self.tick_period())?;
        }
        self.song.set_paused(false);
        debug!(
            tick = self.song.current_tick(),
            length = self.song.length(),
            "Playback started"
        );
        self.emit_state(PlayState::Playing);
        Ok(())
    }

    /// Playing -> Paused, stopping the tick source before returning
    pub fn pause(&mut self) {
        if self.song.is_paused() {
            return;
        }
        self.source.stop();
        self.song.set_paused(true);
        debug!(tick = self.song.current_tick(), "Playback paused");
        self.emit_state(PlayState::Paused);
    }

    pub fn toggle(&mut self) -> Result<(), PlaybackError> {
        if self.song.is_paused() {
            self.play()
        } else {
            self.pause();
            Ok(())
        }
    }

    /// Move the cursor, clamped to `[0, length]`
    pub fn seek(&mut self, tick: u32) {
        self.song.set_current_tick(tick);
        trace!(tick = self.song.current_tick(), "Seek");
    }

    /// Swap in a new song, tearing down the active source first
    ///
    /// The scheduler ends Paused (emitting the transition if it was Playing)
    /// and the replaced song is returned paused.
    pub fn replace_song(&mut self, mut song: Song) -> Song {
        self.source.stop();
        let was_playing = !self.song.is_paused();

        song.set_paused(true);
        let mut old = std::mem::replace(&mut self.song, song);
        old.set_paused(true);
        self.loops_done = 0;

        if was_playing {
            self.emit_state(PlayState::Paused);
        }
        debug!(name = %self.song.name, "Song replaced");
        old
    }

    /// Stop the source and hand back the song
    pub fn into_song(mut self) -> Song {
        self.source.stop();
        let mut song = std::mem::take(&mut self.song);
        song.set_paused(true);
        song
    }

    // ---- ticking ------------------------------------------------------------

    /// Process one tick
    ///
    /// Returns `None` while Paused: a tick that arrives after `pause` fires
    /// nothing. Otherwise dispatches every layer's note at the cursor, then
    /// moves the cursor on, wrapping or finishing at the end of the song.
    pub fn advance(&mut self) -> Option<TickReport> {
        if self.song.is_paused() {
            trace!("Tick ignored while paused");
            return None;
        }

        let tick = self.song.current_tick();
        let (triggered, skipped) = self.dispatch_notes(tick);

        let next = tick.saturating_add(1);
        let length = self.song.length();
        let outcome = if next < length {
            self.song.set_current_tick(next);
            TickOutcome::Continued
        } else if self.song.looping && self.loop_budget_left() {
            self.loops_done = self.loops_done.saturating_add(1);
            self.song.set_current_tick(self.song.loop_start());
            trace!(loops = self.loops_done, "Looped to {}", self.song.loop_start());
            TickOutcome::Looped
        } else {
            self.song.set_current_tick(length);
            self.finish();
            TickOutcome::Finished
        };

        Some(TickReport {
            tick,
            triggered,
            skipped,
            outcome,
        })
    }

    fn dispatch_notes(&mut self, tick: u32) -> (usize, usize) {
        let registry = self.song.instruments();
        let mut triggered = 0;
        let mut skipped = 0;

        for (index, layer) in self.song.layers().iter().enumerate() {
            let Some(note) = layer.note_at(tick) else {
                continue;
            };
            match registry.try_get(note.instrument) {
                Ok(_) => {
                    let event = NoteEvent::new(tick, index, layer, note);
                    for listener in &mut self.listeners {
                        listener.note_triggered(&event);
                    }
                    triggered += 1;
                }
                Err(missing) => {
                    debug!(tick, layer = index, "Skipping note: {missing}");
                    for listener in &mut self.listeners {
                        listener.note_skipped(tick, index, missing);
                    }
                    skipped += 1;
                }
            }
        }

        (triggered, skipped)
    }

    /// `max_loop_count` of 0 loops forever
    fn loop_budget_left(&self) -> bool {
        self.song.max_loop_count == 0 || self.loops_done < self.song.max_loop_count as u32
    }

    fn finish(&mut self) {
        self.source.stop();
        self.song.set_paused(true);
        self.loops_done = 0;
        debug!(length = self.song.length(), "Playback finished");
        self.emit_state(PlayState::Paused);
    }

    fn emit_state(&mut self, state: PlayState) {
        for listener in &mut self.listeners {
            listener.play_state_changed(state);
        }
    }
}

impl<T: TickSource> Drop for Scheduler<T> {
    fn drop(&mut self) {
        self.source.stop();
    }
}
