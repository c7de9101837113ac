//! Typed playback events and the listeners that receive them

use std::sync::mpsc::{self, Receiver, Sender};

use nether_nbs::{Layer, Note, UnresolvedInstrument};
use tracing::trace;

use crate::pitch;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayState {
    #[default]
    Paused,
    Playing,
}

impl PlayState {
    #[inline]
    pub fn is_playing(self) -> bool {
        self == PlayState::Playing
    }
}

/// One note fired by a tick advance
///
/// Carries the note fields verbatim plus the owning layer's mix settings, so
/// consumers never reach back into the song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub tick: u32,
    pub layer: usize,
    pub key: u8,
    pub instrument: u8,
    pub velocity: u8,
    pub panning: i16,
    pub pitch: i16,
    pub layer_volume: u8,
    pub layer_panning: i16,
}

impl NoteEvent {
    pub fn new(tick: u32, layer_index: usize, layer: &Layer, note: &Note) -> Self {
        Self {
            tick,
            layer: layer_index,
            key: note.key,
            instrument: note.instrument,
            velocity: note.velocity,
            panning: note.panning,
            pitch: note.pitch,
            layer_volume: layer.volume,
            layer_panning: layer.panning,
        }
    }

    /// Note velocity scaled by the layer volume
    pub fn mixed_velocity(&self) -> u8 {
        let scaled = self.velocity as u32 * self.layer_volume as u32 / 100;
        scaled.min(u8::MAX as u32) as u8
    }

    /// Note panning combined with the layer panning
    ///
    /// A centred layer leaves the note as is; otherwise the two are averaged.
    pub fn mixed_panning(&self) -> i16 {
        if self.layer_panning == 0 {
            self.panning
        } else {
            ((self.panning as i32 + self.layer_panning as i32) / 2) as i16
        }
    }

    pub fn playback_rate(&self) -> f64 {
        pitch::playback_rate(self.key, self.pitch)
    }

    pub fn gain(&self) -> f32 {
        pitch::gain(self.mixed_velocity())
    }

    pub fn stereo_pan(&self) -> f32 {
        pitch::stereo_pan(self.mixed_panning())
    }
}

/// Every event a scheduler can emit, as a single message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    StateChanged(PlayState),
    NoteTriggered(NoteEvent),
    NoteSkipped {
        tick: u32,
        layer: usize,
        instrument: u8,
    },
}

/// Observer for scheduler output
///
/// All methods default to no-ops so implementors pick what they need.
/// Callbacks are fire-and-forget: the scheduler does not wait on them for
/// anything beyond the call itself.
pub trait PlaybackListener {
    /// Fired on every Paused/Playing transition, including end of song
    fn play_state_changed(&mut self, _state: PlayState) {}

    /// Fired once per resolved note per tick
    fn note_triggered(&mut self, _event: &NoteEvent) {}

    /// Fired for notes whose instrument id has no catalogue entry
    fn note_skipped(&mut self, _tick: u32, _layer: usize, _missing: UnresolvedInstrument) {}
}

/// Forwards events into an mpsc channel
///
/// A dropped receiver is not an error; events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: Sender<PlaybackEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, Receiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: Sender<PlaybackEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: PlaybackEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "Playback event receiver dropped");
        }
    }
}

impl PlaybackListener for ChannelListener {
    fn play_state_changed(&mut self, state: PlayState) {
        self.send(PlaybackEvent::StateChanged(state));
    }

    fn note_triggered(&mut self, event: &NoteEvent) {
        self.send(PlaybackEvent::NoteTriggered(*event));
    }

    fn note_skipped(&mut self, tick: u32, layer: usize, missing: UnresolvedInstrument) {
        self.send(PlaybackEvent::NoteSkipped {
            tick,
            layer,
            instrument: missing.id,
        });
    }
}

/// Adapts a closure over [`PlaybackEvent`] into a listener
pub struct FnListener<F>(F);

impl<F: FnMut(PlaybackEvent)> FnListener<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F: FnMut(PlaybackEvent)> PlaybackListener for FnListener<F> {
    fn play_state_changed(&mut self, state: PlayState) {
        (self.0)(PlaybackEvent::StateChanged(state));
    }

    fn note_triggered(&mut self, event: &NoteEvent) {
        (self.0)(PlaybackEvent::NoteTriggered(*event));
    }

    fn note_skipped(&mut self, tick: u32, layer: usize, missing: UnresolvedInstrument) {
        (self.0)(PlaybackEvent::NoteSkipped {
            tick,
            layer,
            instrument: missing.id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(velocity: u8, panning: i16, layer_volume: u8, layer_panning: i16) -> NoteEvent {
        let mut layer = Layer::new("Test");
        layer.volume = layer_volume;
        layer.panning = layer_panning;
        let note = Note::new(0, 45)
            .with_velocity(velocity)
            .with_panning(panning);
        NoteEvent::new(3, 1, &layer, &note)
    }

    #[test]
    fn test_note_event_mixing() {
        let ev = event(100, 40, 50, 0);
        assert_eq!(ev.tick, 3);
        assert_eq!(ev.layer, 1);
        assert_eq!(ev.mixed_velocity(), 50);
        assert_eq!(ev.mixed_panning(), 40);
        assert_eq!(ev.gain(), 0.25);

        let ev = event(80, 40, 100, -100);
        assert_eq!(ev.mixed_velocity(), 80);
        assert_eq!(ev.mixed_panning(), -30);
        assert_eq!(ev.playback_rate(), 1.0);
    }

    #[test]
    fn test_channel_listener_forwards() {
        let (mut listener, rx) = ChannelListener::new();
        listener.play_state_changed(PlayState::Playing);
        listener.note_skipped(2, 0, UnresolvedInstrument { id: 99 });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            [
                PlaybackEvent::StateChanged(PlayState::Playing),
                PlaybackEvent::NoteSkipped {
                    tick: 2,
                    layer: 0,
                    instrument: 99
                },
            ]
        );
    }

    #[test]
    fn test_channel_listener_tolerates_dropped_receiver() {
        let (mut listener, rx) = ChannelListener::new();
        drop(rx);
        listener.play_state_changed(PlayState::Paused);
    }

    #[test]
    fn test_fn_listener() {
        let mut seen = Vec::new();
        {
            let mut listener = FnListener::new(|ev| seen.push(ev));
            listener.play_state_changed(PlayState::Paused);
            listener.note_triggered(&event(100, 0, 100, 0));
        }
        assert_eq!(seen.len(), 2);
        assert!(matches!(seen[1], PlaybackEvent::NoteTriggered(ev) if ev.key == 45));
    }
}
