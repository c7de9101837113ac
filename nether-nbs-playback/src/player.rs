//! Real-time player: a scheduler on a thread clock plus a persistent event stream
//!
//! Loading a song drops the previous scheduler first, which stops and joins
//! its clock thread before the new one exists.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use nether_nbs::Song;
use tracing::{debug, trace};

use crate::DEFAULT_SPEED;
use crate::clock::{ClockTick, ThreadClock};
use crate::error::PlaybackError;
use crate::events::{ChannelListener, PlayState, PlaybackEvent};
use crate::scheduler::{Scheduler, TickReport};

/// Loaded song with its own clock and tick receiver
struct Session {
    scheduler: Scheduler<ThreadClock>,
    ticks: Receiver<ClockTick>,
}

pub struct Player {
    session: Option<Session>,
    events: Sender<PlaybackEvent>,
    speed: f64,
}

impl Player {
    /// Create an empty player and the receiver for every song's events
    pub fn new() -> (Self, Receiver<PlaybackEvent>) {
        let (events, rx) = mpsc::channel();
        let player = Self {
            session: None,
            events,
            speed: DEFAULT_SPEED,
        };
        (player, rx)
    }

    /// Tempo multiplier for songs loaded after this call
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Decode and load a song, replacing the current one
    ///
    /// On a decode error the current song stays loaded.
    pub fn load(&mut self, bytes: &[u8]) -> Result<&Song, PlaybackError> {
        let song = nether_nbs::decode(bytes)?;
        Ok(self.load_song(song))
    }

    pub fn load_song(&mut self, song: Song) -> &Song {
        self.unload();

        let (clock, ticks) = ThreadClock::new();
        let scheduler = Scheduler::new(song, clock)
            .with_speed(self.speed)
            .with_listener(ChannelListener::from_sender(self.events.clone()));
        debug!(
            name = %scheduler.song().name,
            length = scheduler.length(),
            "Song loaded"
        );

        let session = self.session.insert(Session { scheduler, ticks });
        session.scheduler.song()
    }

    /// Stop and drop the current song, returning it
    pub fn unload(&mut self) -> Option<Song> {
        let session = self.session.take()?;
        let was_playing = !session.scheduler.is_paused();
        let song = session.scheduler.into_song();
        if was_playing {
            let _ = self.events.send(PlaybackEvent::StateChanged(PlayState::Paused));
        }
        Some(song)
    }

    pub fn song(&self) -> Option<&Song> {
        self.session.as_ref().map(|s| s.scheduler.song())
    }

    pub fn scheduler(&self) -> Option<&Scheduler<ThreadClock>> {
        self.session.as_ref().map(|s| &s.scheduler)
    }

    pub fn scheduler_mut(&mut self) -> Option<&mut Scheduler<ThreadClock>> {
        self.session.as_mut().map(|s| &mut s.scheduler)
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler().is_some_and(|s| !s.is_paused())
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.scheduler_mut().ok_or(PlaybackError::NoSong)?.play()
    }

    pub fn pause(&mut self) {
        if let Some(scheduler) = self.scheduler_mut() {
            scheduler.pause();
        }
    }

    pub fn toggle(&mut self) -> Result<(), PlaybackError> {
        self.scheduler_mut().ok_or(PlaybackError::NoSong)?.toggle()
    }

    /// Wait up to `timeout` for one clock tick and advance on it
    ///
    /// Returns `None` on timeout, when nothing is loaded or playing, or when
    /// the tick was produced by a clock run that has since been stopped.
    pub fn pump(&mut self, timeout: Duration) -> Option<TickReport> {
        let session = self.session.as_mut()?;
        let tick = match session.ticks.recv_timeout(timeout) {
            Ok(tick) => tick,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => {
                trace!("Clock channel disconnected");
                return None;
            }
        };

        if !session.scheduler.source().is_current(tick) {
            trace!(generation = tick.generation, "Dropping stale clock tick");
            return None;
        }
        session.scheduler.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TickOutcome;
    use nether_nbs::{Note, Tempo};

    const PATIENCE: Duration = Duration::from_secs(2);

    fn fast_song(length: u32) -> Song {
        let mut song = Song::new("Fast");
        song.tempo = Tempo::from_centi(i16::MAX as u16).unwrap();
        for tick in 0..length {
            song.set_note(0, tick, Note::new(0, 45 + (tick % 40) as u8));
        }
        song
    }

    fn run_to_end(player: &mut Player) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for _ in 0..100 {
            if let Some(report) = player.pump(PATIENCE) {
                reports.push(report);
                if report.outcome == TickOutcome::Finished {
                    break;
                }
            }
        }
        reports
    }

    #[test]
    fn test_play_without_song() {
        let (mut player, _events) = Player::new();
        assert!(matches!(player.play(), Err(PlaybackError::NoSong)));
        assert!(player.pump(Duration::from_millis(1)).is_none());
        player.pause();
    }

    #[test]
    fn test_plays_song_to_end() {
        let (mut player, events) = Player::new();
        let bytes = nether_nbs::encode(&fast_song(3)).unwrap();
        assert_eq!(player.load(&bytes).unwrap().length(), 3);

        player.play().unwrap();
        let reports = run_to_end(&mut player);
        let ticks: Vec<u32> = reports.iter().map(|r| r.tick).collect();
        assert_eq!(ticks, [0, 1, 2]);
        assert!(!player.is_playing());

        let keys: Vec<u8> = events
            .try_iter()
            .filter_map(|ev| match ev {
                PlaybackEvent::NoteTriggered(note) => Some(note.key),
                _ => None,
            })
            .collect();
        assert_eq!(keys, [45, 46, 47]);
    }

    #[test]
    fn test_load_replaces_playing_song() {
        let (mut player, events) = Player::new();
        player.load_song(fast_song(1000));
        player.play().unwrap();
        assert!(player.pump(PATIENCE).is_some());

        let loaded = player.load_song(fast_song(2)).length();
        assert_eq!(loaded, 2);
        assert!(!player.is_playing());

        let states: Vec<PlayState> = events
            .try_iter()
            .filter_map(|ev| match ev {
                PlaybackEvent::StateChanged(state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, [PlayState::Playing, PlayState::Paused]);

        player.play().unwrap();
        let ticks: Vec<u32> = run_to_end(&mut player).iter().map(|r| r.tick).collect();
        assert_eq!(ticks, [0, 1]);
    }

    #[test]
    fn test_ticks_from_before_pause_are_dropped() {
        let (mut player, _events) = Player::new();
        player.load_song(fast_song(1000));
        player.play().unwrap();
        assert_eq!(player.pump(PATIENCE).unwrap().tick, 0);

        // Let the first clock run queue ticks nobody pumps
        std::thread::sleep(Duration::from_millis(30));
        player.pause();
        player.play().unwrap();
        let cursor = player.scheduler().unwrap().current_tick();
        assert_eq!(cursor, 1);

        // The oldest queued tick belongs to the stopped run
        assert!(player.pump(PATIENCE).is_none());
        assert_eq!(player.scheduler().unwrap().current_tick(), cursor);

        let report = (0..1000)
            .find_map(|_| player.pump(PATIENCE))
            .unwrap();
        assert_eq!(report.tick, cursor);
    }

    #[test]
    fn test_load_error_keeps_current_song() {
        let (mut player, _events) = Player::new();
        player.load_song(fast_song(4));
        assert!(matches!(
            player.load(&[0u8; 8]),
            Err(PlaybackError::Decode(_))
        ));
        assert_eq!(player.song().unwrap().length(), 4);
    }
}
