//! Nether-NBS Playback: tick-based scheduler for NBS songs
//!
//! Advances a [`Song`](nether_nbs::Song)'s cursor one tick at a time and
//! emits typed note events. No audio is produced here; consumers turn
//! [`NoteEvent`]s into sound or pixels.
//!
//! # Key Features
//!
//! - **Pluggable clock**: any [`TickSource`]; [`ManualTicks`] for tests,
//!   [`ThreadClock`] for real time
//! - **Typed observers**: [`PlaybackListener`] callbacks, or
//!   [`ChannelListener`] for an mpsc stream of [`PlaybackEvent`]s
//! - **Immediate cancellation**: once `pause` returns, no further notes fire
//! - **Loops**: loop start and an optional loop count from the song header
//!
//! # Usage
//!
//! ```ignore
//! use nether_nbs_playback::{ChannelListener, ManualTicks, Scheduler};
//!
//! let song = nether_nbs::decode(&bytes)?;
//! let (listener, events) = ChannelListener::new();
//! let mut scheduler = Scheduler::new(song, ManualTicks::new()).with_listener(listener);
//!
//! scheduler.play()?;
//! while scheduler.advance().is_some() {}
//! ```

use std::time::Duration;

mod clock;
mod error;
mod events;
mod pitch;
mod player;
mod scheduler;

pub use clock::{ClockTick, ManualTicks, ThreadClock, TickSource};
pub use error::PlaybackError;
pub use events::{ChannelListener, FnListener, NoteEvent, PlayState, PlaybackEvent, PlaybackListener};
pub use pitch::{gain, playback_rate, stereo_pan};
pub use player::Player;
pub use scheduler::{Scheduler, TickOutcome, TickReport};

// =============================================================================
// Playback Constants
// =============================================================================

/// Tempo multiplier used unless one is configured
pub const DEFAULT_SPEED: f64 = 1.0;

/// Shortest tick period a speed multiplier can produce
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

/// Longest tick period a speed multiplier can produce (the lowest tempo)
pub const MAX_TICK_PERIOD: Duration = Duration::from_secs(100);

// =============================================================================
// Pitch Constants
// =============================================================================

/// Key at which a sample plays at its recorded rate (F#4)
pub const PITCH_CENTER_KEY: u8 = nether_nbs::DEFAULT_INSTRUMENT_KEY;

pub const SEMITONES_PER_OCTAVE: f64 = 12.0;

/// Fine-tune units per key step
pub const CENTS_PER_SEMITONE: f64 = 100.0;

/// Velocity divisor: full velocity (100) plays at half gain
pub const GAIN_DIVISOR: f32 = 200.0;

/// Panning divisor mapping -100..100 onto -1.0..1.0
pub const PAN_DIVISOR: f32 = 100.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(PITCH_CENTER_KEY, 45);
        assert_eq!(GAIN_DIVISOR, 2.0 * nether_nbs::VELOCITY_MAX as f32);
        assert_eq!(PAN_DIVISOR, nether_nbs::PANNING_MAX as f32);
        let slowest = nether_nbs::Tempo::from_centi(1).unwrap();
        assert_eq!(slowest.tick_period(), MAX_TICK_PERIOD);
    }
}
