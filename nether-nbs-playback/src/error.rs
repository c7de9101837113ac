//! Playback error types

use nether_nbs::NbsError;
use thiserror::Error;

/// Errors surfaced by playback control
///
/// Steady-state ticking never fails; these only come out of starting a
/// clock or loading a song.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The real-time clock thread could not be spawned
    #[error("Failed to start playback clock: {0}")]
    ClockSpawn(#[from] std::io::Error),
    /// A control call needs a song and none is loaded
    #[error("No song loaded")]
    NoSong,
    /// The song bytes did not decode
    #[error("Failed to decode song: {0}")]
    Decode(#[from] NbsError),
}
