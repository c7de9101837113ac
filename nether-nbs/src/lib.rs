//! Nether-NBS: NBS (Note Block Song) format decoder and encoder for Nethercore
//!
//! This crate provides a pure Rust codec for the Note Block Studio song format.
//! A song is a set of parallel layers, each a sparse timeline of note blocks
//! (instrument, key, velocity, panning, pitch) indexed by tick.
//!
//! # Key Features
//!
//! - **All format versions**: classic (pre-versioned) files through version 5
//! - **Lossless**: `decode(encode(song))` reproduces the song, editor stats included
//! - **Sparse model**: layers hold `tick -> Note` maps, empty ticks cost nothing
//! - **Song-scoped instruments**: custom instruments resolve after the 16 built-ins
//!
//! # NBS Format Overview
//!
//! NBS files contain:
//! - Header with version, metadata strings, tempo, editor stats and loop settings
//! - Note stream: tick jumps and layer jumps, zero-terminated at both levels
//! - Layer records (name, lock, volume, stereo)
//! - Custom instrument records (name, sound file, key, piano auto-press)
//!
//! # Usage
//!
//! ```ignore
//! use nether_nbs::{decode, encode};
//!
//! let data = std::fs::read("song.nbs").unwrap();
//! let song = decode(&data).unwrap();
//!
//! println!("Song: {}", song.name);
//! println!("Layers: {}", song.layers().len());
//! println!("Length: {} ticks", song.length());
//!
//! let bytes = encode(&song).unwrap();
//! ```
//!
//! # Format Reference
//!
//! - <https://opennbs.org/nbs>

mod codec;
mod error;
mod instrument;
mod io;
mod song;

pub use codec::{decode, encode};
pub use error::{FormatError, NbsError, UnresolvedInstrument};
pub use instrument::{Instrument, InstrumentRegistry, builtins, resolve, resolve_instrument};
pub use io::{Reader, Writer};
pub use song::{EditorInfo, Layer, Note, NoteField, Song, Tempo, key_name};

// =============================================================================
// Format Constants
// =============================================================================

/// Newest format version this crate reads and writes
pub const CURRENT_VERSION: u8 = 5;

/// Highest accepted format version
pub const MAX_VERSION: u8 = CURRENT_VERSION;

/// Classic (version 0) files have no version byte and know 10 built-ins
pub const CLASSIC_VERSION: u8 = 0;

/// Built-in instrument count assumed for classic files
pub const CLASSIC_VANILLA_INSTRUMENTS: u8 = 10;

/// Smallest possible header (classic layout, all strings empty)
///
/// length (2) + layers (2) + 4 strings (16) + tempo (2) + auto-save, interval,
/// time signature (3) + 5 stats (20) + imported file name (4)
pub const MIN_HEADER_SIZE: usize = 49;

/// Maximum number of layers a header can declare
pub const MAX_LAYERS: usize = i16::MAX as usize;

/// Maximum song length in ticks (the header stores it as a signed short)
pub const MAX_SONG_LENGTH: u32 = i16::MAX as u32;

/// Wire value for centred panning (stored unsigned, 0-200)
pub const WIRE_PANNING_CENTER: i16 = 100;

// =============================================================================
// Model Constants
// =============================================================================

/// Number of built-in instruments
pub const BUILTIN_INSTRUMENT_COUNT: usize = 16;

/// Key an instrument sound is recorded at unless stated otherwise (F#4)
pub const DEFAULT_INSTRUMENT_KEY: u8 = 45;

/// Default tempo: 10.00 ticks per second
pub const DEFAULT_TEMPO: u16 = 1000;

/// Highest playable key (C-8)
pub const KEY_MAX: u8 = 87;

/// Full velocity / layer volume
pub const VELOCITY_MAX: u8 = 100;

/// Hard left
pub const PANNING_MIN: i16 = -100;

/// Hard right
pub const PANNING_MAX: i16 = 100;

/// Lowest fine tune the editor offers (one octave down, in cents)
pub const PITCH_MIN: i16 = -1200;

/// Highest fine tune the editor offers (one octave up, in cents)
pub const PITCH_MAX: i16 = 1200;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(MAX_VERSION, 5);
        assert!(CLASSIC_VANILLA_INSTRUMENTS as usize <= BUILTIN_INSTRUMENT_COUNT);
        assert_eq!(MIN_HEADER_SIZE, 2 + 2 + 16 + 2 + 3 + 20 + 4);
        assert!(MAX_SONG_LENGTH <= i16::MAX as u32);
    }

    #[test]
    fn test_range_constants() {
        assert_eq!(KEY_MAX, 87);
        assert_eq!(VELOCITY_MAX, 100);
        assert_eq!(PANNING_MIN, -PANNING_MAX);
        assert_eq!(WIRE_PANNING_CENTER, PANNING_MAX);
    }
}
