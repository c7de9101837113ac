//! Error types for NBS decoding and encoding

use thiserror::Error;

/// Errors that can occur when decoding or encoding an NBS song
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NbsError {
    /// Fewer bytes remain than a read requires
    #[error("Unexpected end of data at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    /// Recognizable but unsupported or invalid structure
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Structural problems with an NBS buffer or with a song that cannot be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Buffer is shorter than the smallest possible header
    #[error("Data too small to contain an NBS header")]
    TooSmall,
    /// Format version byte is outside the supported range
    #[error("Unsupported NBS version: {0} (max {max})", max = crate::MAX_VERSION)]
    UnsupportedVersion(u8),
    /// Header declares a negative layer count
    #[error("Invalid layer count: {0}")]
    InvalidLayerCount(i16),
    /// Header tempo is zero or negative
    #[error("Invalid tempo: {0} (must be positive)")]
    InvalidTempo(i16),
    /// Song has more layers than the header can declare
    #[error("Too many layers: {0} (max {max})", max = crate::MAX_LAYERS)]
    TooManyLayers(usize),
    /// Song is longer than the header's length field can hold
    #[error("Song too long: {0} ticks (max {max})", max = crate::MAX_SONG_LENGTH)]
    SongTooLong(u32),
    /// More custom instruments than the count byte or the id space can hold
    #[error("Too many custom instruments: {count} (max {max})")]
    TooManyCustomInstruments { count: usize, max: usize },
    /// Classic files always number custom instruments from 10
    #[error("Classic songs need a vanilla instrument count of 10, found {0}")]
    ClassicInstrumentCount(u8),
}

/// A note references an instrument id with no catalogue entry
///
/// Non-fatal: playback skips the note instead of aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unresolved instrument id {id}")]
pub struct UnresolvedInstrument {
    pub id: u8,
}
