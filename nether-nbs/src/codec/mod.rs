//! NBS codec
//!
//! - `read` - Decoding raw bytes into a [`Song`](crate::Song)
//! - `write` - Encoding a song back into bytes for its declared version
//! - `tests` - Round-trip and malformed-input tests
//!
//! Header fields are gated by format version:
//!
//! | Field                         | Present from |
//! |-------------------------------|--------------|
//! | version byte, vanilla count   | 1            |
//! | layer stereo                  | 2            |
//! | stored song length            | 0 and 3+     |
//! | note velocity/panning/pitch   | 4            |
//! | layer lock, loop settings     | 4            |

mod read;
mod write;

#[cfg(test)]
mod tests;

pub use read::decode;
pub use write::encode;

/// Note velocity, panning and pitch are on the wire
#[inline]
pub(crate) fn has_note_details(version: u8) -> bool {
    version >= 4
}

/// Layer lock flag and the loop settings are on the wire
#[inline]
pub(crate) fn has_lock_and_loop(version: u8) -> bool {
    version >= 4
}

/// Layer stereo byte is on the wire
#[inline]
pub(crate) fn has_layer_panning(version: u8) -> bool {
    version >= 2
}

/// Header carries a stored song length (classic files lead with it)
#[inline]
pub(crate) fn has_stored_length(version: u8) -> bool {
    version == crate::CLASSIC_VERSION || version >= 3
}

/// Custom instruments addressable by a u8 note id after `vanilla` built-ins
///
/// Also bounded by the u8 count byte in front of the list.
#[inline]
pub(crate) fn max_custom_instruments(vanilla: u8) -> usize {
    (u8::MAX as usize + 1 - vanilla as usize).min(u8::MAX as usize)
}

/// Convert an unsigned wire panning byte (100 = centre) to -100..100
#[inline]
pub(crate) fn panning_from_wire(byte: u8) -> i16 {
    byte as i16 - crate::WIRE_PANNING_CENTER
}

/// Convert a model panning to its wire byte
///
/// Only values the byte cannot hold at all are clamped; anything decoded
/// from a file maps back to the byte it came from.
#[inline]
pub(crate) fn panning_to_wire(panning: i16) -> u8 {
    (panning as i32 + crate::WIRE_PANNING_CENTER as i32).clamp(0, u8::MAX as i32) as u8
}
