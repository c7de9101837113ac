//! Instrument catalogue: the 16 built-in sounds plus song-scoped custom ones

use std::sync::OnceLock;

use crate::error::UnresolvedInstrument;
use crate::song::Song;
use crate::{BUILTIN_INSTRUMENT_COUNT, DEFAULT_INSTRUMENT_KEY};

/// A named sound referenced by notes through its integer id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// Catalogue id (0-15 built-in, first custom id and up for custom)
    pub id: u8,
    /// Display name
    pub name: String,
    /// Sound asset reference (file name only, no path)
    pub sound_file: String,
    /// Key the sound file is recorded at (same 0-87 range as notes)
    pub key: u8,
    /// Whether a piano view should auto-press keys played with this instrument
    pub press_key: bool,
    /// Whether this is one of the process-wide built-ins
    pub built_in: bool,
}

impl Instrument {
    /// Create a custom instrument with default key and no auto-press
    pub fn custom(id: u8, name: impl Into<String>, sound_file: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            sound_file: sound_file.into(),
            key: DEFAULT_INSTRUMENT_KEY,
            press_key: false,
            built_in: false,
        }
    }
}

const BUILTIN_TABLE: [(&str, &str); BUILTIN_INSTRUMENT_COUNT] = [
    ("Harp", "harp.ogg"),
    ("Double Bass", "dbass.ogg"),
    ("Bass Drum", "bdrum.ogg"),
    ("Snare Drum", "sdrum.ogg"),
    ("Click", "click.ogg"),
    ("Guitar", "guitar.ogg"),
    ("Flute", "flute.ogg"),
    ("Bell", "bell.ogg"),
    ("Chime", "chime.ogg"),
    ("Xylophone", "xylophone.ogg"),
    ("Iron Xylophone", "iron_xylophone.ogg"),
    ("Cow Bell", "cow_bell.ogg"),
    ("Didgeridoo", "didgeridoo.ogg"),
    ("Bit", "bit.ogg"),
    ("Banjo", "banjo.ogg"),
    ("Pling", "pling.ogg"),
];

/// The fixed built-in catalogue, constructed once per process
pub fn builtins() -> &'static [Instrument] {
    static BUILTINS: OnceLock<Vec<Instrument>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        BUILTIN_TABLE
            .iter()
            .enumerate()
            .map(|(id, &(name, sound_file))| Instrument {
                id: id as u8,
                name: name.to_string(),
                sound_file: sound_file.to_string(),
                key: DEFAULT_INSTRUMENT_KEY,
                press_key: false,
                built_in: true,
            })
            .collect()
    })
}

/// Look up an instrument id in the built-ins, then in a custom list
///
/// `first_custom_id` is the id of `custom[0]`; files written against fewer
/// built-ins (classic files know only 10) number their custom instruments
/// from that lower count. Returns `None` for ids with no entry.
pub fn resolve(id: u8, first_custom_id: u8, custom: &[Instrument]) -> Option<&Instrument> {
    let builtin_end = (first_custom_id as usize).min(BUILTIN_INSTRUMENT_COUNT);
    if (id as usize) < builtin_end {
        return builtins().get(id as usize);
    }
    custom.get((id as usize).checked_sub(first_custom_id as usize)?)
}

/// Resolve a note's instrument id against a song's combined catalogue
pub fn resolve_instrument(id: u8, song: &Song) -> Option<&Instrument> {
    resolve(id, song.vanilla_instrument_count, &song.custom_instruments)
}

/// Borrowed view over one song's combined catalogue
///
/// Handed to the playback scheduler at construction so it never reaches for
/// global state beyond the immutable built-ins.
#[derive(Debug, Clone, Copy)]
pub struct InstrumentRegistry<'a> {
    first_custom_id: u8,
    custom: &'a [Instrument],
}

impl<'a> InstrumentRegistry<'a> {
    pub fn new(first_custom_id: u8, custom: &'a [Instrument]) -> Self {
        Self {
            first_custom_id,
            custom,
        }
    }

    /// Registry over a song's built-in count and custom instruments
    pub fn for_song(song: &'a Song) -> Self {
        Self::new(song.vanilla_instrument_count, &song.custom_instruments)
    }

    pub fn get(&self, id: u8) -> Option<&'a Instrument> {
        resolve(id, self.first_custom_id, self.custom)
    }

    pub fn try_get(&self, id: u8) -> Result<&'a Instrument, UnresolvedInstrument> {
        self.get(id).ok_or(UnresolvedInstrument { id })
    }

    /// Number of built-ins visible to this song
    pub fn builtin_count(&self) -> usize {
        (self.first_custom_id as usize).min(BUILTIN_INSTRUMENT_COUNT)
    }

    /// Total number of resolvable instruments
    pub fn len(&self) -> usize {
        self.builtin_count() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All resolvable instruments in id order
    pub fn iter(&self) -> impl Iterator<Item = &'a Instrument> + 'a {
        builtins()[..self.builtin_count()]
            .iter()
            .chain(self.custom.iter())
    }
}
