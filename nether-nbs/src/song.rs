//! In-memory song model: a Song owns Layers, each a sparse tick -> Note map

use std::collections::BTreeMap;
use std::time::Duration;

use crate::instrument::{Instrument, InstrumentRegistry};
use crate::{
    BUILTIN_INSTRUMENT_COUNT, CURRENT_VERSION, DEFAULT_TEMPO, KEY_MAX, PANNING_MAX, PANNING_MIN,
    PITCH_MAX, PITCH_MIN, VELOCITY_MAX,
};

// =============================================================================
// Tempo
// =============================================================================

/// Playback rate in hundredths of a tick per second
///
/// Always positive: zero is rejected by [`Tempo::from_centi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tempo(u16);

impl Tempo {
    /// Build from hundredths of a tick per second (1..=32767)
    pub fn from_centi(centi: u16) -> Option<Self> {
        (centi > 0 && centi <= i16::MAX as u16).then_some(Self(centi))
    }

    /// Build from ticks per second, rounded to the nearest hundredth
    pub fn from_ticks_per_second(tps: f64) -> Option<Self> {
        if !tps.is_finite() {
            return None;
        }
        let centi = (tps * 100.0).round();
        if centi < 1.0 || centi > i16::MAX as f64 {
            return None;
        }
        Some(Self(centi as u16))
    }

    /// Raw wire value (hundredths of a tick per second)
    #[inline]
    pub fn centi(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn ticks_per_second(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Real time between two ticks (`1000 ms / tempo`)
    pub fn tick_period(self) -> Duration {
        Duration::from_nanos(100_000_000_000 / self.0 as u64)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(DEFAULT_TEMPO)
    }
}

// =============================================================================
// Note
// =============================================================================

/// Note fields that have a documented range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
    Key,
    Velocity,
    Panning,
    Pitch,
}

/// A single note block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note {
    /// Instrument id into the combined catalogue (reference, not ownership)
    pub instrument: u8,
    /// Pitch position, playable range 0-87 (45 = F#4)
    pub key: u8,
    /// Volume percentage, 0-100
    pub velocity: u8,
    /// Stereo offset, -100 (left) to 100 (right)
    pub panning: i16,
    /// Fine tune in cents
    pub pitch: i16,
}

impl Note {
    /// Create a note with full velocity, centred and untuned
    pub fn new(instrument: u8, key: u8) -> Self {
        Self {
            instrument,
            key,
            velocity: VELOCITY_MAX,
            panning: 0,
            pitch: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_panning(mut self, panning: i16) -> Self {
        self.panning = panning;
        self
    }

    pub fn with_pitch(mut self, pitch: i16) -> Self {
        self.pitch = pitch;
        self
    }

    /// Fields holding values outside their documented range
    pub fn range_violations(&self) -> impl Iterator<Item = NoteField> + use<> {
        [
            (self.key > KEY_MAX).then_some(NoteField::Key),
            (self.velocity > VELOCITY_MAX).then_some(NoteField::Velocity),
            (!(PANNING_MIN..=PANNING_MAX).contains(&self.panning)).then_some(NoteField::Panning),
            (!(PITCH_MIN..=PITCH_MAX).contains(&self.pitch)).then_some(NoteField::Pitch),
        ]
        .into_iter()
        .flatten()
    }

    #[inline]
    pub fn is_in_range(&self) -> bool {
        self.range_violations().next().is_none()
    }

    /// Piano name of the key, e.g. `F#4` for key 45 or `A-0` for key 0
    pub fn key_name(&self) -> String {
        key_name(self.key)
    }
}

/// Piano name for a key position
pub fn key_name(key: u8) -> String {
    const KEY_TEXT: [&str; 12] = [
        "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
    ];
    let offset = key as i32 - 3;
    let text = KEY_TEXT[offset.rem_euclid(12) as usize];
    let octave = offset.div_euclid(12) + 1;
    format!("{text}{octave}")
}

// =============================================================================
// Layer
// =============================================================================

/// One parallel track of notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub locked: bool,
    /// Layer volume percentage, 0-100
    pub volume: u8,
    /// Layer stereo offset, -100 to 100
    pub panning: i16,
    pub(crate) notes: BTreeMap<u32, Note>,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            name: String::new(),
            locked: false,
            volume: VELOCITY_MAX,
            panning: 0,
            notes: BTreeMap::new(),
        }
    }
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Note at a tick, if any
    #[inline]
    pub fn note_at(&self, tick: u32) -> Option<&Note> {
        self.notes.get(&tick)
    }

    /// Sparse note map, ascending by tick
    pub fn notes(&self) -> &BTreeMap<u32, Note> {
        &self.notes
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Highest tick holding a note
    pub fn last_tick(&self) -> Option<u32> {
        self.notes.keys().next_back().copied()
    }
}

// =============================================================================
// Editor bookkeeping
// =============================================================================

/// Header fields written by the editor that do not affect playback
///
/// Carried so that encoding reproduces the original header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorInfo {
    pub auto_save: bool,
    /// Auto-save interval in minutes
    pub auto_save_interval: u8,
    /// Beats per bar shown by the editor
    pub time_signature: u8,
    pub minutes_spent: i32,
    pub left_clicks: i32,
    pub right_clicks: i32,
    pub blocks_added: i32,
    pub blocks_removed: i32,
    /// Name of the MIDI or schematic file the song was imported from
    pub imported_file: String,
}

impl Default for EditorInfo {
    fn default() -> Self {
        Self {
            auto_save: false,
            auto_save_interval: 10,
            time_signature: 4,
            minutes_spent: 0,
            left_clicks: 0,
            right_clicks: 0,
            blocks_added: 0,
            blocks_removed: 0,
            imported_file: String::new(),
        }
    }
}

// =============================================================================
// Song
// =============================================================================

/// A decoded note block song
///
/// `length`, `loop_start` and the playback cursor are kept consistent by the
/// mutating methods: `current_tick` and `loop_start` never exceed `length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Format version (0 = classic layout)
    pub version: u8,
    /// Built-in instruments the file was written against; first custom id
    pub vanilla_instrument_count: u8,
    pub name: String,
    pub author: String,
    pub original_author: String,
    pub description: String,
    pub tempo: Tempo,
    pub looping: bool,
    /// Loops before stopping (0 = forever)
    pub max_loop_count: u8,
    pub editor: EditorInfo,
    pub custom_instruments: Vec<Instrument>,
    pub(crate) layers: Vec<Layer>,
    pub(crate) length: u32,
    pub(crate) loop_start: u32,
    pub(crate) current_tick: u32,
    pub(crate) paused: bool,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            vanilla_instrument_count: BUILTIN_INSTRUMENT_COUNT as u8,
            name: String::new(),
            author: String::new(),
            original_author: String::new(),
            description: String::new(),
            tempo: Tempo::default(),
            looping: false,
            max_loop_count: 0,
            editor: EditorInfo::default(),
            custom_instruments: Vec::new(),
            layers: Vec::new(),
            length: 0,
            loop_start: 0,
            current_tick: 0,
            paused: true,
        }
    }
}

impl Song {
    /// Empty song in the current format version
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    // ---- playback state -----------------------------------------------------

    /// Total tick count: one past the highest tick holding a note
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    pub fn loop_start(&self) -> u32 {
        self.loop_start
    }

    #[inline]
    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Move the playback cursor, clamped to `[0, length]`
    pub fn set_current_tick(&mut self, tick: u32) {
        self.current_tick = tick.min(self.length);
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Set the loop-start tick, clamped to `length`
    pub fn set_loop_start(&mut self, tick: u32) {
        self.loop_start = tick.min(self.length);
    }

    /// Real-time duration of one pass through the song
    pub fn duration(&self) -> Duration {
        self.tempo.tick_period() * self.length
    }

    // ---- layers and notes ---------------------------------------------------

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Mutable access to layer metadata (notes change through [`Song::set_note`])
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    /// Append an empty layer, returning its index
    pub fn add_layer(&mut self, name: impl Into<String>) -> usize {
        self.layers.push(Layer::new(name));
        self.layers.len() - 1
    }

    /// Place a note, creating default layers up to `layer` as needed
    ///
    /// Returns the note previously at that position.
    pub fn set_note(&mut self, layer: usize, tick: u32, note: Note) -> Option<Note> {
        if self.layers.len() <= layer {
            self.layers.resize_with(layer + 1, Layer::default);
        }
        let previous = self.layers[layer].notes.insert(tick, note);
        self.length = self.length.max(tick.saturating_add(1));
        previous
    }

    /// Remove a note, shrinking `length` if it was the last one
    pub fn remove_note(&mut self, layer: usize, tick: u32) -> Option<Note> {
        let removed = self.layers.get_mut(layer)?.notes.remove(&tick)?;
        self.refresh_length();
        Some(removed)
    }

    /// Notes sounding at a tick, as (layer index, note) in layer order
    pub fn notes_at(&self, tick: u32) -> impl Iterator<Item = (usize, &Note)> {
        self.layers
            .iter()
            .enumerate()
            .filter_map(move |(idx, layer)| layer.note_at(tick).map(|note| (idx, note)))
    }

    /// Total notes across every layer
    pub fn note_count(&self) -> usize {
        self.layers.iter().map(Layer::note_count).sum()
    }

    /// Recompute `length` from the note maps and re-clamp dependent ticks
    pub(crate) fn refresh_length(&mut self) {
        self.length = self
            .layers
            .iter()
            .filter_map(Layer::last_tick)
            .max()
            .map_or(0, |tick| tick.saturating_add(1));
        self.loop_start = self.loop_start.min(self.length);
        self.current_tick = self.current_tick.min(self.length);
    }

    // ---- instruments --------------------------------------------------------

    /// Id assigned to the first custom instrument
    #[inline]
    pub fn first_custom_id(&self) -> u8 {
        self.vanilla_instrument_count
    }

    /// Declare a custom instrument scoped to this song, returning its id
    ///
    /// Returns `None` once no note id is left for another instrument.
    pub fn add_custom_instrument(
        &mut self,
        name: impl Into<String>,
        sound_file: impl Into<String>,
    ) -> Option<u8> {
        let count = self.custom_instruments.len();
        if count >= crate::codec::max_custom_instruments(self.first_custom_id()) {
            return None;
        }
        let id = self.first_custom_id() + count as u8;
        self.custom_instruments
            .push(Instrument::custom(id, name, sound_file));
        Some(id)
    }

    /// Combined built-in + custom catalogue for this song
    pub fn instruments(&self) -> InstrumentRegistry<'_> {
        InstrumentRegistry::for_song(self)
    }
}
