//! NBS decoding

use tracing::{debug, warn};

use crate::error::{FormatError, NbsError};
use crate::instrument::Instrument;
use crate::io::Reader;
use crate::song::{EditorInfo, Layer, Note, Song, Tempo};
use crate::{
    CLASSIC_VANILLA_INSTRUMENTS, CLASSIC_VERSION, MAX_LAYERS, MAX_VERSION, MIN_HEADER_SIZE,
    VELOCITY_MAX,
};

use super::{
    has_layer_panning, has_lock_and_loop, has_note_details, has_stored_length,
    max_custom_instruments, panning_from_wire,
};

/// Decode an NBS file into a Song
///
/// # Arguments
/// * `data` - Raw NBS file bytes
///
/// # Returns
/// * `Ok(Song)` - Decoded song, paused at tick 0
/// * `Err(NbsError::Format)` - Too small, unsupported version or invalid header
/// * `Err(NbsError::Truncated)` - Data ends in the middle of a section
///
/// A buffer that ends exactly where the note stream, the layer records or the
/// custom instrument list would begin is accepted with those sections empty;
/// older writers stopped there.
///
/// # Example
/// ```ignore
/// let data = std::fs::read("song.nbs")?;
/// let song = decode(&data)?;
/// println!("Loaded: {} ({} ticks)", song.name, song.length());
/// ```
pub fn decode(data: &[u8]) -> Result<Song, NbsError> {
    if data.len() < MIN_HEADER_SIZE {
        return Err(FormatError::TooSmall.into());
    }

    let mut reader = Reader::new(data);
    let header = read_header(&mut reader)?;

    let mut song = Song {
        version: header.version,
        vanilla_instrument_count: header.vanilla_instrument_count,
        name: header.name,
        author: header.author,
        original_author: header.original_author,
        description: header.description,
        tempo: header.tempo,
        looping: header.looping,
        max_loop_count: header.max_loop_count,
        editor: header.editor,
        ..Song::default()
    };

    if reader.is_empty() {
        debug!("NBS data ends after the header; treating song as empty");
    } else {
        read_note_stream(&mut reader, song.version, &mut song.layers)?;
    }

    if song.layers.len() > header.layer_count {
        debug!(
            declared = header.layer_count,
            used = song.layers.len(),
            "Notes reference layers beyond the declared count; using layer defaults"
        );
    }
    song.layers
        .resize_with(song.layers.len().max(header.layer_count), Layer::default);

    // One record per declared layer; a file may stop before the first one
    if !reader.is_empty() {
        for layer in song.layers.iter_mut().take(header.layer_count) {
            read_layer_record(&mut reader, song.version, layer)?;
        }
    }

    if reader.is_empty() {
        debug!("NBS data ends before the custom instrument list");
    } else {
        song.custom_instruments =
            read_custom_instruments(&mut reader, song.vanilla_instrument_count)?;
    }

    if !reader.is_empty() {
        debug!(
            trailing = reader.remaining(),
            "Ignoring trailing bytes after NBS data"
        );
    }

    song.refresh_length();
    check_stored_length(header.stored_length, song.length);

    let loop_start = header.loop_start.max(0) as u32;
    if loop_start > song.length {
        warn!(
            loop_start,
            length = song.length,
            "Loop start is past the end of the song; clamping"
        );
    }
    song.loop_start = loop_start.min(song.length);

    report_range_violations(&song);

    Ok(song)
}

/// Header fields in wire order, with per-version defaults applied
struct Header {
    version: u8,
    vanilla_instrument_count: u8,
    stored_length: Option<i16>,
    layer_count: usize,
    name: String,
    author: String,
    original_author: String,
    description: String,
    tempo: Tempo,
    editor: EditorInfo,
    looping: bool,
    max_loop_count: u8,
    loop_start: i16,
}

fn read_header(reader: &mut Reader<'_>) -> Result<Header, NbsError> {
    // Classic files lead with a nonzero song length; newer ones with 0
    let first = reader.read_i16()?;
    let (version, vanilla_instrument_count, stored_length) = if first != 0 {
        (CLASSIC_VERSION, CLASSIC_VANILLA_INSTRUMENTS, Some(first))
    } else {
        let version = reader.read_u8()?;
        if version == CLASSIC_VERSION || version > MAX_VERSION {
            return Err(FormatError::UnsupportedVersion(version).into());
        }
        let vanilla = reader.read_u8()?;
        let stored = if has_stored_length(version) {
            Some(reader.read_i16()?)
        } else {
            None
        };
        (version, vanilla, stored)
    };

    let layer_count = reader.read_i16()?;
    if layer_count < 0 {
        return Err(FormatError::InvalidLayerCount(layer_count).into());
    }

    let name = reader.read_string()?;
    let author = reader.read_string()?;
    let original_author = reader.read_string()?;
    let description = reader.read_string()?;

    let raw_tempo = reader.read_i16()?;
    let tempo = u16::try_from(raw_tempo)
        .ok()
        .and_then(Tempo::from_centi)
        .ok_or(FormatError::InvalidTempo(raw_tempo))?;

    let editor = EditorInfo {
        auto_save: reader.read_bool()?,
        auto_save_interval: reader.read_u8()?,
        time_signature: reader.read_u8()?,
        minutes_spent: reader.read_i32()?,
        left_clicks: reader.read_i32()?,
        right_clicks: reader.read_i32()?,
        blocks_added: reader.read_i32()?,
        blocks_removed: reader.read_i32()?,
        imported_file: reader.read_string()?,
    };

    let (looping, max_loop_count, loop_start) = if has_lock_and_loop(version) {
        (reader.read_bool()?, reader.read_u8()?, reader.read_i16()?)
    } else {
        (false, 0, 0)
    };

    debug!(
        version,
        layers = layer_count,
        tempo = tempo.ticks_per_second(),
        "Read NBS header"
    );

    Ok(Header {
        version,
        vanilla_instrument_count,
        stored_length,
        layer_count: layer_count as usize,
        name,
        author,
        original_author,
        description,
        tempo,
        editor,
        looping,
        max_loop_count,
        loop_start,
    })
}

/// Walk the tick-jump / layer-jump stream, inserting notes into `layers`
///
/// Both cursors start at -1, so the first jump of each level lands on the
/// absolute index of the first note. A zero tick jump ends the stream; a
/// zero layer jump ends the current tick.
fn read_note_stream(
    reader: &mut Reader<'_>,
    version: u8,
    layers: &mut Vec<Layer>,
) -> Result<(), NbsError> {
    let mut tick: i64 = -1;
    let mut note_count = 0usize;

    loop {
        let tick_jump = reader.read_u16()?;
        if tick_jump == 0 {
            break;
        }
        tick += tick_jump as i64;
        let note_tick = u32::try_from(tick).map_err(|_| FormatError::SongTooLong(u32::MAX))?;

        let mut layer: i64 = -1;
        loop {
            let layer_jump = reader.read_u16()?;
            if layer_jump == 0 {
                break;
            }
            layer += layer_jump as i64;
            let layer_idx = layer as usize;
            if layer_idx >= MAX_LAYERS {
                return Err(FormatError::TooManyLayers(layer_idx + 1).into());
            }

            let note = read_note(reader, version)?;
            if layers.len() <= layer_idx {
                layers.resize_with(layer_idx + 1, Layer::default);
            }
            layers[layer_idx].notes.insert(note_tick, note);
            note_count += 1;
        }
    }

    debug!(notes = note_count, layers = layers.len(), "Read NBS note stream");
    Ok(())
}

fn read_note(reader: &mut Reader<'_>, version: u8) -> Result<Note, NbsError> {
    let instrument = reader.read_u8()?;
    let key = reader.read_u8()?;

    if !has_note_details(version) {
        return Ok(Note::new(instrument, key));
    }

    let velocity = reader.read_u8()?;
    let panning = panning_from_wire(reader.read_u8()?);
    let pitch = reader.read_i16()?;
    Ok(Note {
        instrument,
        key,
        velocity,
        panning,
        pitch,
    })
}

fn read_layer_record(
    reader: &mut Reader<'_>,
    version: u8,
    layer: &mut Layer,
) -> Result<(), NbsError> {
    layer.name = reader.read_string()?;
    if has_lock_and_loop(version) {
        layer.locked = reader.read_bool()?;
    }
    layer.volume = reader.read_u8()?;
    if has_layer_panning(version) {
        layer.panning = panning_from_wire(reader.read_u8()?);
    }
    Ok(())
}

fn read_custom_instruments(
    reader: &mut Reader<'_>,
    first_custom_id: u8,
) -> Result<Vec<Instrument>, NbsError> {
    let count = reader.read_u8()?;
    let addressable = max_custom_instruments(first_custom_id);
    if count as usize > addressable {
        warn!(
            count,
            addressable, "Custom instruments past id 255 cannot be played by any note"
        );
    }
    let mut instruments = Vec::with_capacity(count as usize);

    for idx in 0..count {
        let name = reader.read_string()?;
        let sound_file = reader.read_string()?;
        let key = reader.read_u8()?;
        let press_key = reader.read_bool()?;
        instruments.push(Instrument {
            id: first_custom_id.saturating_add(idx),
            name,
            sound_file,
            key,
            press_key,
            built_in: false,
        });
    }

    Ok(instruments)
}

/// Compare the header's stored length with the one derived from the notes
///
/// Editors disagree on whether the field holds the tick count or the last
/// tick index, so an off-by-one either way is accepted silently.
fn check_stored_length(stored: Option<i16>, derived: u32) {
    let Some(stored) = stored else {
        return;
    };
    let stored = stored as i64;
    let derived = derived as i64;
    if (stored - derived).abs() > 1 {
        warn!(
            stored,
            derived, "Stored song length disagrees with note data; using note data"
        );
    }
}

/// Single validation point for decoded field ranges
///
/// Out-of-range values are kept exactly as decoded; this only reports them.
fn report_range_violations(song: &Song) {
    let out_of_range = song
        .layers
        .iter()
        .flat_map(|layer| layer.notes.values())
        .filter(|note| !note.is_in_range())
        .count();
    let loud_layers = song
        .layers
        .iter()
        .filter(|layer| layer.volume > VELOCITY_MAX)
        .count();

    if out_of_range > 0 || loud_layers > 0 {
        warn!(
            notes = out_of_range,
            layers = loud_layers,
            "Song contains values outside documented ranges; passing them through unchanged"
        );
    }
}
