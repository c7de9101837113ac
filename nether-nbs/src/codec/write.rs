//! NBS encoding

use tracing::debug;

use crate::error::{FormatError, NbsError};
use crate::io::Writer;
use crate::song::{Layer, Note, Song};
use crate::{
    CLASSIC_VANILLA_INSTRUMENTS, CLASSIC_VERSION, MAX_LAYERS, MAX_SONG_LENGTH, MAX_VERSION,
    MIN_HEADER_SIZE,
};

use super::{
    has_layer_panning, has_lock_and_loop, has_note_details, has_stored_length,
    max_custom_instruments, panning_to_wire,
};

/// Encode a Song into NBS bytes for `song.version`
///
/// Fields the target version does not carry are dropped. Everything else,
/// including out-of-range note values, is written as stored.
///
/// # Errors
/// * `UnsupportedVersion` - `song.version` is newer than this crate writes
/// * `TooManyLayers` - more layers than the header can declare
/// * `SongTooLong` - the last note lies past the header's length field
/// * `TooManyCustomInstruments` - more custom instruments than ids left after
///   the vanilla count (or more than 255)
/// * `ClassicInstrumentCount` - a classic song whose vanilla count is not 10
pub fn encode(song: &Song) -> Result<Vec<u8>, NbsError> {
    validate(song)?;

    let mut writer = Writer::with_capacity(estimate_size(song));
    write_header(&mut writer, song);
    write_note_stream(&mut writer, song);
    for layer in &song.layers {
        write_layer_record(&mut writer, song.version, layer);
    }
    write_custom_instruments(&mut writer, song);

    debug!(
        version = song.version,
        bytes = writer.len(),
        notes = song.note_count(),
        "Encoded NBS song"
    );
    Ok(writer.into_bytes())
}

fn validate(song: &Song) -> Result<(), NbsError> {
    if song.version > MAX_VERSION {
        return Err(FormatError::UnsupportedVersion(song.version).into());
    }
    if song.layers.len() > MAX_LAYERS {
        return Err(FormatError::TooManyLayers(song.layers.len()).into());
    }
    if song.length > MAX_SONG_LENGTH {
        return Err(FormatError::SongTooLong(song.length).into());
    }
    // Classic files carry no vanilla count; decode always assumes 10
    if song.version == CLASSIC_VERSION
        && song.vanilla_instrument_count != CLASSIC_VANILLA_INSTRUMENTS
    {
        return Err(FormatError::ClassicInstrumentCount(song.vanilla_instrument_count).into());
    }
    let max = max_custom_instruments(song.vanilla_instrument_count);
    if song.custom_instruments.len() > max {
        return Err(FormatError::TooManyCustomInstruments {
            count: song.custom_instruments.len(),
            max,
        }
        .into());
    }
    Ok(())
}

/// Rough output size, so most songs encode without reallocating
fn estimate_size(song: &Song) -> usize {
    let note_size = if has_note_details(song.version) { 9 } else { 5 };
    MIN_HEADER_SIZE
        + 16
        + song.name.len()
        + song.author.len()
        + song.original_author.len()
        + song.description.len()
        + song.note_count() * note_size
        + song.layers.iter().map(|l| l.name.len() + 8).sum::<usize>()
        + song
            .custom_instruments
            .iter()
            .map(|i| i.name.len() + i.sound_file.len() + 10)
            .sum::<usize>()
}

fn write_header(writer: &mut Writer, song: &Song) {
    // Validated above: both fit a signed short
    let length = song.length as i16;
    let layer_count = song.layers.len() as i16;

    if song.version == CLASSIC_VERSION {
        // A zero here would mark a versioned file, so an empty song says 1
        writer.write_i16(length.max(1));
    } else {
        writer.write_i16(0);
        writer.write_u8(song.version);
        writer.write_u8(song.vanilla_instrument_count);
        if has_stored_length(song.version) {
            writer.write_i16(length);
        }
    }

    writer.write_i16(layer_count);
    writer.write_string(&song.name);
    writer.write_string(&song.author);
    writer.write_string(&song.original_author);
    writer.write_string(&song.description);
    writer.write_i16(song.tempo.centi() as i16);

    let editor = &song.editor;
    writer.write_bool(editor.auto_save);
    writer.write_u8(editor.auto_save_interval);
    writer.write_u8(editor.time_signature);
    writer.write_i32(editor.minutes_spent);
    writer.write_i32(editor.left_clicks);
    writer.write_i32(editor.right_clicks);
    writer.write_i32(editor.blocks_added);
    writer.write_i32(editor.blocks_removed);
    writer.write_string(&editor.imported_file);

    if has_lock_and_loop(song.version) {
        writer.write_bool(song.looping);
        writer.write_u8(song.max_loop_count);
        writer.write_i16(song.loop_start as i16);
    }
}

/// Emit notes ordered by (tick, layer) as jumps from the previous entry
///
/// Jumps always fit a u16: ticks are bounded by the song length check and
/// layers by the layer count check.
fn write_note_stream(writer: &mut Writer, song: &Song) {
    let mut entries: Vec<(u32, usize, &Note)> = song
        .layers
        .iter()
        .enumerate()
        .flat_map(|(layer_idx, layer)| {
            layer
                .notes
                .iter()
                .map(move |(&tick, note)| (tick, layer_idx, note))
        })
        .collect();
    entries.sort_unstable_by_key(|&(tick, layer, _)| (tick, layer));

    let details = has_note_details(song.version);
    let mut prev_tick: i64 = -1;
    let mut prev_layer: i64 = -1;

    for (tick, layer, note) in entries {
        let tick = tick as i64;
        let layer = layer as i64;

        if tick != prev_tick {
            if prev_tick >= 0 {
                // End the previous tick's layer list
                writer.write_u16(0);
            }
            writer.write_u16((tick - prev_tick) as u16);
            prev_tick = tick;
            prev_layer = -1;
        }

        writer.write_u16((layer - prev_layer) as u16);
        prev_layer = layer;

        writer.write_u8(note.instrument);
        writer.write_u8(note.key);
        if details {
            writer.write_u8(note.velocity);
            writer.write_u8(panning_to_wire(note.panning));
            writer.write_i16(note.pitch);
        }
    }

    if prev_tick >= 0 {
        writer.write_u16(0);
    }
    writer.write_u16(0);
}

fn write_layer_record(writer: &mut Writer, version: u8, layer: &Layer) {
    writer.write_string(&layer.name);
    if has_lock_and_loop(version) {
        writer.write_bool(layer.locked);
    }
    writer.write_u8(layer.volume);
    if has_layer_panning(version) {
        writer.write_u8(panning_to_wire(layer.panning));
    }
}

fn write_custom_instruments(writer: &mut Writer, song: &Song) {
    writer.write_u8(song.custom_instruments.len() as u8);
    for instrument in &song.custom_instruments {
        writer.write_string(&instrument.name);
        writer.write_string(&instrument.sound_file);
        writer.write_u8(instrument.key);
        writer.write_bool(instrument.press_key);
    }
}
