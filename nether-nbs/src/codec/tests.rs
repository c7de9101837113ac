//! Tests for the NBS codec

use super::*;
use crate::error::{FormatError, NbsError};
use crate::io::Writer;
use crate::song::{Note, Song, Tempo};
use crate::{MAX_LAYERS, MIN_HEADER_SIZE};

/// Hand-built header, written field by field in wire order
struct RawHeader {
    version: u8,
    vanilla: u8,
    stored_length: i16,
    layer_count: i16,
    tempo: i16,
    looping: bool,
    max_loop_count: u8,
    loop_start: i16,
}

impl Default for RawHeader {
    fn default() -> Self {
        Self {
            version: 5,
            vanilla: 16,
            stored_length: 0,
            layer_count: 0,
            tempo: 1000,
            looping: false,
            max_loop_count: 0,
            loop_start: 0,
        }
    }
}

impl RawHeader {
    fn write(&self) -> Writer {
        let mut w = Writer::new();
        if self.version == 0 {
            w.write_i16(self.stored_length);
        } else {
            w.write_i16(0);
            w.write_u8(self.version);
            w.write_u8(self.vanilla);
            if self.version >= 3 {
                w.write_i16(self.stored_length);
            }
        }
        w.write_i16(self.layer_count);
        for _ in 0..4 {
            w.write_string("");
        }
        w.write_i16(self.tempo);
        w.write_u8(0); // auto-save
        w.write_u8(10); // auto-save interval
        w.write_u8(4); // time signature
        for _ in 0..5 {
            w.write_i32(0);
        }
        w.write_string(""); // imported file
        if self.version >= 4 {
            w.write_bool(self.looping);
            w.write_u8(self.max_loop_count);
            w.write_i16(self.loop_start);
        }
        w
    }
}

/// Song exercising every field the given version carries
fn sample_song(version: u8) -> Song {
    let mut song = Song::new("Round Trip");
    song.version = version;
    song.vanilla_instrument_count = if version == 0 { 10 } else { 16 };
    song.author = "Composer".to_string();
    song.original_author = "Someone Else".to_string();
    song.description = "Used by the codec tests".to_string();
    song.tempo = Tempo::from_centi(1250).unwrap();
    song.editor.auto_save = true;
    song.editor.auto_save_interval = 5;
    song.editor.time_signature = 3;
    song.editor.minutes_spent = 42;
    song.editor.left_clicks = 1000;
    song.editor.right_clicks = 17;
    song.editor.blocks_added = 300;
    song.editor.blocks_removed = 12;
    song.editor.imported_file = "tune.mid".to_string();

    let melody = song.add_layer("Melody");
    let bass = song.add_layer("Bass");
    song.layer_mut(melody).unwrap().volume = 75;
    if version >= 2 {
        song.layer_mut(bass).unwrap().panning = -40;
    }
    if version >= 4 {
        song.layer_mut(melody).unwrap().locked = true;
    }

    let kick = song.add_custom_instrument("Kick", "kick.ogg").unwrap();
    song.custom_instruments[0].key = 50;
    song.custom_instruments[0].press_key = true;

    let detail = |note: Note| {
        if version >= 4 {
            note.with_velocity(60).with_panning(25).with_pitch(-30)
        } else {
            note
        }
    };
    song.set_note(melody, 0, detail(Note::new(0, 45)));
    song.set_note(bass, 0, Note::new(1, 33));
    song.set_note(melody, 7, detail(Note::new(5, 52)));
    song.set_note(2, 300, Note::new(kick, 45));
    song.set_note(bass, 1000, detail(Note::new(13, 20)));

    if version >= 4 {
        song.looping = true;
        song.max_loop_count = 3;
        song.set_loop_start(7);
    }
    song
}

// =============================================================================
// Decode
// =============================================================================

#[test]
fn test_decode_header_only() {
    let bytes = RawHeader::default().write().into_bytes();
    let song = decode(&bytes).unwrap();

    assert_eq!(song.length(), 0);
    assert!(song.layers().is_empty());
    assert_eq!(song.version, 5);
    assert_eq!(song.tempo.centi(), 1000);
    assert!(song.is_paused());
    assert_eq!(song.current_tick(), 0);
}

#[test]
fn test_decode_classic_header_only() {
    let header = RawHeader {
        version: 0,
        stored_length: 1,
        layer_count: 2,
        ..Default::default()
    };
    let bytes = header.write().into_bytes();
    assert_eq!(bytes.len(), MIN_HEADER_SIZE);

    let song = decode(&bytes).unwrap();
    assert_eq!(song.version, 0);
    assert_eq!(song.vanilla_instrument_count, 10);
    assert_eq!(song.layers().len(), 2);
    assert_eq!(song.layers()[1].volume, 100);
    assert!(!song.looping);
    assert_eq!(song.loop_start(), 0);
    assert_eq!(song.length(), 0);
}

#[test]
fn test_decode_note_stream_jumps() {
    let mut w = RawHeader {
        version: 4,
        stored_length: 6,
        layer_count: 3,
        ..Default::default()
    }
    .write();

    // Tick 0: layer 0 and layer 2
    w.write_u16(1);
    w.write_u16(1);
    w.write_u8(0); // instrument
    w.write_u8(45); // key
    w.write_u8(100); // velocity
    w.write_u8(100); // panning (centre)
    w.write_i16(0); // pitch
    w.write_u16(2);
    w.write_u8(1);
    w.write_u8(33);
    w.write_u8(50);
    w.write_u8(0);
    w.write_i16(-50);
    w.write_u16(0);
    // Tick 5: layer 1
    w.write_u16(5);
    w.write_u16(2);
    w.write_u8(2);
    w.write_u8(40);
    w.write_u8(100);
    w.write_u8(200);
    w.write_i16(0);
    w.write_u16(0);
    w.write_u16(0);

    // Layer records
    w.write_string("Lead");
    w.write_bool(true);
    w.write_u8(80);
    w.write_u8(150);
    w.write_string("");
    w.write_bool(false);
    w.write_u8(100);
    w.write_u8(100);
    w.write_string("Drums");
    w.write_bool(false);
    w.write_u8(60);
    w.write_u8(100);

    // No custom instruments
    w.write_u8(0);

    let song = decode(w.bytes()).unwrap();
    assert_eq!(song.length(), 6);
    assert_eq!(song.note_count(), 3);

    let lead = &song.layers()[0];
    assert_eq!(lead.name, "Lead");
    assert!(lead.locked);
    assert_eq!(lead.volume, 80);
    assert_eq!(lead.panning, 50);
    assert_eq!(lead.note_at(0), Some(&Note::new(0, 45)));

    let second = song.layers()[1].note_at(5).unwrap();
    assert_eq!(second.instrument, 2);
    assert_eq!(second.panning, 100);

    let drums = &song.layers()[2];
    assert_eq!(drums.name, "Drums");
    assert_eq!(
        drums.note_at(0),
        Some(&Note::new(1, 33).with_velocity(50).with_panning(-100).with_pitch(-50))
    );
}

#[test]
fn test_decode_notes_beyond_declared_layers() {
    let mut w = RawHeader {
        version: 5,
        stored_length: 1,
        layer_count: 1,
        ..Default::default()
    }
    .write();
    w.write_u16(1);
    w.write_u16(3); // layer 2
    w.write_u8(0);
    w.write_u8(45);
    w.write_u8(100);
    w.write_u8(100);
    w.write_i16(0);
    w.write_u16(0);
    w.write_u16(0);
    w.write_string("Only");
    w.write_bool(false);
    w.write_u8(90);
    w.write_u8(100);
    w.write_u8(0);

    let song = decode(w.bytes()).unwrap();
    assert_eq!(song.layers().len(), 3);
    assert_eq!(song.layers()[0].name, "Only");
    assert_eq!(song.layers()[0].volume, 90);
    assert_eq!(song.layers()[2].name, "");
    assert_eq!(song.layers()[2].volume, 100);
    assert!(song.layers()[2].note_at(0).is_some());
}

#[test]
fn test_decode_stops_before_custom_instruments() {
    let mut w = RawHeader {
        version: 3,
        layer_count: 1,
        ..Default::default()
    }
    .write();
    w.write_u16(0); // empty note stream
    w.write_string("Layer");
    w.write_u8(100);
    w.write_u8(100);

    let song = decode(w.bytes()).unwrap();
    assert_eq!(song.layers()[0].name, "Layer");
    assert!(song.custom_instruments.is_empty());
}

#[test]
fn test_decode_too_small() {
    let data = [0u8; MIN_HEADER_SIZE - 1];
    assert_eq!(decode(&data), Err(FormatError::TooSmall.into()));
}

#[test]
fn test_decode_unsupported_version() {
    for version in [0u8, 6, 200] {
        let mut data = vec![0u8; 64];
        data[2] = version;
        assert_eq!(
            decode(&data),
            Err(NbsError::Format(FormatError::UnsupportedVersion(version)))
        );
    }
}

#[test]
fn test_decode_invalid_header_values() {
    let bytes = RawHeader {
        tempo: 0,
        ..Default::default()
    }
    .write()
    .into_bytes();
    assert_eq!(decode(&bytes), Err(FormatError::InvalidTempo(0).into()));

    let bytes = RawHeader {
        layer_count: -2,
        ..Default::default()
    }
    .write()
    .into_bytes();
    assert_eq!(decode(&bytes), Err(FormatError::InvalidLayerCount(-2).into()));
}

#[test]
fn test_decode_truncated_mid_section() {
    let mut w = RawHeader::default().write();
    w.write_u16(1);
    w.write_u16(1);
    w.write_u8(0); // instrument, key missing
    assert!(matches!(
        decode(w.bytes()),
        Err(NbsError::Truncated {
            needed: 1,
            remaining: 0,
            ..
        })
    ));

    let mut w = RawHeader {
        layer_count: 2,
        ..Default::default()
    }
    .write();
    w.write_u16(0);
    w.write_string("First");
    w.write_bool(false);
    w.write_u8(100);
    w.write_u8(100);
    w.write_string("Second"); // lock, volume, panning missing
    assert!(matches!(decode(w.bytes()), Err(NbsError::Truncated { .. })));
}

#[test]
fn test_decode_length_from_notes() {
    let mut w = RawHeader {
        stored_length: 100,
        layer_count: 1,
        looping: true,
        loop_start: 50,
        ..Default::default()
    }
    .write();
    w.write_u16(5); // tick 4
    w.write_u16(1);
    w.write_u8(0);
    w.write_u8(45);
    w.write_u8(100);
    w.write_u8(100);
    w.write_i16(0);
    w.write_u16(0);
    w.write_u16(0);

    let song = decode(w.bytes()).unwrap();
    assert_eq!(song.length(), 5);
    assert_eq!(song.loop_start(), 5);
    assert!(song.looping);
}

#[test]
fn test_decode_negative_loop_start() {
    let bytes = RawHeader {
        loop_start: -3,
        ..Default::default()
    }
    .write()
    .into_bytes();
    assert_eq!(decode(&bytes).unwrap().loop_start(), 0);
}

#[test]
fn test_decode_custom_instrument_ids() {
    let mut w = RawHeader {
        version: 0,
        stored_length: 1,
        ..Default::default()
    }
    .write();
    w.write_u16(0);
    w.write_u8(2);
    for name in ["Kick", "Clap"] {
        w.write_string(name);
        w.write_string(&format!("{}.ogg", name.to_lowercase()));
        w.write_u8(45);
        w.write_bool(false);
    }

    let song = decode(w.bytes()).unwrap();
    let ids: Vec<u8> = song.custom_instruments.iter().map(|i| i.id).collect();
    assert_eq!(ids, [10, 11]);
    assert_eq!(crate::resolve_instrument(11, &song).unwrap().name, "Clap");
    assert_eq!(crate::resolve_instrument(9, &song).unwrap().name, "Xylophone");
    assert!(crate::resolve_instrument(12, &song).is_none());
}

// =============================================================================
// Encode
// =============================================================================

#[test]
fn test_round_trip_every_version() {
    for version in 0..=crate::MAX_VERSION {
        let song = sample_song(version);
        let bytes = encode(&song).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, song, "version {version}");
    }
}

#[test]
fn test_round_trip_empty_songs() {
    for version in [0u8, 5] {
        let mut song = Song::new("Empty");
        song.version = version;
        if version == 0 {
            song.vanilla_instrument_count = 10;
        }
        let decoded = decode(&encode(&song).unwrap()).unwrap();
        assert_eq!(decoded, song);
        assert_eq!(decoded.length(), 0);
    }
}

#[test]
fn test_encode_note_stream_layout() {
    let mut song = Song::default();
    song.set_note(0, 0, Note::new(0, 45));
    song.set_note(2, 3, Note::new(1, 46).with_panning(-100));

    let bytes = encode(&song).unwrap();
    let header_len = RawHeader::default().write().len();
    let expected: Vec<u8> = [
        &[1, 0, 1, 0][..],          // tick 0, layer 0
        &[0, 45, 100, 100, 0, 0],   // note
        &[0, 0],                    // end of tick
        &[3, 0, 3, 0],              // tick 3, layer 2
        &[1, 46, 100, 0, 0, 0],     // note, hard left
        &[0, 0, 0, 0],              // end of tick, end of stream
    ]
    .concat();
    assert_eq!(&bytes[header_len..header_len + expected.len()], &expected[..]);
}

#[test]
fn test_encode_drops_fields_for_old_versions() {
    let mut song = Song::default();
    song.version = 3;
    song.looping = true;
    song.set_note(0, 2, Note::new(0, 45).with_velocity(30).with_pitch(100));
    song.layer_mut(0).unwrap().locked = true;

    let decoded = decode(&encode(&song).unwrap()).unwrap();
    assert_eq!(decoded.layers()[0].note_at(2), Some(&Note::new(0, 45)));
    assert!(!decoded.layers()[0].locked);
    assert!(!decoded.looping);
}

#[test]
fn test_out_of_range_values_pass_through() {
    let mut song = Song::default();
    let wild = Note::new(3, 95)
        .with_velocity(150)
        .with_panning(120)
        .with_pitch(2000);
    song.set_note(0, 0, wild);
    assert!(!wild.is_in_range());

    let decoded = decode(&encode(&song).unwrap()).unwrap();
    assert_eq!(decoded.layers()[0].note_at(0), Some(&wild));
}

#[test]
fn test_encode_limits() {
    let mut song = Song::default();
    song.set_note(0, crate::MAX_SONG_LENGTH, Note::new(0, 45));
    assert_eq!(
        encode(&song),
        Err(FormatError::SongTooLong(crate::MAX_SONG_LENGTH + 1).into())
    );

    let mut song = Song::default();
    song.set_note(MAX_LAYERS, 0, Note::new(0, 45));
    assert_eq!(
        encode(&song),
        Err(FormatError::TooManyLayers(MAX_LAYERS + 1).into())
    );

    let mut song = Song::default();
    song.version = 9;
    assert_eq!(encode(&song), Err(FormatError::UnsupportedVersion(9).into()));
}

#[test]
fn test_encode_rejects_classic_with_modern_instrument_count() {
    let mut song = Song::new("Classic");
    let kick = song.add_custom_instrument("Kick", "kick.ogg").unwrap();
    song.set_note(0, 0, Note::new(kick, 45));
    song.version = crate::CLASSIC_VERSION;

    assert_eq!(
        encode(&song),
        Err(FormatError::ClassicInstrumentCount(16).into())
    );

    // Renumbered for 10 built-ins, the custom instrument survives the trip
    song.vanilla_instrument_count = crate::CLASSIC_VANILLA_INSTRUMENTS;
    song.custom_instruments[0].id = 10;
    song.set_note(0, 0, Note::new(10, 45));
    let decoded = decode(&encode(&song).unwrap()).unwrap();
    assert_eq!(decoded, song);
    assert_eq!(decoded.instruments().get(10).unwrap().name, "Kick");
}

#[test]
fn test_encode_rejects_unaddressable_custom_instruments() {
    let mut song = Song::default();
    for idx in 0..240u8 {
        song.custom_instruments
            .push(crate::Instrument::custom(16 + idx, "Sound", "sound.ogg"));
    }
    assert!(encode(&song).is_ok());

    song.custom_instruments
        .push(crate::Instrument::custom(255, "Extra", "extra.ogg"));
    assert_eq!(
        encode(&song),
        Err(FormatError::TooManyCustomInstruments {
            count: 241,
            max: 240
        }
        .into())
    );

    assert_eq!(max_custom_instruments(0), 255);
    assert_eq!(max_custom_instruments(10), 246);
}

#[test]
fn test_longest_song_encodes() {
    let mut song = Song::default();
    song.set_note(0, crate::MAX_SONG_LENGTH - 1, Note::new(0, 45));
    let decoded = decode(&encode(&song).unwrap()).unwrap();
    assert_eq!(decoded.length(), crate::MAX_SONG_LENGTH);
}

#[test]
fn test_panning_wire_conversion() {
    assert_eq!(panning_from_wire(0), -100);
    assert_eq!(panning_from_wire(100), 0);
    assert_eq!(panning_from_wire(255), 155);
    assert_eq!(panning_to_wire(-100), 0);
    assert_eq!(panning_to_wire(155), 255);
    assert_eq!(panning_to_wire(-300), 0);
    assert_eq!(panning_to_wire(i16::MAX), 255);
}
