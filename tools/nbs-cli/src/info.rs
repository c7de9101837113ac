//! Info command - print what a song file contains

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use nether_nbs::{Song, key_name};

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// Path to the .nbs file
    pub file: PathBuf,

    /// Also list every note
    #[arg(long)]
    pub notes: bool,
}

/// Execute the info command
pub fn execute(args: InfoArgs) -> Result<()> {
    let song = crate::load_song(&args.file)?;
    print!("{}", describe(&song));
    if args.notes {
        print!("{}", list_notes(&song));
    }
    Ok(())
}

fn describe(song: &Song) -> String {
    let mut out = String::new();
    let title = if song.name.is_empty() {
        "(untitled)"
    } else {
        &song.name
    };
    out.push_str(&format!("Song: {title}\n"));
    if !song.author.is_empty() {
        out.push_str(&format!("Author: {}\n", song.author));
    }
    if !song.original_author.is_empty() {
        out.push_str(&format!("Original author: {}\n", song.original_author));
    }
    if !song.description.is_empty() {
        out.push_str(&format!("Description: {}\n", song.description));
    }

    let version = match song.version {
        0 => "classic".to_string(),
        v => v.to_string(),
    };
    out.push_str(&format!("Format version: {version}\n"));
    out.push_str(&format!(
        "Tempo: {:.2} ticks/s ({} per tick)\n",
        song.tempo.ticks_per_second(),
        format_duration(song.tempo.tick_period().as_secs_f64())
    ));
    out.push_str(&format!(
        "Length: {} ticks ({})\n",
        song.length(),
        format_duration(song.duration().as_secs_f64())
    ));
    if song.looping {
        let count = match song.max_loop_count {
            0 => "forever".to_string(),
            n => format!("{n} times"),
        };
        out.push_str(&format!(
            "Loop: from tick {}, {count}\n",
            song.loop_start()
        ));
    }
    out.push_str(&format!("Notes: {}\n", song.note_count()));

    out.push_str(&format!("Layers: {}\n", song.layers().len()));
    for (idx, layer) in song.layers().iter().enumerate() {
        out.push_str(&format!(
            "  {idx:>3} {:<20} vol {:>3} pan {:>4} notes {:>5}{}\n",
            layer.name,
            layer.volume,
            layer.panning,
            layer.note_count(),
            if layer.locked { " (locked)" } else { "" }
        ));
    }

    let registry = song.instruments();
    out.push_str(&format!("Instruments: {}\n", registry.len()));
    for instrument in registry.iter().filter(|i| !i.built_in) {
        out.push_str(&format!(
            "  {:>3} {} ({}, key {})\n",
            instrument.id,
            instrument.name,
            instrument.sound_file,
            key_name(instrument.key)
        ));
    }
    out
}

fn list_notes(song: &Song) -> String {
    let registry = song.instruments();
    let mut out = String::new();
    for tick in 0..song.length() {
        for (layer, note) in song.notes_at(tick) {
            let instrument = registry
                .get(note.instrument)
                .map_or("?", |i| i.name.as_str());
            out.push_str(&format!(
                "{tick:>6} L{layer:<3} {:<4} {:<14} vel {:>3} pan {:>4} pitch {:>5}\n",
                note.key_name(),
                instrument,
                note.velocity,
                note.panning,
                note.pitch
            ));
        }
    }
    out
}

fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0} ms", secs * 1000.0)
    } else {
        let minutes = (secs / 60.0).floor();
        format!("{}:{:05.2}", minutes as u64, secs - minutes * 60.0)
    }
}
