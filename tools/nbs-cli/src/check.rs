//! Check command - verify a file survives a codec round trip

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use nether_nbs::{NoteField, Song};
use tracing::info;

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// Path to the .nbs file
    pub file: PathBuf,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let song = crate::load_song(&args.file)?;

    let report = check(&song)?;
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    if !report.mismatches.is_empty() {
        for mismatch in &report.mismatches {
            println!("mismatch: {mismatch}");
        }
        bail!(
            "{} does not round-trip ({} differences)",
            args.file.display(),
            report.mismatches.len()
        );
    }

    info!(
        "{} OK: {} notes in {} layers, {} bytes re-encoded",
        args.file.display(),
        song.note_count(),
        song.layers().len(),
        report.encoded_len
    );
    Ok(())
}

#[derive(Debug, Default)]
struct CheckReport {
    encoded_len: usize,
    warnings: Vec<String>,
    mismatches: Vec<String>,
}

/// Encode and decode again, collecting differences and range warnings
fn check(song: &Song) -> Result<CheckReport> {
    let bytes = nether_nbs::encode(song).context("Failed to re-encode song")?;
    let again = nether_nbs::decode(&bytes).context("Failed to decode re-encoded song")?;

    let mut report = CheckReport {
        encoded_len: bytes.len(),
        warnings: range_warnings(song),
        ..Default::default()
    };

    if again.name != song.name
        || again.author != song.author
        || again.original_author != song.original_author
        || again.description != song.description
    {
        report.mismatches.push("metadata strings".to_string());
    }
    if again.tempo != song.tempo {
        report.mismatches.push(format!(
            "tempo {} -> {}",
            song.tempo.centi(),
            again.tempo.centi()
        ));
    }
    if (again.looping, again.max_loop_count, again.loop_start())
        != (song.looping, song.max_loop_count, song.loop_start())
    {
        report.mismatches.push("loop settings".to_string());
    }
    if again.editor != song.editor {
        report.mismatches.push("editor statistics".to_string());
    }
    if again.custom_instruments != song.custom_instruments {
        report.mismatches.push("custom instruments".to_string());
    }
    if again.layers().len() != song.layers().len() {
        report.mismatches.push(format!(
            "layer count {} -> {}",
            song.layers().len(),
            again.layers().len()
        ));
    }
    for (idx, (before, after)) in song.layers().iter().zip(again.layers()).enumerate() {
        if before.notes() != after.notes() {
            report.mismatches.push(format!("notes in layer {idx}"));
        } else if before != after {
            report.mismatches.push(format!("settings of layer {idx}"));
        }
    }

    Ok(report)
}

fn range_warnings(song: &Song) -> Vec<String> {
    let mut warnings = Vec::new();
    for (idx, layer) in song.layers().iter().enumerate() {
        for (tick, note) in layer.notes() {
            for field in note.range_violations() {
                let (name, value) = match field {
                    NoteField::Key => ("key", note.key as i32),
                    NoteField::Velocity => ("velocity", note.velocity as i32),
                    NoteField::Panning => ("panning", note.panning as i32),
                    NoteField::Pitch => ("pitch", note.pitch as i32),
                };
                warnings.push(format!(
                    "layer {idx} tick {tick}: {name} {value} out of range"
                ));
            }
        }
    }
    let registry = song.instruments();
    let unresolved = song
        .layers()
        .iter()
        .flat_map(|layer| layer.notes().values())
        .filter(|note| registry.get(note.instrument).is_none())
        .count();
    if unresolved > 0 {
        warnings.push(format!(
            "{unresolved} notes use unknown instruments and will not play"
        ));
    }
    warnings
}
