//! Rewrite command - re-encode a song, optionally converting its version
//!
//! Converting between the classic layout and the versioned ones moves the
//! custom instrument ids, since classic files only know ten vanilla
//! instruments. Notes are renumbered to follow their instruments.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use nether_nbs::{
    BUILTIN_INSTRUMENT_COUNT, CLASSIC_VANILLA_INSTRUMENTS, CLASSIC_VERSION, MAX_VERSION, Note,
    Song,
};
use tracing::{info, warn};

/// Arguments for the rewrite command
#[derive(Args)]
pub struct RewriteArgs {
    /// Input .nbs file
    pub input: PathBuf,

    /// Output .nbs file
    pub output: PathBuf,

    /// Target format version (0 = classic); defaults to the input's version
    #[arg(long, value_name = "VERSION")]
    pub to: Option<u8>,
}

/// Execute the rewrite command
pub fn execute(args: RewriteArgs) -> Result<()> {
    let mut song = crate::load_song(&args.input)?;
    let from = song.version;

    if let Some(target) = args.to {
        for loss in convert(&mut song, target)? {
            warn!("Version {target} cannot store {loss}");
        }
    }

    let bytes = nether_nbs::encode(&song).context("Failed to encode song")?;
    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(
        "Wrote {} (version {} -> {}, {} bytes)",
        args.output.display(),
        from,
        song.version,
        bytes.len()
    );
    Ok(())
}

/// Retarget a song to another format version
///
/// Returns a description of each kind of data the target version drops.
fn convert(song: &mut Song, target: u8) -> Result<Vec<&'static str>> {
    if target > MAX_VERSION {
        bail!("Unsupported target version {target} (newest is {MAX_VERSION})");
    }

    let mut losses = Vec::new();
    if target < 4 {
        let plain = Note::new(0, 0);
        if notes(song).any(|n| {
            (n.velocity, n.panning, n.pitch) != (plain.velocity, plain.panning, plain.pitch)
        }) {
            losses.push("note velocity, panning or pitch");
        }
        if song.layers().iter().any(|layer| layer.locked) {
            losses.push("layer locks");
        }
        if song.looping || song.max_loop_count != 0 || song.loop_start() != 0 {
            losses.push("loop settings");
        }
    }
    if target < 2 && song.layers().iter().any(|layer| layer.panning != 0) {
        losses.push("layer panning");
    }

    let vanilla = if target == CLASSIC_VERSION {
        CLASSIC_VANILLA_INSTRUMENTS
    } else if song.version == CLASSIC_VERSION {
        BUILTIN_INSTRUMENT_COUNT as u8
    } else {
        song.vanilla_instrument_count
    };
    // Those ids belong to custom instruments once renumbered
    let dropped = vanilla..song.vanilla_instrument_count;
    let stranded = notes(song)
        .filter(|n| dropped.contains(&n.instrument))
        .count();
    if stranded > 0 {
        bail!(
            "{stranded} notes use built-in instruments {}-{} that version {target} does not have",
            dropped.start,
            dropped.end - 1
        );
    }
    renumber_instruments(song, vanilla);

    song.version = target;
    Ok(losses)
}

fn notes(song: &Song) -> impl Iterator<Item = &Note> {
    song.layers().iter().flat_map(|layer| layer.notes().values())
}

/// Move custom instruments, and the notes using them, to start at `vanilla`
fn renumber_instruments(song: &mut Song, vanilla: u8) {
    let old = song.vanilla_instrument_count;
    if old == vanilla {
        return;
    }

    let remap = |id: u8| {
        if id >= old {
            (id - old).saturating_add(vanilla)
        } else {
            id
        }
    };
    let moved: Vec<(usize, u32, Note)> = song
        .layers()
        .iter()
        .enumerate()
        .flat_map(|(idx, layer)| {
            layer
                .notes()
                .iter()
                .filter(|(_, note)| note.instrument >= old)
                .map(move |(&tick, &note)| (idx, tick, note))
        })
        .collect();
    for (layer, tick, mut note) in moved {
        note.instrument = remap(note.instrument);
        song.set_note(layer, tick, note);
    }

    for instrument in &mut song.custom_instruments {
        instrument.id = remap(instrument.id);
    }
    song.vanilla_instrument_count = vanilla;
}
