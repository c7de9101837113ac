//! Play command - run a song through the scheduler and print what it triggers

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use nether_nbs::{Song, key_name};
use nether_nbs_playback::{
    ChannelListener, ManualTicks, PlaybackEvent, Player, Scheduler, TickOutcome,
};
use tracing::{debug, info};

use crate::config::PlaybackConfig;

/// How long one pump waits for a clock tick before checking again
const PUMP_TIMEOUT: Duration = Duration::from_millis(250);

/// Arguments for the play command
#[derive(Args)]
pub struct PlayArgs {
    /// Path to the .nbs file
    pub file: PathBuf,

    /// Loop the song regardless of its header
    #[arg(long = "loop", conflicts_with = "no_loop")]
    pub looping: bool,

    /// Never loop, even if the header asks to
    #[arg(long)]
    pub no_loop: bool,

    /// Tempo multiplier (overrides the config)
    #[arg(long)]
    pub speed: Option<f64>,

    /// Stop after this many ticks (overrides the config)
    #[arg(long)]
    pub max_ticks: Option<u32>,

    /// Advance through the song without waiting on the clock
    #[arg(long)]
    pub instant: bool,
}

/// Effective playback settings after merging arguments over the config
#[derive(Debug, Clone, PartialEq)]
struct PlaySettings {
    speed: f64,
    looping: Option<bool>,
    max_ticks: Option<u32>,
}

impl PlaySettings {
    fn resolve(args: &PlayArgs, config: &PlaybackConfig) -> Self {
        let looping = if args.looping {
            Some(true)
        } else if args.no_loop {
            Some(false)
        } else {
            config.looping
        };
        Self {
            speed: args.speed.unwrap_or(config.speed),
            looping,
            max_ticks: args.max_ticks.or(config.max_ticks),
        }
    }

    fn reached_limit(&self, ticks: u32) -> bool {
        self.max_ticks.is_some_and(|max| ticks >= max)
    }
}

/// Execute the play command
pub fn execute(args: PlayArgs, config: &PlaybackConfig) -> Result<()> {
    let settings = PlaySettings::resolve(&args, config);
    let mut song = crate::load_song(&args.file)?;
    if let Some(looping) = settings.looping {
        song.looping = looping;
    }

    info!(
        "Playing {} ({} ticks at {:.2} ticks/s, speed {})",
        args.file.display(),
        song.length(),
        song.tempo.ticks_per_second(),
        settings.speed
    );

    if args.instant {
        for line in play_instant(song, &settings)? {
            println!("{line}");
        }
        Ok(())
    } else {
        play_realtime(song, &settings)
    }
}

/// Drive a scheduler by hand, collecting one line per event
fn play_instant(song: Song, settings: &PlaySettings) -> Result<Vec<String>> {
    if song.looping && song.max_loop_count == 0 && settings.max_ticks.is_none() {
        bail!("Song loops forever; pass --max-ticks or --no-loop with --instant");
    }

    let names = instrument_names(&song);
    let (listener, events) = ChannelListener::new();
    let mut scheduler = Scheduler::new(song, ManualTicks::new())
        .with_speed(settings.speed)
        .with_listener(listener);
    scheduler.play()?;

    let mut lines = Vec::new();
    let mut ticks = 0;
    while let Some(report) = scheduler.advance() {
        ticks += 1;
        drain(&events, &names, &mut lines);
        if report.outcome == TickOutcome::Finished || settings.reached_limit(ticks) {
            break;
        }
    }
    scheduler.pause();
    drain(&events, &names, &mut lines);

    debug!(ticks, "Instant playback done");
    Ok(lines)
}

/// Play against the wall clock, printing events as they arrive
fn play_realtime(song: Song, settings: &PlaySettings) -> Result<()> {
    let names = instrument_names(&song);
    let (player, events) = Player::new();
    let mut player = player.with_speed(settings.speed);
    player.load_song(song);
    player.play()?;

    let mut lines = Vec::new();
    let mut ticks = 0;
    while player.is_playing() {
        let Some(report) = player.pump(PUMP_TIMEOUT) else {
            continue;
        };
        ticks += 1;
        drain(&events, &names, &mut lines);
        for line in lines.drain(..) {
            println!("{line}");
        }
        if report.outcome == TickOutcome::Finished || settings.reached_limit(ticks) {
            break;
        }
    }
    player.pause();
    drain(&events, &names, &mut lines);
    for line in lines {
        println!("{line}");
    }

    info!(ticks, "Playback done");
    Ok(())
}

fn instrument_names(song: &Song) -> BTreeMap<u8, String> {
    song.instruments()
        .iter()
        .map(|instrument| (instrument.id, instrument.name.clone()))
        .collect()
}

fn drain(events: &Receiver<PlaybackEvent>, names: &BTreeMap<u8, String>, out: &mut Vec<String>) {
    for event in events.try_iter() {
        if let Some(line) = format_event(&event, names) {
            out.push(line);
        }
    }
}

fn format_event(event: &PlaybackEvent, names: &BTreeMap<u8, String>) -> Option<String> {
    match event {
        PlaybackEvent::NoteTriggered(note) => Some(format!(
            "{:>6} L{:<3} {:<4} {:<14} vel {:>3} pan {:>4} rate {:.3}",
            note.tick,
            note.layer,
            key_name(note.key),
            names.get(&note.instrument).map_or("?", String::as_str),
            note.mixed_velocity(),
            note.mixed_panning(),
            note.playback_rate()
        )),
        PlaybackEvent::NoteSkipped {
            tick,
            layer,
            instrument,
        } => Some(format!(
            "{tick:>6} L{layer:<3} skipped (unknown instrument {instrument})"
        )),
        PlaybackEvent::StateChanged(state) => {
            debug!(?state, "Playback state changed");
            None
        }
    }
}
