//! nbs - Note Block Song tool
//!
//! # Commands
//!
//! - `nbs info <file>` - Print header, layers and instruments
//! - `nbs play <file>` - Run the playback scheduler and print note events
//! - `nbs check <file>` - Verify that a file survives decode -> encode -> decode
//! - `nbs rewrite <in> <out> [--to N]` - Re-encode a file, optionally as another version
//!
//! # Configuration (nbs.toml)
//!
//! ```toml
//! [playback]
//! speed = 1.0        # tempo multiplier
//! looping = true     # override the song's loop flag
//! max_ticks = 2000   # stop after this many ticks
//!
//! [log]
//! filter = "info"    # used when RUST_LOG is unset
//! ```

mod check;
mod config;
mod info;
mod play;
mod rewrite;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nether_nbs::Song;

/// nbs - inspect, verify, rewrite and play NBS songs
#[derive(Parser)]
#[command(name = "nbs")]
#[command(about = "Inspect, verify, rewrite and play NBS note block songs")]
#[command(version)]
struct Cli {
    /// Config file (defaults to nbs.toml in the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print song header, layers and instruments
    Info(info::InfoArgs),

    /// Play a song through the scheduler, printing note events
    Play(play::PlayArgs),

    /// Verify a file round-trips through the codec unchanged
    Check(check::CheckArgs),

    /// Re-encode a song, optionally converting its format version
    Rewrite(rewrite::RewriteArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.filter)),
        )
        .init();

    match cli.command {
        Commands::Info(args) => info::execute(args),
        Commands::Play(args) => play::execute(args, &config.playback),
        Commands::Check(args) => check::execute(args),
        Commands::Rewrite(args) => rewrite::execute(args),
    }
}

/// Read and decode a song file
pub(crate) fn load_song(path: &Path) -> Result<Song> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    nether_nbs::decode(&data).with_context(|| format!("Failed to decode {}", path.display()))
}
