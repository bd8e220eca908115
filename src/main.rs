//! audiocache - Retention cache for downloaded audio
//!
//! audiocache provides:
//! - A URL-keyed on-disk cache with a bounded retention window
//! - Lazy and periodic eviction without background threads
//! - A yt-dlp download workflow that goes through the cache
//! - An HTTP API for transcription and cache maintenance (feature "server")

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backends;
mod cache;
mod cli;
mod config;
mod core;
mod error;
#[cfg(feature = "server")]
mod server;

fn init_logging(verbose: u8, quiet: bool) {
    let filter = match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        (false, 1) => EnvFilter::new("info"),
        (false, 2) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    cli::run(cli)
}
