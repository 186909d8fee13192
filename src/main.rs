//! deckslim - shrink presentation archives by slimming their embedded images.

#![allow(dead_code)]

mod archive;
mod cli;
mod codec;
mod config;
mod core;
mod index;
mod logger;
mod metadata;
mod pipeline;
mod report;
mod scan;
mod utils;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::DeckConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    logger::set_verbose(cli.verbose);
    if let Some(path) = &cli.log_file {
        logger::set_log_file(path)
            .with_context(|| format!("cannot open log file `{}`", path.display()))?;
    }

    let mut config = DeckConfig::load(cli.config.as_deref())?;
    if let Some(path) = &config.config_path {
        debug!("config"; "loaded {}", path.display());
    }

    match &cli.command {
        Commands::Slim { args } => {
            config.apply_args(args);
            config.validate()?;
            cli::slim::slim_deck(args, &config)
        }
    }
}
