//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Shrink presentation archives by slimming their embedded images
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output (per-image stage results)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write every log line, without colors, to this file
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Config file path (default: deckslim.toml, searched upward from cwd)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Convert, resize and recompress the images of an unpacked archive
    #[command(visible_alias = "s")]
    Slim {
        #[command(flatten)]
        args: SlimArgs,
    },
}

/// `slim` command arguments.
#[derive(clap::Args, Debug, Clone)]
pub struct SlimArgs {
    /// Unpacked archive directory (contains Index/ and Data/)
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub deck: PathBuf,

    /// Quality level 0-3: 0 keeps the most quality, 3 gives the smallest file
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub quality: Option<u8>,

    /// Pixels per displayed point kept when resizing (level 0 only)
    #[arg(short, long)]
    pub resize_factor: Option<f64>,

    /// JPEG quality for recompression, 0-100 (level 0 only)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub jpeg_quality: Option<u8>,

    /// Convert opaque PNG images to JPEG (level 0 only)
    #[arg(short, long)]
    pub png_convert: bool,

    /// Write the slimmed archive to this new directory instead of in place
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}
