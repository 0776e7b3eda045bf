//! dualfetch CLI - command-line interface
//!
//! Downloads a video and an audio stream in parallel and muxes them into one
//! MP4 file, or runs the individual steps on their own.

mod commands;
mod error;
mod progress;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::download::DownloadArgs;
use commands::fetch::FetchArgs;
use commands::GlobalArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "dualfetch")]
#[command(about = "Parallel range downloader and MP4 audio/video muxer", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the downloadable qualities of a stream manifest
    Qualities {
        /// Manifest path or URL (JSON stream catalog)
        #[arg(long)]
        manifest: String,
    },

    /// Download one quality and mux video and audio into an MP4 file
    Download {
        /// Manifest path or URL (JSON stream catalog)
        #[arg(long)]
        manifest: String,

        /// Quality label as printed by `qualities` (e.g. 720p)
        #[arg(long)]
        quality: String,

        /// Output file; relative paths go to the configured output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Directory for the per-stream temporary files
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },

    /// Download a single URL to a file
    Fetch {
        /// Resource URL
        url: String,

        /// Destination file
        output: PathBuf,

        /// Size in bytes, if known, to skip the HEAD request
        #[arg(long)]
        size: Option<u64>,
    },

    /// Mux an existing video file and audio file
    Mux {
        video: PathBuf,
        audio: PathBuf,
        output: PathBuf,
    },

    /// Copy a single already-muxed file
    Copy { input: PathBuf, output: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalArgs {
        config: cli.config,
        verbose: cli.verbose,
    };

    let result: Result<(), CliError> = match cli.command {
        Commands::Qualities { manifest } => commands::qualities::run(&global, &manifest),
        Commands::Download {
            manifest,
            quality,
            output,
            temp_dir,
        } => commands::download::run(
            &global,
            DownloadArgs {
                manifest,
                quality,
                output,
                temp_dir,
            },
        ),
        Commands::Fetch { url, output, size } => {
            commands::fetch::run(&global, FetchArgs { url, output, size })
        }
        Commands::Mux {
            video,
            audio,
            output,
        } => commands::mux::run_mux(&global, &video, &audio, &output),
        Commands::Copy { input, output } => commands::mux::run_copy(&global, &input, &output),
    };

    if let Err(e) = result {
        e.exit();
    }
}
