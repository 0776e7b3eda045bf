//! Fetch command - download one URL through probe, chunking and fallback.

use std::path::PathBuf;

use console::style;
use dualfetch::bootstrap;
use dualfetch::download::{HttpClient, StreamDescriptor, StreamDownloader, TransferMode};

use super::GlobalArgs;
use crate::error::CliError;
use crate::progress::byte_bar;
use crate::runner::CliRunner;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub url: String,
    pub output: PathBuf,
    pub size: Option<u64>,
}

/// Run the fetch command.
pub fn run(global: &GlobalArgs, args: FetchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(global.config.as_deref(), global.verbose)?;
    runner.log_startup("fetch");

    let config = runner.download_config();
    let pool = bootstrap::ensure_initialized(&config)?;
    let client = HttpClient::new(&config)?;
    let downloader = StreamDownloader::new(&config, client, pool);

    let (bar, callback) = byte_bar();
    let descriptor = StreamDescriptor::new(&args.url, args.size, &args.output);
    let outcome = match downloader.download(&descriptor, callback) {
        Ok(outcome) => {
            bar.finish();
            outcome
        }
        Err(e) => {
            bar.abandon();
            return Err(e.into());
        }
    };

    let mode = match outcome.mode {
        TransferMode::Chunked { chunks } => format!("{} chunks", chunks),
        TransferMode::Single => "single connection".to_string(),
    };
    println!(
        "{} {} bytes ({}) -> {}",
        style("Downloaded").green().bold(),
        outcome.bytes_written,
        mode,
        outcome.path.display()
    );
    Ok(())
}
