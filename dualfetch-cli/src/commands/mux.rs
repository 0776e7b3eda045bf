//! Mux and copy commands for files already on disk.

use std::path::Path;

use console::style;
use dualfetch::mux::Muxer;

use super::GlobalArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Combine a video file and an audio file into `output`.
pub fn run_mux(
    global: &GlobalArgs,
    video: &Path,
    audio: &Path,
    output: &Path,
) -> Result<(), CliError> {
    let runner = CliRunner::new(global.config.as_deref(), global.verbose)?;
    runner.log_startup("mux");

    if !Muxer::new().mux_files(video, audio, output) {
        return Err(CliError::MuxFailed(output.to_path_buf()));
    }
    println!("{} {}", style("Muxed").green().bold(), output.display());
    Ok(())
}

/// Copy a single already-muxed stream to `output`.
pub fn run_copy(global: &GlobalArgs, input: &Path, output: &Path) -> Result<(), CliError> {
    let runner = CliRunner::new(global.config.as_deref(), global.verbose)?;
    runner.log_startup("copy");

    if !Muxer::new().copy_single_file(input, output) {
        return Err(CliError::CopyFailed(output.to_path_buf()));
    }
    println!("{} {}", style("Copied").green().bold(), output.display());
    Ok(())
}
