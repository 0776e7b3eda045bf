//! CLI error type.

use std::fmt;
use std::path::PathBuf;
use std::process;

use dualfetch::config::ConfigError;
use dualfetch::download::DownloadError;
use dualfetch::logging::LoggingError;
use dualfetch::pipeline::PipelineError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or is unusable.
    Config(String),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// Pipeline failure carrying its error code.
    Pipeline(PipelineError),
    /// Direct download failure.
    Download(DownloadError),
    /// Muxing did not produce an output file.
    MuxFailed(PathBuf),
    /// Copying a single stream did not produce an output file.
    CopyFailed(PathBuf),
    /// Printing results failed.
    Output(String),
}

impl CliError {
    /// Print the error to stderr and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        process::exit(1);
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Pipeline(e) => write!(f, "[{}] {}", e.code(), e),
            CliError::Download(e) => write!(f, "Download failed: {}", e),
            CliError::MuxFailed(path) => {
                write!(f, "Muxing failed, no output written to {}", path.display())
            }
            CliError::CopyFailed(path) => write!(f, "Failed to write {}", path.display()),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e)
    }
}
