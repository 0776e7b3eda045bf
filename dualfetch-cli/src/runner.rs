//! Shared setup for commands: configuration and logging.

use std::path::{Path, PathBuf};

use dualfetch::config::ConfigFile;
use dualfetch::download::DownloadConfig;
use dualfetch::logging::{init_logging, WorkerGuard};
use tracing::info;

use crate::error::CliError;

/// Loaded configuration plus the logging guard for the process.
pub struct CliRunner {
    config: ConfigFile,
    _log_guard: WorkerGuard,
}

impl CliRunner {
    /// Load the configuration (from `config_path` or the default location)
    /// and install logging. `verbose` forces debug console output.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let level = if verbose {
            "debug"
        } else {
            config.logging.level.as_str()
        };
        let log_guard = init_logging(&config.logging.directory, level)?;

        Ok(Self {
            config,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn download_config(&self) -> DownloadConfig {
        self.config.to_download_config()
    }

    /// Temp directory from the config unless overridden.
    pub fn temp_dir(&self, override_dir: Option<PathBuf>) -> PathBuf {
        override_dir.unwrap_or_else(|| self.config.output.temp_dir.clone())
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            command,
            log_dir = %self.config.logging.directory.display(),
            "dualfetch starting"
        );
    }
}
