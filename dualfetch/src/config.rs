//! Persistent configuration stored as INI.
//!
//! The file lives at `<config_dir>/dualfetch/config.ini`:
//!
//! ```ini
//! [download]
//! chunk_count = 8
//! worker_threads = 20
//! buffer_size = 524288
//! min_chunk_size = 1048576
//! timeout = 300
//! connect_timeout = 15
//! max_idle_connections = 32
//! progress_interval_ms = 150
//!
//! [output]
//! temp_dir = /tmp/dualfetch
//! output_dir = /home/user/Downloads
//!
//! [logging]
//! directory = /home/user/.local/share/dualfetch/logs
//! level = info
//! ```
//!
//! Missing files and missing keys fall back to defaults; unknown keys are
//! ignored.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use crate::download::{
    DownloadConfig, DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_COUNT, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_MAX_IDLE_CONNECTIONS, DEFAULT_MIN_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL,
    DEFAULT_TIMEOUT_SECS, DEFAULT_WORKER_THREADS,
};

const APP_DIR: &str = "dualfetch";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub chunk_count: usize,
    pub worker_threads: usize,
    pub buffer_size: usize,
    pub min_chunk_size: u64,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    /// Connect timeout in seconds.
    pub connect_timeout: u64,
    pub max_idle_connections: usize,
    pub progress_interval_ms: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
            worker_threads: DEFAULT_WORKER_THREADS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL.as_millis() as u64,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    /// Where per-stream temporary files are written.
    pub temp_dir: PathBuf,
    /// Default directory for muxed output.
    pub output_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join(APP_DIR),
            output_dir: dirs::download_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: dirs::data_local_dir()
                .map(|d| d.join(APP_DIR).join("logs"))
                .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR).join("logs")),
            level: "info".to_string(),
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

/// Default location of the configuration file.
pub fn config_file_path() -> ConfigResult<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

impl ConfigFile {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("download")) {
            let d = &mut config.download;
            d.chunk_count = parse(section, "download", "chunk_count", d.chunk_count)?;
            d.worker_threads = parse(section, "download", "worker_threads", d.worker_threads)?;
            d.buffer_size = parse(section, "download", "buffer_size", d.buffer_size)?;
            d.min_chunk_size = parse(section, "download", "min_chunk_size", d.min_chunk_size)?;
            d.timeout = parse(section, "download", "timeout", d.timeout)?;
            d.connect_timeout = parse(section, "download", "connect_timeout", d.connect_timeout)?;
            d.max_idle_connections = parse(
                section,
                "download",
                "max_idle_connections",
                d.max_idle_connections,
            )?;
            d.progress_interval_ms = parse(
                section,
                "download",
                "progress_interval_ms",
                d.progress_interval_ms,
            )?;
        }

        if let Some(section) = ini.section(Some("output")) {
            if let Some(dir) = non_empty(section, "temp_dir") {
                config.output.temp_dir = PathBuf::from(dir);
            }
            if let Some(dir) = non_empty(section, "output_dir") {
                config.output.output_dir = PathBuf::from(dir);
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(dir) = non_empty(section, "directory") {
                config.logging.directory = PathBuf::from(dir);
            }
            if let Some(level) = non_empty(section, "level") {
                config.logging.level = level.to_string();
            }
        }

        Ok(config)
    }

    /// Save to the default location, creating parent directories.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&config_file_path()?)
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    fn to_ini(&self) -> Ini {
        let d = &self.download;
        let mut ini = Ini::new();
        ini.with_section(Some("download"))
            .set("chunk_count", d.chunk_count.to_string())
            .set("worker_threads", d.worker_threads.to_string())
            .set("buffer_size", d.buffer_size.to_string())
            .set("min_chunk_size", d.min_chunk_size.to_string())
            .set("timeout", d.timeout.to_string())
            .set("connect_timeout", d.connect_timeout.to_string())
            .set("max_idle_connections", d.max_idle_connections.to_string())
            .set("progress_interval_ms", d.progress_interval_ms.to_string());
        ini.with_section(Some("output"))
            .set("temp_dir", self.output.temp_dir.to_string_lossy())
            .set("output_dir", self.output.output_dir.to_string_lossy());
        ini.with_section(Some("logging"))
            .set("directory", self.logging.directory.to_string_lossy())
            .set("level", self.logging.level.as_str());
        ini
    }

    /// Build the downloader configuration from the `[download]` section.
    pub fn to_download_config(&self) -> DownloadConfig {
        let d = &self.download;
        DownloadConfig::new()
            .with_chunk_count(d.chunk_count)
            .with_worker_threads(d.worker_threads)
            .with_buffer_size(d.buffer_size)
            .with_min_chunk_size(d.min_chunk_size)
            .with_timeout(Duration::from_secs(d.timeout))
            .with_connect_timeout(Duration::from_secs(d.connect_timeout))
            .with_max_idle_connections(d.max_idle_connections)
            .with_progress_interval(Duration::from_millis(d.progress_interval_ms))
    }
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(section: &Properties, name: &str, key: &str, default: T) -> ConfigResult<T> {
    match non_empty(section, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            section: name.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
