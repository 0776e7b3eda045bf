//! Per-stream download orchestration.
//!
//! Resolves the content length, probes for range support and picks the
//! chunked or single-connection path for one [`StreamDescriptor`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::chunk::ChunkDownloader;
use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult};
use super::http::HttpClient;
use super::pool::ChunkPool;
use super::probe::RangeProbe;
use super::progress::ByteProgressCallback;
use super::single::SingleStreamDownloader;

/// What to download and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    content_url: String,
    expected_size: Option<u64>,
    output_path: PathBuf,
}

impl StreamDescriptor {
    /// Create a descriptor.
    ///
    /// # Arguments
    ///
    /// * `content_url` - Direct media URL
    /// * `expected_size` - Size reported by metadata, if any
    /// * `output_path` - Destination file
    pub fn new(
        content_url: impl Into<String>,
        expected_size: Option<u64>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            content_url: content_url.into(),
            expected_size: expected_size.filter(|s| *s > 0),
            output_path: output_path.into(),
        }
    }

    pub fn content_url(&self) -> &str {
        &self.content_url
    }

    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// How a stream was transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Parallel range requests into a pre-sized file.
    Chunked { chunks: usize },
    /// One sequential request.
    Single,
}

/// Result of a completed stream download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// Total resolved before the transfer started, if any.
    pub content_length: Option<u64>,
    pub mode: TransferMode,
}

/// Downloads one stream, chunked when possible.
#[derive(Debug, Clone)]
pub struct StreamDownloader {
    probe: RangeProbe,
    chunked: ChunkDownloader,
    single: SingleStreamDownloader,
    min_chunk_size: u64,
}

impl StreamDownloader {
    /// Create a downloader from configuration, a shared client and pool.
    pub fn new(config: &DownloadConfig, client: HttpClient, pool: Arc<ChunkPool>) -> Self {
        Self {
            probe: RangeProbe::new(client.clone()),
            chunked: ChunkDownloader::new(
                client.clone(),
                pool,
                config.chunk_count,
                config.buffer_size,
            ),
            single: SingleStreamDownloader::new(client, config.buffer_size),
            min_chunk_size: config.min_chunk_size,
        }
    }

    /// Download the stream described by `descriptor`.
    ///
    /// Parent directories of the output path are created if missing.
    pub fn download(
        &self,
        descriptor: &StreamDescriptor,
        on_progress: ByteProgressCallback,
    ) -> DownloadResult<StreamOutcome> {
        let url = descriptor.content_url();
        let dest = descriptor.output_path();

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DownloadError::io(parent, e))?;
        }

        let length = self
            .probe
            .resolve_content_length(url, descriptor.expected_size());

        if let Some(total) = length.known().filter(|t| *t > self.min_chunk_size) {
            if self.probe.supports_ranges(url) {
                debug!(url = %url, total, "Using chunked download");
                let bytes_written = self.chunked.download(url, dest, total, on_progress)?;
                return Ok(StreamOutcome {
                    path: dest.to_path_buf(),
                    bytes_written,
                    content_length: Some(total),
                    mode: TransferMode::Chunked {
                        chunks: (self.chunked.chunk_count() as u64).min(total) as usize,
                    },
                });
            }
        }

        debug!(url = %url, length = ?length, "Using single-connection download");
        let bytes_written = self.single.download(url, dest, length.known(), on_progress)?;
        Ok(StreamOutcome {
            path: dest.to_path_buf(),
            bytes_written,
            content_length: length.known(),
            mode: TransferMode::Single,
        })
    }
}
