//! Single-connection fallback downloader.
//!
//! Used when the server does not honour range requests, the content length
//! is unknown, or the resource is too small to be worth chunking.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use tracing::{info, warn};

use super::error::{DownloadError, DownloadResult};
use super::http::HttpClient;
use super::progress::ByteProgressCallback;

/// Sequential downloader with a buffered copy loop.
#[derive(Debug, Clone)]
pub struct SingleStreamDownloader {
    client: HttpClient,
    buffer_size: usize,
}

impl SingleStreamDownloader {
    /// Create a downloader sharing `client`'s connection pool.
    pub fn new(client: HttpClient, buffer_size: usize) -> Self {
        Self {
            client,
            buffer_size: buffer_size.max(1),
        }
    }

    /// Stream `url` into `dest`.
    ///
    /// `expected_total` (from metadata or a probe) wins over the response's
    /// `Content-Length`. When neither is available the callback receives
    /// `None` as total and only the byte count is reported.
    ///
    /// Returns the number of bytes written.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_total: Option<u64>,
        on_progress: ByteProgressCallback,
    ) -> DownloadResult<u64> {
        let mut response = self.client.get(url)?;
        let total = expected_total
            .filter(|t| *t > 0)
            .or_else(|| response.content_length().filter(|t| *t > 0));

        let file = File::create(dest).map_err(|e| DownloadError::io(dest, e))?;
        let mut writer = BufWriter::with_capacity(self.buffer_size, file);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut downloaded: u64 = 0;

        loop {
            let bytes_read = match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DownloadError::Read {
                        url: url.to_string(),
                        source: e,
                    })
                }
            };

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| DownloadError::io(dest, e))?;
            downloaded += bytes_read as u64;
            on_progress(downloaded, total);
        }

        writer.flush().map_err(|e| DownloadError::io(dest, e))?;

        if let Some(total) = total.filter(|t| *t != downloaded) {
            warn!(url = %url, expected = total, actual = downloaded, "Size differs from expected");
        }
        info!(url = %url, dest = %dest.display(), bytes = downloaded, "Single download complete");
        Ok(downloaded)
    }
}
