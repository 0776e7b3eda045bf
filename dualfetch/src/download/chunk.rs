//! Multi-connection chunked downloads.
//!
//! The destination is pre-sized to the full content length, the resource is
//! split into contiguous byte ranges, and every range is fetched by its own
//! worker on the shared [`ChunkPool`]. Workers open their own file handle,
//! seek to their range start and write only inside their range, so no
//! locking is needed around file writes.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::error::{DownloadError, DownloadResult};
use super::http::HttpClient;
use super::pool::{ChunkPool, Latch, LatchGuard};
use super::progress::ByteProgressCallback;

/// One contiguous byte range of a resource, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTask {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl DownloadTask {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a task covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Value for the HTTP `Range` header.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Split `[0, content_length)` into `chunk_count` contiguous ranges.
///
/// Every range but the last has `content_length / chunk_count` bytes; the
/// last absorbs the remainder. The count is capped at `content_length` so
/// no range is empty, and a zero length yields no ranges.
pub fn partition(content_length: u64, chunk_count: usize) -> Vec<DownloadTask> {
    if content_length == 0 {
        return Vec::new();
    }
    let count = (chunk_count.max(1) as u64).min(content_length);
    let chunk_size = content_length / count;

    (0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = if i == count - 1 {
                content_length - 1
            } else {
                start + chunk_size - 1
            };
            DownloadTask {
                index: i as usize,
                start,
                end,
            }
        })
        .collect()
}

/// State shared by the workers of one chunked download.
struct ChunkShared {
    url: String,
    dest: PathBuf,
    content_length: u64,
    buffer_size: usize,
    downloaded: AtomicU64,
    failed: AtomicBool,
    first_error: Mutex<Option<DownloadError>>,
    on_progress: ByteProgressCallback,
}

impl ChunkShared {
    fn record_failure(&self, error: DownloadError) {
        self.failed.store(true, Ordering::SeqCst);
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }
}

/// Downloads one resource over several parallel range requests.
#[derive(Debug, Clone)]
pub struct ChunkDownloader {
    client: HttpClient,
    pool: Arc<ChunkPool>,
    chunk_count: usize,
    buffer_size: usize,
}

impl ChunkDownloader {
    /// Create a chunk downloader.
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP transport
    /// * `pool` - Shared chunk worker pool
    /// * `chunk_count` - Ranges per resource (minimum 1)
    /// * `buffer_size` - Per-worker copy buffer
    pub fn new(
        client: HttpClient,
        pool: Arc<ChunkPool>,
        chunk_count: usize,
        buffer_size: usize,
    ) -> Self {
        Self {
            client,
            pool,
            chunk_count: chunk_count.max(1),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Number of ranges each download is split into.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Download `url` into `dest`, which ends up exactly `content_length` bytes.
    ///
    /// The caller must already know that the server honours range requests.
    /// Blocks until every worker has finished. On failure the first recorded
    /// worker error is returned, wrapped with its chunk index, and `dest`
    /// must be treated as partial.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        content_length: u64,
        on_progress: ByteProgressCallback,
    ) -> DownloadResult<u64> {
        preallocate(dest, content_length)?;

        let tasks = partition(content_length, self.chunk_count);
        let shared = Arc::new(ChunkShared {
            url: url.to_string(),
            dest: dest.to_path_buf(),
            content_length,
            buffer_size: self.buffer_size,
            downloaded: AtomicU64::new(0),
            failed: AtomicBool::new(false),
            first_error: Mutex::new(None),
            on_progress,
        });

        let latch = Latch::new(tasks.len());
        for task in tasks.iter().copied() {
            let guard = LatchGuard(Arc::clone(&latch));
            let shared = Arc::clone(&shared);
            let client = self.client.clone();

            self.pool.spawn(move || {
                let _guard = guard;
                if shared.failed.load(Ordering::SeqCst) {
                    debug!(chunk = task.index, "Skipping chunk after earlier failure");
                    return;
                }

                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| download_chunk(&client, &shared, task)));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => shared.record_failure(DownloadError::chunk(task.index, e)),
                    Err(_) => {
                        shared.record_failure(DownloadError::WorkerPanicked { index: task.index })
                    }
                }
            });
        }

        latch.wait();

        if let Some(error) = shared.first_error.lock().take() {
            warn!(url = %url, error = %error, "Chunked download failed");
            return Err(error);
        }

        let downloaded = shared.downloaded.load(Ordering::SeqCst);
        info!(
            url = %url,
            dest = %dest.display(),
            bytes = downloaded,
            chunks = tasks.len(),
            "Chunked download complete"
        );
        Ok(downloaded)
    }
}

/// Create (or truncate) `dest` and size it to exactly `length` bytes.
fn preallocate(dest: &Path, length: u64) -> DownloadResult<()> {
    let file = File::create(dest).map_err(|e| DownloadError::io(dest, e))?;
    file.set_len(length).map_err(|e| DownloadError::io(dest, e))?;
    Ok(())
}

/// Fetch one range and write it at its offset.
fn download_chunk(
    client: &HttpClient,
    shared: &ChunkShared,
    task: DownloadTask,
) -> DownloadResult<()> {
    debug!(chunk = task.index, range = %task.range_header(), "Chunk started");

    let mut response = client.get_range(&shared.url, task.start, task.end)?;

    // A server that ignores Range answers 200 with the whole body; skip
    // ahead so only this task's bytes are written.
    if response.status() != StatusCode::PARTIAL_CONTENT && task.start > 0 {
        warn!(
            chunk = task.index,
            status = response.status().as_u16(),
            "Range ignored by server, discarding leading bytes"
        );
        let skipped = io::copy(&mut (&mut response).take(task.start), &mut io::sink())
            .map_err(|e| DownloadError::Read {
                url: shared.url.clone(),
                source: e,
            })?;
        if skipped < task.start {
            return Err(DownloadError::Truncated {
                expected: task.start,
                received: skipped,
            });
        }
    }

    let mut file = OpenOptions::new()
        .write(true)
        .open(&shared.dest)
        .map_err(|e| DownloadError::io(&shared.dest, e))?;
    file.seek(SeekFrom::Start(task.start))
        .map_err(|e| DownloadError::io(&shared.dest, e))?;

    let expected = task.len();
    let mut buffer = vec![0u8; shared.buffer_size];
    let mut written: u64 = 0;

    while written < expected {
        let want = (expected - written).min(buffer.len() as u64) as usize;
        let bytes_read = match response.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DownloadError::Read {
                    url: shared.url.clone(),
                    source: e,
                })
            }
        };

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| DownloadError::io(&shared.dest, e))?;
        written += bytes_read as u64;

        let total = shared
            .downloaded
            .fetch_add(bytes_read as u64, Ordering::SeqCst)
            + bytes_read as u64;
        (shared.on_progress)(total, Some(shared.content_length));
    }

    if written == 0 {
        return Err(DownloadError::EmptyBody {
            url: shared.url.clone(),
        });
    }
    if written < expected {
        return Err(DownloadError::Truncated {
            expected,
            received: written,
        });
    }

    file.flush().map_err(|e| DownloadError::io(&shared.dest, e))?;
    debug!(chunk = task.index, bytes = written, "Chunk finished");
    Ok(())
}
