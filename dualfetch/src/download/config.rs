//! Configuration for stream downloads.

use std::time::Duration;

/// Number of parallel range connections per stream.
pub const DEFAULT_CHUNK_COUNT: usize = 8;

/// Read/write buffer size per worker (512 KB).
pub const DEFAULT_BUFFER_SIZE: usize = 512 * 1024;

/// Resources at or below this size are fetched over a single connection (1 MB).
pub const DEFAULT_MIN_CHUNK_SIZE: u64 = 1024 * 1024;

/// Size of the shared chunk worker pool.
///
/// Comfortably above two streams' worth of chunks so video and audio
/// chunks never wait on each other.
pub const DEFAULT_WORKER_THREADS: usize = 20;

/// Minimum interval between download progress callbacks.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(150);

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Idle connections kept open per host.
pub const DEFAULT_MAX_IDLE_CONNECTIONS: usize = 32;

/// Configuration for the chunked downloader and its HTTP transport.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadConfig {
    /// Number of byte ranges a chunked download is split into.
    pub chunk_count: usize,

    /// Threads in the shared chunk worker pool.
    pub worker_threads: usize,

    /// Buffer size used by each worker when copying the body to disk.
    pub buffer_size: usize,

    /// Resources must be strictly larger than this to be chunked.
    pub min_chunk_size: u64,

    /// Per-request HTTP timeout.
    pub timeout: Duration,

    /// HTTP connect timeout.
    pub connect_timeout: Duration,

    /// Idle connections kept per host.
    pub max_idle_connections: usize,

    /// Minimum interval between progress callbacks.
    pub progress_interval: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_count: DEFAULT_CHUNK_COUNT,
            worker_threads: DEFAULT_WORKER_THREADS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl DownloadConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of chunks per stream (minimum 1).
    pub fn with_chunk_count(mut self, count: usize) -> Self {
        self.chunk_count = count.max(1);
        self
    }

    /// Set the worker pool size (minimum 1).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Set the per-worker buffer size (minimum 1 KB).
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1024);
        self
    }

    /// Set the chunking threshold.
    pub fn with_min_chunk_size(mut self, size: u64) -> Self {
        self.min_chunk_size = size;
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the HTTP connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the number of idle connections kept per host.
    pub fn with_max_idle_connections(mut self, count: usize) -> Self {
        self.max_idle_connections = count;
        self
    }

    /// Set the minimum interval between progress callbacks.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}
