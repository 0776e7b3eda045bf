//! Error types for stream downloads.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Which of the two elementary streams a download belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    /// Lowercase name used in thread names and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Video => write!(f, "Video"),
            StreamKind::Audio => write!(f, "Audio"),
        }
    }
}

/// Errors that can occur while downloading a stream.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The HTTP transport failed (connect, TLS, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    /// The server answered without a body.
    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    /// Reading the response body failed mid-transfer.
    #[error("reading body from {url} failed: {source}")]
    Read {
        url: String,
        #[source]
        source: io::Error,
    },

    /// Creating, sizing, or writing the destination failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A response body ended before the expected number of bytes arrived.
    #[error("body ended after {received} of {expected} bytes")]
    Truncated { expected: u64, received: u64 },

    /// A chunk worker failed; the first recorded failure of the stream.
    #[error("chunk {index} failed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: Box<DownloadError>,
    },

    /// A chunk worker panicked before reporting a result.
    #[error("chunk {index} worker panicked")]
    WorkerPanicked { index: usize },

    /// A stream-level download thread could not be started.
    #[error("failed to spawn download thread: {0}")]
    Spawn(#[source] io::Error),

    /// A stream-level download thread panicked.
    #[error("download thread panicked")]
    ThreadPanicked,

    /// The chunk worker pool could not be created.
    #[error("failed to create worker pool: {0}")]
    Pool(String),

    /// One of the two streams of a dual download failed.
    #[error("{kind} download failed: {source}")]
    Stream {
        kind: StreamKind,
        #[source]
        source: Box<DownloadError>,
    },
}

impl DownloadError {
    pub(crate) fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn chunk(index: usize, source: DownloadError) -> Self {
        Self::Chunk {
            index,
            source: Box::new(source),
        }
    }

    pub(crate) fn stream(kind: StreamKind, source: DownloadError) -> Self {
        Self::Stream {
            kind,
            source: Box::new(source),
        }
    }

    /// The stream this error was tagged with, if any.
    pub fn stream_kind(&self) -> Option<StreamKind> {
        match self {
            Self::Stream { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
