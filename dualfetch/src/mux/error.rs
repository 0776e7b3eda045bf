//! Error types for muxing.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::sample::MediaKind;

/// Result type for mux operations.
pub type MuxResult<T> = Result<T, MuxError>;

/// Errors that can occur while muxing.
#[derive(Debug, Error)]
pub enum MuxError {
    /// A source has no track of the required media kind.
    #[error("Missing video or audio track: no {kind} track found")]
    MissingTrack { kind: MediaKind },

    /// An input could not be parsed as a container.
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: mp4::Error,
    },

    /// The container library rejected an operation.
    #[error("container {operation} failed: {source}")]
    Container {
        operation: &'static str,
        #[source]
        source: mp4::Error,
    },

    /// A selected track uses a format the output container cannot carry.
    #[error("unsupported track format: {0}")]
    UnsupportedTrack(String),

    /// An operation was attempted out of order.
    #[error("invalid muxer state: {0}")]
    InvalidState(&'static str),

    /// Filesystem error on an input, output or temporary file.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MuxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn container(operation: &'static str) -> impl FnOnce(mp4::Error) -> Self {
        move |source| Self::Container { operation, source }
    }
}
