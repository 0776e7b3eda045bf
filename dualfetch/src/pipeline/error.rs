//! Pipeline-level errors with machine-checkable codes.

use std::path::PathBuf;

use thiserror::Error;

use crate::discovery::{ProviderError, SelectionError};
use crate::download::DownloadError;
use crate::mux::MuxError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Terminal failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("Muxing failed: {0}")]
    Mux(#[from] MuxError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Short error category for callers that branch on failures.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidArguments(_) => "INVALID_ARGUMENTS",
            PipelineError::Provider(_) | PipelineError::Selection(_) => "EXTRACTION_ERROR",
            PipelineError::Download(_) | PipelineError::Io { .. } => "DOWNLOAD_ERROR",
            PipelineError::Mux(_) => "MUX_ERROR",
        }
    }
}
