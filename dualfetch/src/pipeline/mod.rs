//! Download pipeline: the single entry point hosts call.
//!
//! A run discovers the streams of a page, downloads video and audio in
//! parallel, muxes them and reports progress through a [`ProgressSink`]:
//!
//! | fraction      | status             |
//! |---------------|--------------------|
//! | `0.0..=0.85`  | `Downloading...`   |
//! | `0.85`        | `Muxing files...`  |
//! | `1.0`         | `Download completed` (with output path) |
//!
//! Failures end the run with a [`PipelineError`] whose [`code`](PipelineError::code)
//! is one of `INVALID_ARGUMENTS`, `EXTRACTION_ERROR`, `DOWNLOAD_ERROR` or
//! `MUX_ERROR`.

mod error;
mod events;
mod runner;

pub use error::{PipelineError, PipelineResult};
pub use events::{
    ProgressEvent, ProgressSink, SerializedSink, STATUS_COMPLETED, STATUS_DOWNLOADING,
    STATUS_MUXING,
};
pub use runner::{DownloadRequest, DownloadSummary, Pipeline, TEMP_AUDIO_NAME, TEMP_VIDEO_NAME};
