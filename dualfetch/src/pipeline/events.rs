//! Progress events delivered to the pipeline's caller.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

/// Status text while streams are downloading.
pub const STATUS_DOWNLOADING: &str = "Downloading...";
/// Status text while the container is being written.
pub const STATUS_MUXING: &str = "Muxing files...";
/// Status text of the final event.
pub const STATUS_COMPLETED: &str = "Download completed";

/// One progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Overall progress in `[0, 1]`.
    pub fraction: f64,
    pub status: String,
    pub title: Option<String>,
    /// Set only on the completion event.
    pub output_path: Option<PathBuf>,
}

impl ProgressEvent {
    pub fn new(fraction: f64, status: &str, title: Option<&str>) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            status: status.to_string(),
            title: title.map(str::to_string),
            output_path: None,
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

/// Receiver of progress events.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that never lets two deliveries overlap.
///
/// Events may be produced by download workers and by the calling thread;
/// this wrapper is the single writer in front of the caller's sink.
pub struct SerializedSink {
    inner: Arc<dyn ProgressSink>,
    gate: Mutex<()>,
}

impl SerializedSink {
    pub fn new(inner: Arc<dyn ProgressSink>) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }
}

impl ProgressSink for SerializedSink {
    fn on_progress(&self, event: ProgressEvent) {
        let _held = self.gate.lock();
        self.inner.on_progress(event);
    }
}
