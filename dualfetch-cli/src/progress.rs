//! Terminal progress bars.

use std::sync::Arc;
use std::time::Duration;

use dualfetch::download::ByteProgressCallback;
use dualfetch::pipeline::{ProgressEvent, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};

const FRACTION_SCALE: u64 = 1000;

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Progress bar driven by pipeline events.
pub struct PipelineBar {
    bar: ProgressBar,
}

impl PipelineBar {
    pub fn new() -> Self {
        let bar = ProgressBar::new(FRACTION_SCALE);
        bar.set_style(style("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}"));
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl Default for PipelineBar {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for PipelineBar {
    fn on_progress(&self, event: ProgressEvent) {
        self.bar
            .set_position((event.fraction * FRACTION_SCALE as f64).round() as u64);
        match event.title {
            Some(title) => self.bar.set_message(format!("{} {}", event.status, title)),
            None => self.bar.set_message(event.status),
        }
    }
}

/// Byte-count bar for a single stream; the length is filled in once known.
pub fn byte_bar() -> (ProgressBar, ByteProgressCallback) {
    let bar = ProgressBar::new(0);
    bar.set_style(style(
        "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
    ));
    let handle = bar.clone();
    let callback: ByteProgressCallback = Arc::new(move |downloaded, total| {
        if let Some(total) = total {
            if handle.length() != Some(total) {
                handle.set_length(total);
            }
        }
        handle.set_position(downloaded);
    });
    (bar, callback)
}
