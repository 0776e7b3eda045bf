//! Concurrent video + audio download.
//!
//! Each stream runs on its own named thread and fans out its chunks onto the
//! shared [`ChunkPool`]. Byte counts from both streams are merged into one
//! rate-limited fraction in `0.0..=share`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info};

use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult, StreamKind};
use super::http::HttpClient;
use super::pool::ChunkPool;
use super::progress::{
    ByteProgressCallback, CombinedProgress, FractionCallback, ProgressSnapshot, StreamProgress,
    DOWNLOAD_PROGRESS_SHARE,
};
use super::stream::{StreamDescriptor, StreamDownloader, StreamOutcome};

/// Result of a successful dual download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualOutcome {
    pub video: StreamOutcome,
    pub audio: StreamOutcome,
    /// Final video counters as seen by the progress reporter.
    pub video_progress: ProgressSnapshot,
    /// Final audio counters as seen by the progress reporter.
    pub audio_progress: ProgressSnapshot,
}

/// Downloads a video and an audio stream at the same time.
#[derive(Debug, Clone)]
pub struct DualStreamCoordinator {
    downloader: StreamDownloader,
    progress_interval: Duration,
    share: f64,
}

impl DualStreamCoordinator {
    /// Create a coordinator sharing `client` and `pool` between both streams.
    pub fn new(config: &DownloadConfig, client: HttpClient, pool: Arc<ChunkPool>) -> Self {
        Self {
            downloader: StreamDownloader::new(config, client, pool),
            progress_interval: config.progress_interval,
            share: DOWNLOAD_PROGRESS_SHARE,
        }
    }

    /// Override the portion of overall progress owned by downloading.
    pub fn with_progress_share(mut self, share: f64) -> Self {
        self.share = share.clamp(0.0, 1.0);
        self
    }

    /// Download both streams and block until both are finished.
    ///
    /// `on_progress` receives the combined fraction scaled by the progress
    /// share; calls are serialized, rate-limited and never decrease. A final
    /// value is always emitted once both streams succeed.
    ///
    /// When both streams fail the video error is returned.
    pub fn download(
        &self,
        video: StreamDescriptor,
        audio: StreamDescriptor,
        on_progress: FractionCallback,
    ) -> DownloadResult<DualOutcome> {
        let video_counters = Arc::new(StreamProgress::new(video.expected_size()));
        let audio_counters = Arc::new(StreamProgress::new(audio.expected_size()));
        let combined = Arc::new(CombinedProgress::new(
            Arc::clone(&video_counters),
            Arc::clone(&audio_counters),
            self.share,
            self.progress_interval,
            on_progress,
        ));

        let video_handle = self.spawn_stream(
            StreamKind::Video,
            video,
            Arc::clone(&video_counters),
            Arc::clone(&combined),
        )?;
        let audio_handle = self.spawn_stream(
            StreamKind::Audio,
            audio,
            Arc::clone(&audio_counters),
            Arc::clone(&combined),
        );

        // Joining the video thread even when the audio spawn failed keeps
        // no download running past this call.
        let video_result = join_stream(StreamKind::Video, video_handle);
        let audio_result = match audio_handle {
            Ok(handle) => join_stream(StreamKind::Audio, handle),
            Err(e) => Err(e),
        };

        let (video, audio) = match (video_result, audio_result) {
            (Ok(video), Ok(audio)) => (video, audio),
            (Err(e), _) | (Ok(_), Err(e)) => {
                error!(error = %e, "Dual download failed");
                return Err(e);
            }
        };

        // Pin the counters to the final sizes so the last emit is exact.
        video_counters.record(video.bytes_written, video.content_length);
        audio_counters.record(audio.bytes_written, audio.content_length);
        combined.report_final();

        info!(
            video_bytes = video.bytes_written,
            audio_bytes = audio.bytes_written,
            "Video and audio downloads complete"
        );

        Ok(DualOutcome {
            video,
            audio,
            video_progress: video_counters.snapshot(),
            audio_progress: audio_counters.snapshot(),
        })
    }

    fn spawn_stream(
        &self,
        kind: StreamKind,
        descriptor: StreamDescriptor,
        counters: Arc<StreamProgress>,
        combined: Arc<CombinedProgress>,
    ) -> DownloadResult<JoinHandle<DownloadResult<StreamOutcome>>> {
        let downloader = self.downloader.clone();
        let on_bytes: ByteProgressCallback = Arc::new(move |downloaded, total| {
            counters.record(downloaded, total);
            combined.report();
        });

        thread::Builder::new()
            .name(format!("{}-dl", kind.as_str()))
            .spawn(move || downloader.download(&descriptor, on_bytes))
            .map_err(|e| DownloadError::stream(kind, DownloadError::Spawn(e)))
    }
}

fn join_stream(
    kind: StreamKind,
    handle: JoinHandle<DownloadResult<StreamOutcome>>,
) -> DownloadResult<StreamOutcome> {
    match handle.join() {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(DownloadError::stream(kind, e)),
        Err(_) => Err(DownloadError::stream(kind, DownloadError::ThreadPanicked)),
    }
}
