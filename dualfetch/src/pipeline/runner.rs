//! End-to-end download: discover, fetch both streams, mux, clean up.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::{PipelineError, PipelineResult};
use super::events::{
    ProgressEvent, ProgressSink, SerializedSink, STATUS_COMPLETED, STATUS_DOWNLOADING,
    STATUS_MUXING,
};
use crate::bootstrap;
use crate::discovery::{list_qualities, select_audio, select_video, QualityEntry, StreamProvider};
use crate::download::{
    DownloadConfig, DualStreamCoordinator, FractionCallback, HttpClient, StreamDescriptor,
    DOWNLOAD_PROGRESS_SHARE,
};
use crate::mux::Muxer;

/// Temporary file name of the downloaded video stream.
pub const TEMP_VIDEO_NAME: &str = "temp_video.mp4";
/// Temporary file name of the downloaded audio stream.
pub const TEMP_AUDIO_NAME: &str = "temp_audio.m4a";

/// Parameters of one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Page URL understood by the provider.
    pub page_url: String,
    /// Exact quality label, as returned by [`Pipeline::qualities`].
    pub quality: String,
    /// Directory for the two per-stream temporary files.
    pub temp_dir: PathBuf,
    /// Muxed output file.
    pub output_path: PathBuf,
}

/// Result of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub output_path: PathBuf,
    pub title: String,
}

/// Drives a [`StreamProvider`], the downloader and the muxer.
pub struct Pipeline<P> {
    provider: P,
    config: DownloadConfig,
    muxer: Muxer,
}

impl<P: StreamProvider> Pipeline<P> {
    pub fn new(provider: P, config: DownloadConfig) -> Self {
        Self {
            provider,
            config,
            muxer: Muxer::new(),
        }
    }

    /// List the downloadable qualities for `page_url`, best first.
    pub fn qualities(&self, page_url: &str) -> PipelineResult<Vec<QualityEntry>> {
        if page_url.trim().is_empty() {
            return Err(PipelineError::InvalidArguments(
                "Missing 'url' parameter".to_string(),
            ));
        }
        bootstrap::ensure_initialized(&self.config)?;
        let catalog = self.provider.fetch_catalog(page_url)?;
        Ok(list_qualities(&catalog)?)
    }

    /// Download `request.quality` of `request.page_url` into
    /// `request.output_path`.
    ///
    /// Events go through one serialized wrapper around `sink`: download
    /// progress up to 0.85, a muxing event at 0.85 and a completion event at
    /// 1.0. Temporary files are removed whether the run succeeds or not.
    pub fn download(
        &self,
        request: &DownloadRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> PipelineResult<DownloadSummary> {
        if request.page_url.trim().is_empty() || request.quality.trim().is_empty() {
            return Err(PipelineError::InvalidArguments(
                "Missing 'url' or 'quality' parameter".to_string(),
            ));
        }

        let pool = bootstrap::ensure_initialized(&self.config)?;
        let sink = Arc::new(SerializedSink::new(sink));

        let catalog = self.provider.fetch_catalog(&request.page_url)?;
        let video = select_video(&catalog, &request.quality)?;
        let audio = select_audio(&catalog)?;
        let title = catalog.display_title().to_string();
        debug!(
            title = %title,
            video = %video.content_url,
            audio = %audio.content_url,
            "Selected streams"
        );

        create_dir(&request.temp_dir)?;
        if let Some(parent) = request.output_path.parent() {
            create_dir(parent)?;
        }
        let temp_video = request.temp_dir.join(TEMP_VIDEO_NAME);
        let temp_audio = request.temp_dir.join(TEMP_AUDIO_NAME);

        let client = HttpClient::new(&self.config)?;
        let coordinator = DualStreamCoordinator::new(&self.config, client, pool)
            .with_progress_share(DOWNLOAD_PROGRESS_SHARE);

        let progress_sink = Arc::clone(&sink);
        let progress_title = title.clone();
        let on_fraction: FractionCallback = Arc::new(move |fraction| {
            progress_sink.on_progress(ProgressEvent::new(
                fraction,
                STATUS_DOWNLOADING,
                Some(&progress_title),
            ));
        });

        let downloaded = coordinator.download(
            StreamDescriptor::new(&video.content_url, video.size_bytes, &temp_video),
            StreamDescriptor::new(&audio.content_url, audio.size_bytes, &temp_audio),
            on_fraction,
        );
        if let Err(e) = downloaded {
            remove_temp(&temp_video);
            remove_temp(&temp_audio);
            return Err(e.into());
        }

        sink.on_progress(ProgressEvent::new(
            DOWNLOAD_PROGRESS_SHARE,
            STATUS_MUXING,
            Some(&title),
        ));

        let muxed = self
            .muxer
            .try_mux_files(&temp_video, &temp_audio, &request.output_path);
        remove_temp(&temp_video);
        remove_temp(&temp_audio);

        let summary = match muxed {
            Ok(summary) => summary,
            Err(e) => {
                error!(
                    output = %request.output_path.display(),
                    error = %e,
                    "Mux failed"
                );
                return Err(e.into());
            }
        };

        info!(
            title = %title,
            output = %request.output_path.display(),
            video_samples = summary.video_samples,
            audio_samples = summary.audio_samples,
            "Download completed"
        );
        sink.on_progress(
            ProgressEvent::new(1.0, STATUS_COMPLETED, Some(&title))
                .with_output_path(&request.output_path),
        );

        Ok(DownloadSummary {
            output_path: request.output_path.clone(),
            title,
        })
    }
}

fn create_dir(path: &Path) -> PipelineResult<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_temp(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed temporary file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary file"),
    }
}
