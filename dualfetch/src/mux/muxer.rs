//! Two-track muxing state machine and file-level entry points.
//!
//! ```text
//! Idle → TracksOpened → TracksSelected → ContainerStarted → Writing → Finalized
//!                                  (any state) → Failed
//! ```
//!
//! The video track is written in full before the audio track; samples keep
//! their timestamps and flags.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{debug, error, info, warn};

use super::container::{Mp4ContainerSink, Mp4SampleSource};
use super::error::{MuxError, MuxResult};
use super::sample::{MediaKind, TrackInfo};
use super::traits::{ContainerSink, SampleSource};

/// Counts of samples written per track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxSummary {
    pub video_samples: u64,
    pub audio_samples: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MuxState {
    Idle,
    TracksOpened,
    TracksSelected,
    ContainerStarted,
    Writing,
    Finalized,
    Failed,
}

impl MuxState {
    fn is_started(self) -> bool {
        matches!(self, MuxState::ContainerStarted | MuxState::Writing)
    }
}

/// Select the first track of `kind` in `source`.
fn select_track<S: SampleSource>(source: &mut S, kind: MediaKind) -> MuxResult<TrackInfo> {
    let track = source
        .tracks()
        .iter()
        .find(|t| t.is_kind(kind))
        .cloned()
        .ok_or(MuxError::MissingTrack { kind })?;
    source.select_track(track.index)?;
    debug!(kind = %kind, index = track.index, mime = %track.mime, "Selected track");
    Ok(track)
}

/// Copy every sample of `source`'s selected track to output track `track`.
fn drain<S: SampleSource, C: ContainerSink>(
    source: &mut S,
    sink: &mut C,
    track: usize,
    buffer: &mut Vec<u8>,
) -> MuxResult<u64> {
    source.seek_to_start()?;
    let mut written = 0;
    while let Some(sample) = source.read_sample(buffer)? {
        let end = sample.offset + sample.size;
        let data = buffer
            .get(sample.offset..end)
            .ok_or(MuxError::InvalidState("sample exceeds read buffer"))?;
        sink.write_sample(track, data, &sample)?;
        written += 1;
    }
    Ok(written)
}

fn run<V, A, C, F>(
    video: &mut V,
    audio: &mut A,
    open_sink: F,
    sink: &mut Option<C>,
    state: &mut MuxState,
) -> MuxResult<MuxSummary>
where
    V: SampleSource,
    A: SampleSource,
    C: ContainerSink,
    F: FnOnce() -> MuxResult<C>,
{
    let video_track = select_track(video, MediaKind::Video)?;
    let audio_track = select_track(audio, MediaKind::Audio)?;
    *state = MuxState::TracksSelected;

    let out = sink.insert(open_sink()?);
    let video_index = out.add_track(&video_track)?;
    let audio_index = out.add_track(&audio_track)?;
    out.start()?;
    *state = MuxState::ContainerStarted;

    let mut buffer = Vec::new();
    *state = MuxState::Writing;
    let video_samples = drain(video, out, video_index, &mut buffer)?;
    let audio_samples = drain(audio, out, audio_index, &mut buffer)?;

    out.stop()?;
    *state = MuxState::Finalized;

    Ok(MuxSummary {
        video_samples,
        audio_samples,
    })
}

/// Mux the video track of `video` and the audio track of `audio`.
///
/// `open_sink` is only called once both tracks are selected, so a missing
/// track never creates an output. On failure a started container is still
/// stopped before being released; an unstarted one is only released.
pub fn mux_sources<V, A, C, F>(video: &mut V, audio: &mut A, open_sink: F) -> MuxResult<MuxSummary>
where
    V: SampleSource,
    A: SampleSource,
    C: ContainerSink,
    F: FnOnce() -> MuxResult<C>,
{
    let mut state = MuxState::Idle;
    debug!(state = ?state, "Mux starting");
    state = MuxState::TracksOpened;
    let mut sink: Option<C> = None;

    match run(video, audio, open_sink, &mut sink, &mut state) {
        Ok(summary) => Ok(summary),
        Err(e) => {
            let failed_in = state;
            if failed_in.is_started() {
                if let Some(out) = sink.as_mut() {
                    if let Err(stop_err) = out.stop() {
                        warn!(error = %stop_err, "Failed to stop container after error");
                    }
                }
            }
            state = MuxState::Failed;
            debug!(state = ?state, failed_in = ?failed_in, "Mux aborted");
            Err(e)
        }
    }
}

/// File-level muxing entry points.
#[derive(Debug, Default, Clone, Copy)]
pub struct Muxer;

impl Muxer {
    pub fn new() -> Self {
        Self
    }

    /// Mux two MP4 files into `output`, returning counts on success.
    ///
    /// A failed run removes `output` if it was created.
    pub fn try_mux_files(&self, video: &Path, audio: &Path, output: &Path) -> MuxResult<MuxSummary> {
        let mut video_source = Mp4SampleSource::open(video)?;
        let mut audio_source = Mp4SampleSource::open(audio)?;

        let mut created = false;
        let result = mux_sources(&mut video_source, &mut audio_source, || {
            let sink = Mp4ContainerSink::create(output)?;
            created = true;
            Ok(sink)
        });

        if result.is_err() && created {
            if let Err(e) = fs::remove_file(output) {
                warn!(path = %output.display(), error = %e, "Failed to remove partial output");
            }
        }
        result
    }

    /// Mux two MP4 files into `output`; failures are logged.
    pub fn mux_files(&self, video: &Path, audio: &Path, output: &Path) -> bool {
        match self.try_mux_files(video, audio, output) {
            Ok(summary) => {
                info!(
                    output = %output.display(),
                    video_samples = summary.video_samples,
                    audio_samples = summary.audio_samples,
                    "Mux complete"
                );
                true
            }
            Err(e) => {
                error!(
                    video = %video.display(),
                    audio = %audio.display(),
                    output = %output.display(),
                    error = %e,
                    "Mux failed"
                );
                false
            }
        }
    }

    /// Mux two in-memory MP4 files by spilling them to temporary files.
    pub fn mux_bytes(&self, video: &[u8], audio: &[u8], output: &Path) -> bool {
        let spill = |bytes: &[u8], suffix: &str| -> MuxResult<tempfile::NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("dualfetch-mux-")
                .suffix(suffix)
                .tempfile()
                .map_err(|e| MuxError::io(std::env::temp_dir(), e))?;
            file.write_all(bytes)
                .and_then(|_| file.flush())
                .map_err(|e| MuxError::io(file.path(), e))?;
            Ok(file)
        };

        let spilled = spill(video, ".mp4").and_then(|v| Ok((v, spill(audio, ".m4a")?)));
        match spilled {
            Ok((video_file, audio_file)) => {
                self.mux_files(video_file.path(), audio_file.path(), output)
            }
            Err(e) => {
                error!(output = %output.display(), error = %e, "Failed to stage mux inputs");
                false
            }
        }
    }

    /// Persist an already-muxed file at `output`, overwriting it.
    pub fn copy_single_file(&self, input: &Path, output: &Path) -> bool {
        let result = ensure_parent(output).and_then(|_| {
            fs::copy(input, output)
                .map(|_| ())
                .map_err(|e| MuxError::io(output, e))
        });
        report_single(result, output)
    }

    /// Persist an already-muxed in-memory file at `output`, overwriting it.
    pub fn write_single_bytes(&self, bytes: &[u8], output: &Path) -> bool {
        let result = ensure_parent(output)
            .and_then(|_| fs::write(output, bytes).map_err(|e| MuxError::io(output, e)));
        report_single(result, output)
    }
}

fn ensure_parent(path: &Path) -> MuxResult<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| MuxError::io(parent, e)),
        None => Ok(()),
    }
}

fn report_single(result: MuxResult<()>, output: &Path) -> bool {
    match result {
        Ok(()) => {
            info!(output = %output.display(), "Single stream saved");
            true
        }
        Err(e) => {
            error!(output = %output.display(), error = %e, "Failed to save single stream");
            false
        }
    }
}
