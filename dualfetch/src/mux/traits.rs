//! Abstractions over container demuxing and muxing.
//!
//! The muxer drives these traits only, so its state machine can be tested
//! with in-memory implementations.

use super::error::MuxResult;
use super::sample::{SampleRecord, TrackInfo};

/// A demuxed input yielding samples of one selected track.
pub trait SampleSource {
    /// All tracks of the input.
    fn tracks(&self) -> &[TrackInfo];

    /// Restrict subsequent reads to the track at `index`.
    fn select_track(&mut self, index: usize) -> MuxResult<()>;

    /// Position the selected track at its first sync sample.
    fn seek_to_start(&mut self) -> MuxResult<()>;

    /// Read the next sample of the selected track into `buffer`.
    ///
    /// The buffer is reused between calls; returns `None` at end of track.
    fn read_sample(&mut self, buffer: &mut Vec<u8>) -> MuxResult<Option<SampleRecord>>;
}

/// An output container being written.
///
/// Tracks must all be added before [`start`](ContainerSink::start); samples
/// may only be written after it. Dropping the sink releases it without
/// finalizing.
pub trait ContainerSink {
    /// Declare a track and return its output index.
    fn add_track(&mut self, track: &TrackInfo) -> MuxResult<usize>;

    /// Begin writing; no tracks can be added afterwards.
    fn start(&mut self) -> MuxResult<()>;

    /// Append one sample to the output track `track`.
    fn write_sample(&mut self, track: usize, data: &[u8], sample: &SampleRecord)
        -> MuxResult<()>;

    /// Finalize the container. Only valid after a successful `start`.
    fn stop(&mut self) -> MuxResult<()>;
}
