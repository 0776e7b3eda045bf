//! Sample-preserving muxing of one video and one audio input.
//!
//! Inputs are opened as [`SampleSource`]s, the first video and first audio
//! track are selected, and every sample is copied into a [`ContainerSink`]
//! with its timestamp and flags unchanged. The MP4 implementations of both
//! traits live in `container`; fragmented inputs are indexed by `fragment`.

mod container;
mod error;
mod fragment;
mod muxer;
mod sample;
mod traits;

pub use container::{Mp4ContainerSink, Mp4SampleSource};
pub use error::{MuxError, MuxResult};
pub use muxer::{mux_sources, MuxSummary, Muxer};
pub use sample::{MediaKind, SampleFlags, SampleRecord, TrackFormat, TrackInfo};
pub use traits::{ContainerSink, SampleSource};
