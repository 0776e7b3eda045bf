//! Track and sample descriptions shared by sources and sinks.

use std::fmt;

/// Media kind a muxer input must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// MIME prefix identifying tracks of this kind.
    pub fn mime_prefix(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/",
            MediaKind::Audio => "audio/",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Codec parameters needed to recreate a track in the output container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackFormat {
    Avc {
        width: u16,
        height: u16,
        sps: Vec<u8>,
        pps: Vec<u8>,
    },
    Hevc {
        width: u16,
        height: u16,
    },
    Vp9 {
        width: u16,
        height: u16,
    },
    /// AAC; fields hold the MPEG-4 audio object type, sampling frequency
    /// index and channel configuration codes.
    Aac {
        bitrate: u32,
        profile: u8,
        freq_index: u8,
        channels: u8,
    },
    /// Anything the output container cannot carry.
    Other(String),
}

/// One track of an input, as reported by its [`SampleSource`](super::SampleSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    /// Position in the source's track list.
    pub index: usize,
    /// MIME type, e.g. `video/avc` or `audio/mp4a-latm`.
    pub mime: String,
    /// Ticks per second of the track's timestamps.
    pub timescale: u32,
    pub sample_count: u32,
    pub format: TrackFormat,
}

impl TrackInfo {
    /// Whether the track's MIME type is of `kind`.
    pub fn is_kind(&self, kind: MediaKind) -> bool {
        self.mime.starts_with(kind.mime_prefix())
    }
}

/// Per-sample flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleFlags(pub u32);

impl SampleFlags {
    /// Sample is a sync point (key frame).
    pub const SYNC: SampleFlags = SampleFlags(1);

    pub fn is_sync(self) -> bool {
        self.0 & Self::SYNC.0 != 0
    }
}

/// One sample read from a source.
///
/// The payload lives in the caller's reusable buffer at
/// `offset..offset + size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord {
    pub track_index: usize,
    pub offset: usize,
    pub size: usize,
    /// Decode timestamp in track timescale ticks.
    pub timestamp: u64,
    /// Duration in track timescale ticks as stored in the source.
    pub duration: u32,
    /// Presentation minus decode time, in ticks.
    pub rendering_offset: i32,
    pub flags: SampleFlags,
}

impl SampleRecord {
    /// Presentation timestamp in track timescale ticks.
    pub fn presentation_time(&self) -> i64 {
        self.timestamp as i64 + self.rendering_offset as i64
    }
}
