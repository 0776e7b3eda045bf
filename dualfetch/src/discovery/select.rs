//! Quality listing and stream selection.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::candidate::{StreamCandidate, StreamCatalog};

const VIDEO_MIME: &str = "video/mp4";
const AUDIO_MIME: &str = "audio/mp4";

/// Errors choosing streams from a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Selected quality '{0}' no longer available")]
    QualityUnavailable(String),

    #[error("No compatible audio stream found for this video")]
    NoCompatibleAudio,

    #[error("No compatible video stream found for this video")]
    NoCompatibleVideo,
}

/// One selectable video quality.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityEntry {
    pub quality: String,
    pub url: String,
    /// Content length from metadata, 0 if unknown.
    pub size: u64,
    pub container: String,
    pub codec: String,
    pub bitrate: u64,
    pub fps: u32,
    pub title: String,
}

fn non_digits() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^0-9]").expect("valid regex"))
}

/// Sort key of a resolution label: its digits read as a number, or 0.
pub fn label_rank(label: &str) -> u64 {
    non_digits().replace_all(label, "").parse().unwrap_or(0)
}

/// List the downloadable qualities of `catalog`, best first.
///
/// Only progressive MP4 video with an AVC/H.264 codec is offered, and only
/// when a progressive MP4 audio stream exists to pair it with. Labels are
/// de-duplicated (first occurrence wins).
pub fn list_qualities(catalog: &StreamCatalog) -> Result<Vec<QualityEntry>, SelectionError> {
    let has_audio = catalog
        .audio_streams
        .iter()
        .any(|s| s.is_progressive_mime(AUDIO_MIME));
    if !has_audio {
        return Err(SelectionError::NoCompatibleAudio);
    }

    let title = catalog.display_title();
    let mut seen = std::collections::HashSet::new();
    let mut qualities: Vec<QualityEntry> = catalog
        .video_streams
        .iter()
        .filter(|s| s.is_progressive_mime(VIDEO_MIME) && s.is_avc())
        .filter_map(|s| {
            let label = s.resolution_label.as_ref()?;
            if !seen.insert(label.clone()) {
                return None;
            }
            Some(QualityEntry {
                quality: label.clone(),
                url: s.content_url.clone(),
                size: s.size_bytes.unwrap_or(0),
                container: "mp4".to_string(),
                codec: s.codec.clone().unwrap_or_else(|| "avc1".to_string()),
                bitrate: s.bitrate,
                fps: s.frame_rate,
                title: title.to_string(),
            })
        })
        .collect();

    qualities.sort_by_key(|q| std::cmp::Reverse(label_rank(&q.quality)));
    Ok(qualities)
}

/// Pick the progressive MP4 video stream labelled exactly `label`.
pub fn select_video<'a>(
    catalog: &'a StreamCatalog,
    label: &str,
) -> Result<&'a StreamCandidate, SelectionError> {
    let mut progressive = catalog
        .video_streams
        .iter()
        .filter(|s| s.is_progressive_mime(VIDEO_MIME))
        .peekable();
    if progressive.peek().is_none() {
        return Err(SelectionError::NoCompatibleVideo);
    }
    progressive
        .find(|s| s.resolution_label.as_deref() == Some(label))
        .ok_or_else(|| SelectionError::QualityUnavailable(label.to_string()))
}

/// Pick the progressive MP4 audio stream with the highest bitrate.
pub fn select_audio(catalog: &StreamCatalog) -> Result<&StreamCandidate, SelectionError> {
    catalog
        .audio_streams
        .iter()
        .filter(|s| s.is_progressive_mime(AUDIO_MIME))
        .max_by_key(|s| s.bitrate)
        .ok_or(SelectionError::NoCompatibleAudio)
}
