//! Stream metadata returned by a provider.

use serde::{Deserialize, Serialize};

fn default_progressive() -> bool {
    true
}

/// One downloadable elementary stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamCandidate {
    /// Resolution label such as `1080p` or `720p60`; audio has none.
    #[serde(default)]
    pub resolution_label: Option<String>,
    pub content_url: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub codec: Option<String>,
    pub mime_type: String,
    #[serde(default)]
    pub bitrate: u64,
    #[serde(default)]
    pub frame_rate: u32,
    /// Delivered as one plain HTTP resource (as opposed to segmented).
    #[serde(default = "default_progressive")]
    pub progressive: bool,
}

impl StreamCandidate {
    pub(crate) fn is_progressive_mime(&self, mime: &str) -> bool {
        self.progressive && self.mime_type.contains(mime)
    }

    pub(crate) fn is_avc(&self) -> bool {
        self.codec.as_deref().is_some_and(|c| {
            let c = c.to_ascii_lowercase();
            c.contains("avc") || c.contains("h264")
        })
    }
}

/// Everything a provider knows about one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamCatalog {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub video_streams: Vec<StreamCandidate>,
    #[serde(default)]
    pub audio_streams: Vec<StreamCandidate>,
}

impl StreamCatalog {
    /// Title or the `video` placeholder.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("video")
    }
}
