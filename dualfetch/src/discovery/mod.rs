//! Stream discovery: catalogs, quality listing and stream selection.
//!
//! A [`StreamProvider`] turns a page URL into a [`StreamCatalog`]; the
//! selection functions pick the video and audio streams to download.

mod candidate;
mod manifest;
mod select;

pub use candidate::{StreamCandidate, StreamCatalog};
pub use manifest::{ManifestProvider, ProviderError, StreamProvider};
pub use select::{label_rank, list_qualities, select_audio, select_video, QualityEntry, SelectionError};
