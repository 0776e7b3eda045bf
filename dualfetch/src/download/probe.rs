//! Content length and range support probing.
//!
//! Probes never fail: a network error or an unexpected answer resolves to
//! the safe default ([`ContentLength::Unknown`], no range support), which
//! only forces the single-connection path.

use reqwest::StatusCode;
use tracing::{debug, warn};

use super::http::HttpClient;

/// Total size of a remote resource, if it could be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentLength {
    Known(u64),
    Unknown,
}

impl ContentLength {
    /// Build from a metadata-reported size; zero counts as unknown.
    pub fn from_expected(size: Option<u64>) -> Self {
        match size {
            Some(n) if n > 0 => ContentLength::Known(n),
            _ => ContentLength::Unknown,
        }
    }

    /// The known length, if any.
    pub fn known(self) -> Option<u64> {
        match self {
            ContentLength::Known(n) => Some(n),
            ContentLength::Unknown => None,
        }
    }
}

/// Determines content length and byte-range support for a URL.
#[derive(Debug, Clone)]
pub struct RangeProbe {
    client: HttpClient,
}

impl RangeProbe {
    /// Create a probe that shares `client`'s connection pool.
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Resolve the total length of `url`.
    ///
    /// A positive size already known from metadata wins; otherwise a HEAD
    /// request is issued.
    pub fn resolve_content_length(&self, url: &str, expected: Option<u64>) -> ContentLength {
        let from_metadata = ContentLength::from_expected(expected);
        if from_metadata != ContentLength::Unknown {
            return from_metadata;
        }

        match self.client.head_content_length(url) {
            Some(length) => {
                debug!(url = %url, length, "Resolved content length via HEAD");
                ContentLength::from_expected(Some(length))
            }
            None => {
                warn!(url = %url, "Content length unknown, chunking disabled");
                ContentLength::Unknown
            }
        }
    }

    /// Check whether `url` answers a `bytes=0-0` request with 206.
    pub fn supports_ranges(&self, url: &str) -> bool {
        match self.client.first_byte_status(url) {
            Ok(status) => {
                let supported = status == StatusCode::PARTIAL_CONTENT;
                debug!(url = %url, status = status.as_u16(), supported, "Range probe");
                supported
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Range probe failed, assuming no range support");
                false
            }
        }
    }
}
