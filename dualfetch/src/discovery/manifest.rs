//! Catalog providers.

use std::fs;
use std::io::Read;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::candidate::StreamCatalog;
use crate::download::{DownloadError, HttpClient};

/// Errors fetching or decoding a catalog.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch manifest {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: DownloadError,
    },

    #[error("malformed manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Source of stream catalogs for page URLs.
pub trait StreamProvider: Send + Sync {
    /// Fetch the catalog for `url`.
    fn fetch_catalog(&self, url: &str) -> Result<StreamCatalog, ProviderError>;
}

/// Reads a JSON [`StreamCatalog`] from a local path, a `file://` URL, or
/// an `http(s)://` URL.
#[derive(Debug, Clone)]
pub struct ManifestProvider {
    client: HttpClient,
}

impl ManifestProvider {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    fn fetch_remote(&self, url: &str) -> Result<String, ProviderError> {
        let fetch_err = |source| ProviderError::Fetch {
            url: url.to_string(),
            source,
        };
        let mut response = self.client.get(url).map_err(fetch_err)?;
        let mut body = String::new();
        response.read_to_string(&mut body).map_err(|e| {
            fetch_err(DownloadError::Read {
                url: url.to_string(),
                source: e,
            })
        })?;
        Ok(body)
    }
}

impl StreamProvider for ManifestProvider {
    fn fetch_catalog(&self, url: &str) -> Result<StreamCatalog, ProviderError> {
        let body = if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_remote(url)?
        } else {
            let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
            fs::read_to_string(&path).map_err(|source| ProviderError::Read { path, source })?
        };

        let catalog: StreamCatalog = serde_json::from_str(&body)?;
        debug!(
            url = %url,
            video = catalog.video_streams.len(),
            audio = catalog.audio_streams.len(),
            "Loaded stream catalog"
        );
        Ok(catalog)
    }
}
