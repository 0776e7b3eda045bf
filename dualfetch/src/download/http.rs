//! Shared blocking HTTP transport.
//!
//! A thin wrapper over `reqwest::blocking::Client` configured from
//! [`DownloadConfig`]. The client is cheap to clone and keeps its own
//! connection pool, so every chunk worker of every stream shares one.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;

use super::config::DownloadConfig;
use super::error::{DownloadError, DownloadResult};

/// Blocking HTTP client used by probes and downloaders.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    pub(crate) timeout: Duration,
}

impl HttpClient {
    /// Create a client with the timeouts and pool size from `config`.
    pub fn new(config: &DownloadConfig) -> DownloadResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_idle_connections)
            .user_agent(concat!("dualfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DownloadError::Client)?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    /// Issue a HEAD request and return the advertised `Content-Length`.
    ///
    /// Returns `None` on transport failure, non-success status, or a
    /// missing/unparseable header.
    pub fn head_content_length(&self, url: &str) -> Option<u64> {
        self.client
            .head(url)
            .send()
            .ok()
            .filter(|r| r.status().is_success())
            .and_then(|r| {
                r.headers()
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
            })
    }

    /// Request the single byte range `[0, 0]` and return the status.
    pub fn first_byte_status(&self, url: &str) -> DownloadResult<StatusCode> {
        let response = self
            .client
            .get(url)
            .header(RANGE, "bytes=0-0")
            .send()
            .map_err(|e| DownloadError::http(url, e))?;
        Ok(response.status())
    }

    /// Plain GET; any non-success status is a hard failure.
    pub fn get(&self, url: &str) -> DownloadResult<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DownloadError::http(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// GET restricted to `bytes=start-end` (inclusive).
    ///
    /// Any success status is accepted; a 200 means the server ignored the
    /// range and the caller must skip to `start` itself.
    pub fn get_range(&self, url: &str, start: u64, end: u64) -> DownloadResult<Response> {
        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-{}", start, end))
            .send()
            .map_err(|e| DownloadError::http(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// Configured per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
