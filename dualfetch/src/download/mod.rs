//! Parallel HTTP downloads for media streams.
//!
//! This module provides:
//! - Content length and range support probing (`probe`)
//! - Byte-range partitioning and multi-connection transfers (`chunk`)
//! - A single-connection fallback (`single`)
//! - Per-stream path selection (`stream`)
//! - Concurrent video + audio downloads with combined progress (`coordinator`)
//!
//! # Architecture
//!
//! ```text
//! DualStreamCoordinator
//!         │
//!         ├── "video-dl" thread ──┐
//!         └── "audio-dl" thread ──┤
//!                                 ▼
//!                         StreamDownloader
//!                                 │
//!                 ├── RangeProbe (HEAD, bytes=0-0)
//!                 ├── ChunkDownloader ──► ChunkPool (shared workers)
//!                 └── SingleStreamDownloader
//!
//! StreamProgress (video) ─┐
//! StreamProgress (audio) ─┴─► CombinedProgress ──► caller
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use dualfetch::download::{DownloadConfig, DualStreamCoordinator, HttpClient, StreamDescriptor};
//!
//! let config = DownloadConfig::default();
//! let pool = dualfetch::bootstrap::ensure_initialized(&config)?;
//! let coordinator = DualStreamCoordinator::new(&config, HttpClient::new(&config)?, pool);
//!
//! let outcome = coordinator.download(
//!     StreamDescriptor::new(video_url, None, "/tmp/temp_video.mp4"),
//!     StreamDescriptor::new(audio_url, None, "/tmp/temp_audio.m4a"),
//!     Arc::new(|fraction| println!("{:.0}%", fraction * 100.0)),
//! )?;
//! ```

mod chunk;
mod config;
mod coordinator;
mod error;
mod http;
mod pool;
mod probe;
mod progress;
mod single;
mod stream;

pub use chunk::{partition, ChunkDownloader, DownloadTask};
pub use config::{
    DownloadConfig, DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_COUNT, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_MAX_IDLE_CONNECTIONS, DEFAULT_MIN_CHUNK_SIZE, DEFAULT_PROGRESS_INTERVAL,
    DEFAULT_TIMEOUT_SECS, DEFAULT_WORKER_THREADS,
};
pub use coordinator::{DualOutcome, DualStreamCoordinator};
pub use error::{DownloadError, DownloadResult, StreamKind};
pub use http::HttpClient;
pub use pool::ChunkPool;
pub use probe::{ContentLength, RangeProbe};
pub use progress::{
    ByteProgressCallback, CombinedProgress, FractionCallback, ProgressSnapshot, RateLimiter,
    StreamProgress, DOWNLOAD_PROGRESS_SHARE,
};
pub use single::SingleStreamDownloader;
pub use stream::{StreamDescriptor, StreamDownloader, StreamOutcome, TransferMode};
