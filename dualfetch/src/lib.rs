//! dualfetch - parallel video/audio stream downloading and muxing.
//!
//! This library fetches a video and an audio elementary stream over HTTP
//! using several range requests per stream, reports one combined progress
//! value, and muxes both streams into a single MP4 file without touching
//! sample timing.
//!
//! # Modules
//!
//! - [`download`] - range probing, chunked and single-connection transfers,
//!   dual-stream coordination
//! - [`mux`] - sample-preserving two-track muxing
//! - [`discovery`] - stream catalogs and quality selection
//! - [`pipeline`] - discover → download → mux with progress events
//! - [`config`], [`logging`], [`bootstrap`] - process setup

pub mod bootstrap;
pub mod config;
pub mod discovery;
pub mod download;
pub mod logging;
pub mod mux;
pub mod pipeline;
