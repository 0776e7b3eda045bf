//! Single-stream downloads against a local server: chunked path, fallbacks,
//! and chunk failure propagation.

mod common;

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{pattern, FixtureServer, Resource};
use dualfetch::download::{
    ByteProgressCallback, ChunkPool, DownloadConfig, DownloadError, HttpClient, StreamDescriptor,
    StreamDownloader, TransferMode,
};

const MIB: usize = 1024 * 1024;

fn downloader(config: &DownloadConfig) -> StreamDownloader {
    let client = HttpClient::new(config).unwrap();
    let pool = Arc::new(ChunkPool::new(config.worker_threads).unwrap());
    StreamDownloader::new(config, client, pool)
}

fn test_config() -> DownloadConfig {
    DownloadConfig::new()
        .with_worker_threads(8)
        .with_buffer_size(16 * 1024)
        .with_timeout(Duration::from_secs(30))
}

/// Callback recording the highest byte count and the last total seen.
fn tracking_callback() -> (ByteProgressCallback, Arc<AtomicU64>, Arc<AtomicU64>) {
    let max_seen = Arc::new(AtomicU64::new(0));
    let last_total = Arc::new(AtomicU64::new(0));
    let (m, t) = (Arc::clone(&max_seen), Arc::clone(&last_total));
    let callback: ByteProgressCallback = Arc::new(move |downloaded, total| {
        m.fetch_max(downloaded, Ordering::SeqCst);
        if let Some(total) = total {
            t.store(total, Ordering::SeqCst);
        }
    });
    (callback, max_seen, last_total)
}

#[test]
fn test_chunked_download_reassembles_body() {
    let server = FixtureServer::start();
    let body = pattern(3 * MIB + 12_345);
    let url = server.add("/video.mp4", Resource::new(body.clone()));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("video.mp4");

    let (callback, max_seen, last_total) = tracking_callback();
    let outcome = downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap();

    assert_eq!(outcome.mode, TransferMode::Chunked { chunks: 8 });
    assert_eq!(outcome.bytes_written, body.len() as u64);
    assert_eq!(outcome.content_length, Some(body.len() as u64));
    assert_eq!(fs::read(&dest).unwrap(), body.as_ref());
    assert_eq!(max_seen.load(Ordering::SeqCst), body.len() as u64);
    assert_eq!(last_total.load(Ordering::SeqCst), body.len() as u64);

    let stats = server.stats("/video.mp4");
    assert_eq!(stats.heads, 1);
    // One bytes=0-0 probe plus one request per chunk.
    assert_eq!(stats.range_gets, 9);
}

#[test]
fn test_metadata_size_skips_head_request() {
    let server = FixtureServer::start();
    let body = pattern(2 * MIB);
    let url = server.add("/known.mp4", Resource::new(body.clone()));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("known.mp4");

    let (callback, _, _) = tracking_callback();
    downloader(&test_config())
        .download(
            &StreamDescriptor::new(&url, Some(body.len() as u64), &dest),
            callback,
        )
        .unwrap();

    assert_eq!(server.stats("/known.mp4").heads, 0);
    assert_eq!(fs::metadata(&dest).unwrap().len(), body.len() as u64);
}

#[test]
fn test_server_without_ranges_uses_single_connection() {
    let server = FixtureServer::start();
    let body = pattern(2 * MIB + 7);
    let url = server.add("/plain.mp4", Resource::new(body.clone()).without_ranges());
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("plain.mp4");

    let (callback, max_seen, _) = tracking_callback();
    let outcome = downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap();

    assert_eq!(outcome.mode, TransferMode::Single);
    assert_eq!(fs::read(&dest).unwrap(), body.as_ref());
    assert_eq!(max_seen.load(Ordering::SeqCst), body.len() as u64);
    // The probe is answered 200, then one plain GET follows.
    assert_eq!(server.stats("/plain.mp4").gets, 2);
}

#[test]
fn test_small_resource_is_not_chunked() {
    let server = FixtureServer::start();
    let body = pattern(MIB);
    let url = server.add("/small.m4a", Resource::new(body.clone()));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("small.m4a");

    let (callback, _, _) = tracking_callback();
    let outcome = downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap();

    // Exactly at the threshold: not strictly larger, so no range probe.
    assert_eq!(outcome.mode, TransferMode::Single);
    assert_eq!(server.stats("/small.m4a").range_gets, 0);
    assert_eq!(fs::read(&dest).unwrap(), body.as_ref());
}

#[test]
fn test_unknown_length_reports_bytes_without_total() {
    let server = FixtureServer::start();
    let body = pattern(300_000);
    let url = server.add("/nohead.mp4", Resource::new(body.clone()).without_head());
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nohead.mp4");

    let (callback, max_seen, last_total) = tracking_callback();
    let outcome = downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap();

    assert_eq!(outcome.mode, TransferMode::Single);
    assert_eq!(outcome.content_length, None);
    assert_eq!(max_seen.load(Ordering::SeqCst), body.len() as u64);
    // The response's own Content-Length is the only total available.
    assert_eq!(last_total.load(Ordering::SeqCst), body.len() as u64);
}

#[test]
fn test_chunk_failure_is_tagged_with_index() {
    let server = FixtureServer::start();
    let body = pattern(4 * MIB);
    let url = server.add("/broken.mp4", Resource::new(body).failing_from(0.8));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("broken.mp4");

    let (callback, _, _) = tracking_callback();
    let err = downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap_err();

    match err {
        DownloadError::Chunk { index, source } => {
            assert_eq!(index, 7);
            assert!(matches!(*source, DownloadError::Status { status: 500, .. }));
        }
        other => panic!("expected chunk error, got {other}"),
    }
}

#[test]
fn test_single_connection_status_failure() {
    let server = FixtureServer::start();
    let url = server.add(
        "/down.mp4",
        Resource::new(pattern(1000)).without_head().always_failing(),
    );
    let dir = tempfile::tempdir().unwrap();

    let (callback, _, _) = tracking_callback();
    let err = downloader(&test_config())
        .download(
            &StreamDescriptor::new(&url, None, dir.path().join("down.mp4")),
            callback,
        )
        .unwrap_err();

    assert!(matches!(err, DownloadError::Status { status: 500, .. }));
}

#[test]
fn test_missing_parent_directories_are_created() {
    let server = FixtureServer::start();
    let body = pattern(10_000);
    let url = server.add("/tiny.bin", Resource::new(body.clone()));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("a").join("b").join("tiny.bin");

    let (callback, _, _) = tracking_callback();
    downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap();

    assert_eq!(fs::read(&dest).unwrap(), body.as_ref());
}

#[test]
fn test_chunks_answered_with_full_body_are_skipped_into_place() {
    let server = FixtureServer::start();
    let body = pattern(3 * MIB + 4_321);
    let url = server.add(
        "/norange.mp4",
        Resource::new(body.clone()).with_first_byte_range_only(),
    );
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("norange.mp4");

    let (callback, max_seen, _) = tracking_callback();
    let outcome = downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap();

    assert_eq!(outcome.mode, TransferMode::Chunked { chunks: 8 });
    assert_eq!(outcome.bytes_written, body.len() as u64);
    assert_eq!(fs::read(&dest).unwrap(), body.as_ref());
    assert_eq!(max_seen.load(Ordering::SeqCst), body.len() as u64);
}

#[test]
fn test_full_body_shorter_than_chunk_start_reports_skipped_bytes() {
    let server = FixtureServer::start();
    let body = pattern(4 * MIB);
    let cut = 1000;
    let url = server.add(
        "/cut.mp4",
        Resource::new(body).with_short_full_body(cut),
    );
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("cut.mp4");

    let (callback, _, _) = tracking_callback();
    let err = downloader(&test_config())
        .download(&StreamDescriptor::new(&url, None, &dest), callback)
        .unwrap_err();

    // Every chunk after the first starts past the cut, so whichever fails
    // first ran out of body while skipping to its start.
    let chunk_len = (4 * MIB / 8) as u64;
    match err {
        DownloadError::Chunk { index, source } => match *source {
            DownloadError::Truncated { expected, received } => {
                assert!(index > 0);
                assert_eq!(expected, index as u64 * chunk_len);
                assert_eq!(received, cut as u64);
            }
            other => panic!("expected truncated body, got {other}"),
        },
        other => panic!("expected chunk error, got {other}"),
    }
}
