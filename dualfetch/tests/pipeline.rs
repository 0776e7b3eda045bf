//! Full pipeline runs: manifest over HTTP, dual download, mux, events.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use common::{pattern, read_samples, samples, track_types, write_audio_mp4, write_video_mp4};
use common::{FixtureServer, Resource};
use dualfetch::discovery::ManifestProvider;
use dualfetch::download::{DownloadConfig, HttpClient, DOWNLOAD_PROGRESS_SHARE};
use dualfetch::pipeline::{
    DownloadRequest, Pipeline, ProgressEvent, ProgressSink, STATUS_COMPLETED, STATUS_DOWNLOADING,
    STATUS_MUXING, TEMP_AUDIO_NAME, TEMP_VIDEO_NAME,
};
use mp4::TrackType;
use parking_lot::Mutex;
use serde_json::json;

fn pipeline() -> Pipeline<ManifestProvider> {
    let config = DownloadConfig::default();
    let provider = ManifestProvider::new(HttpClient::new(&config).unwrap());
    Pipeline::new(provider, config)
}

fn recording_sink() -> (Arc<dyn ProgressSink>, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let sink: Arc<dyn ProgressSink> =
        Arc::new(move |event: ProgressEvent| events_clone.lock().push(event));
    (sink, events)
}

fn manifest(server: &FixtureServer, video_url: &str, audio_url: &str) -> String {
    let body = json!({
        "title": "Harbor timelapse",
        "video_streams": [
            {
                "resolution_label": "720p",
                "content_url": video_url,
                "codec": "avc1.64001f",
                "mime_type": "video/mp4",
                "bitrate": 2_500_000,
                "frame_rate": 30
            },
            {
                "resolution_label": "1080p",
                "content_url": server.url("/unused-1080.mp4"),
                "size_bytes": 9_000_000,
                "codec": "avc1.640028",
                "mime_type": "video/mp4",
                "frame_rate": 30
            },
            {
                "resolution_label": "1440p",
                "content_url": server.url("/vp9.webm"),
                "codec": "vp09.00.50.08",
                "mime_type": "video/webm"
            }
        ],
        "audio_streams": [
            {
                "content_url": server.url("/low.m4a"),
                "mime_type": "audio/mp4",
                "bitrate": 48_000
            },
            {
                "content_url": audio_url,
                "mime_type": "audio/mp4",
                "bitrate": 128_000
            }
        ]
    });
    server.add(
        "/manifest.json",
        Resource::new(Bytes::from(body.to_string())),
    )
}

fn request(dir: &Path, page_url: &str) -> DownloadRequest {
    DownloadRequest {
        page_url: page_url.to_string(),
        quality: "720p".to_string(),
        temp_dir: dir.join("tmp"),
        output_path: dir.join("out").join("harbor.mp4"),
    }
}

#[test]
fn test_pipeline_downloads_and_muxes() {
    let dir = tempfile::tempdir().unwrap();
    let video_samples = samples(30, &[512, 1024], 6, 0x56);
    let audio_samples = samples(45, &[1024], 1, 0x41);
    write_video_mp4(&dir.path().join("src_video.mp4"), &video_samples);
    write_audio_mp4(&dir.path().join("src_audio.m4a"), &audio_samples);

    let server = FixtureServer::start();
    let video_url = server.add(
        "/v720.mp4",
        Resource::new(fs::read(dir.path().join("src_video.mp4")).unwrap().into()),
    );
    let audio_url = server.add(
        "/a128.m4a",
        Resource::new(fs::read(dir.path().join("src_audio.m4a")).unwrap().into()),
    );
    let page_url = manifest(&server, &video_url, &audio_url);

    let (sink, events) = recording_sink();
    let req = request(dir.path(), &page_url);
    let summary = pipeline().download(&req, sink).unwrap();

    assert_eq!(summary.title, "Harbor timelapse");
    assert_eq!(summary.output_path, req.output_path);
    assert_eq!(
        track_types(&req.output_path),
        vec![(1, TrackType::Video), (2, TrackType::Audio)]
    );
    assert_eq!(read_samples(&req.output_path, 1), video_samples);
    assert_eq!(read_samples(&req.output_path, 2), audio_samples);

    assert!(!req.temp_dir.join(TEMP_VIDEO_NAME).exists());
    assert!(!req.temp_dir.join(TEMP_AUDIO_NAME).exists());
    // The low-bitrate audio was never requested.
    assert_eq!(server.stats("/low.m4a").gets, 0);

    let events = events.lock();
    let (last, rest) = events.split_last().unwrap();
    let (muxing, downloading) = rest.split_last().unwrap();

    assert!(downloading.iter().all(|e| e.status == STATUS_DOWNLOADING
        && e.fraction <= DOWNLOAD_PROGRESS_SHARE
        && e.output_path.is_none()));
    assert!(downloading.windows(2).all(|w| w[0].fraction <= w[1].fraction));
    assert_eq!(muxing.status, STATUS_MUXING);
    assert!((muxing.fraction - DOWNLOAD_PROGRESS_SHARE).abs() < 1e-9);
    assert_eq!(last.status, STATUS_COMPLETED);
    assert_eq!(last.fraction, 1.0);
    assert_eq!(last.output_path.as_deref(), Some(req.output_path.as_path()));
    assert_eq!(last.title.as_deref(), Some("Harbor timelapse"));
}

#[test]
fn test_audio_failure_reports_download_error_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let server = FixtureServer::start();
    let video_url = server.add("/v720.mp4", Resource::new(pattern(1_500_000)));
    let audio_url = server.add(
        "/a128.m4a",
        Resource::new(pattern(2_000_000)).failing_from(0.4),
    );
    let page_url = manifest(&server, &video_url, &audio_url);

    let (sink, events) = recording_sink();
    let req = request(dir.path(), &page_url);
    let err = pipeline().download(&req, sink).unwrap_err();

    assert_eq!(err.code(), "DOWNLOAD_ERROR");
    assert!(err.to_string().starts_with("Audio download failed"));
    assert!(!req.output_path.exists());
    assert!(!req.temp_dir.join(TEMP_VIDEO_NAME).exists());
    assert!(!req.temp_dir.join(TEMP_AUDIO_NAME).exists());
    assert!(events.lock().iter().all(|e| e.status == STATUS_DOWNLOADING));
}

#[test]
fn test_unparseable_download_fails_mux() {
    let dir = tempfile::tempdir().unwrap();
    let server = FixtureServer::start();
    let video_url = server.add("/v720.mp4", Resource::new(pattern(4096)));
    let audio_url = server.add("/a128.m4a", Resource::new(pattern(4096)));
    let page_url = manifest(&server, &video_url, &audio_url);

    let (sink, events) = recording_sink();
    let req = request(dir.path(), &page_url);
    let err = pipeline().download(&req, sink).unwrap_err();

    assert_eq!(err.code(), "MUX_ERROR");
    assert!(!req.output_path.exists());
    assert!(!req.temp_dir.join(TEMP_VIDEO_NAME).exists());
    let events = events.lock();
    assert_eq!(events.last().unwrap().status, STATUS_MUXING);
    assert!(events.iter().all(|e| e.status != STATUS_COMPLETED));
}

#[test]
fn test_qualities_from_served_manifest() {
    let server = FixtureServer::start();
    let page_url = manifest(&server, &server.url("/v720.mp4"), &server.url("/a.m4a"));

    let qualities = pipeline().qualities(&page_url).unwrap();

    let labels: Vec<&str> = qualities.iter().map(|q| q.quality.as_str()).collect();
    assert_eq!(labels, vec!["1080p", "720p"]);
    assert_eq!(qualities[0].size, 9_000_000);
    assert_eq!(qualities[1].size, 0);
    assert_eq!(qualities[1].fps, 30);
    assert!(qualities.iter().all(|q| q.title == "Harbor timelapse"));
}

#[test]
fn test_unknown_quality_is_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let server = FixtureServer::start();
    let page_url = manifest(&server, &server.url("/v720.mp4"), &server.url("/a.m4a"));

    let (sink, _) = recording_sink();
    let mut req = request(dir.path(), &page_url);
    req.quality = "1440p".to_string();
    let err = pipeline().download(&req, sink).unwrap_err();

    // The VP9 entry exists but is not a compatible candidate.
    assert_eq!(err.code(), "EXTRACTION_ERROR");
    assert_eq!(server.stats("/vp9.webm").gets, 0);
}
