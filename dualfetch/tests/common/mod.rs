//! Shared fixtures for integration tests: a local HTTP server with range
//! support and failure injection, and MP4 file builders.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use mp4::{
    AacConfig, AudioObjectType, AvcConfig, ChannelConfig, FourCC, MediaConfig, Mp4Config,
    Mp4Reader, Mp4Sample, Mp4Writer, SampleFreqIndex, TrackConfig, TrackType,
};
use parking_lot::Mutex;

/// Deterministic body of `len` bytes.
pub fn pattern(len: usize) -> Bytes {
    (0..len)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 9)) as u8)
        .collect::<Vec<u8>>()
        .into()
}

/// A resource served by [`FixtureServer`].
#[derive(Clone)]
pub struct Resource {
    pub body: Bytes,
    /// Answer `Range` requests with 206; otherwise always send the full body.
    pub ranges: bool,
    /// Answer HEAD with `Content-Length`; otherwise HEAD gets 405.
    pub head_length: bool,
    /// Range requests starting at or after this offset get HTTP 500.
    pub fail_from: Option<u64>,
    /// Every GET gets HTTP 500.
    pub always_fail: bool,
    /// Answer only `bytes=0-0` with 206; any other range gets 200 and the
    /// full body, like servers that honor ranges on the first request only.
    pub first_byte_range_only: bool,
    /// Answer ranges not starting at zero with 200 and only this many
    /// leading bytes of the body.
    pub short_full_body: Option<usize>,
}

impl Resource {
    pub fn new(body: Bytes) -> Self {
        Self {
            body,
            ranges: true,
            head_length: true,
            fail_from: None,
            always_fail: false,
            first_byte_range_only: false,
            short_full_body: None,
        }
    }

    pub fn with_first_byte_range_only(mut self) -> Self {
        self.first_byte_range_only = true;
        self
    }

    /// Ignore chunk ranges and send a 200 body cut to `len` bytes.
    pub fn with_short_full_body(mut self, len: usize) -> Self {
        self.first_byte_range_only = true;
        self.short_full_body = Some(len);
        self
    }

    pub fn without_ranges(mut self) -> Self {
        self.ranges = false;
        self
    }

    pub fn without_head(mut self) -> Self {
        self.head_length = false;
        self
    }

    /// Fail range requests starting at or beyond `fraction` of the body.
    pub fn failing_from(mut self, fraction: f64) -> Self {
        self.fail_from = Some((self.body.len() as f64 * fraction) as u64);
        self
    }

    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }
}

/// Per-path request counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestStats {
    pub heads: usize,
    pub gets: usize,
    /// GETs carrying a `Range` header, including the `bytes=0-0` probe.
    pub range_gets: usize,
    pub failures: usize,
}

#[derive(Default)]
struct ServerState {
    resources: Mutex<HashMap<String, Resource>>,
    stats: Mutex<HashMap<String, RequestStats>>,
}

/// HTTP server on 127.0.0.1 running on its own runtime thread.
pub struct FixtureServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl FixtureServer {
    pub fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let router = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind fixture server");
        listener
            .set_nonblocking(true)
            .expect("set_nonblocking fixture server");
        let addr = listener.local_addr().expect("fixture server addr");

        thread::Builder::new()
            .name("fixture-http".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(4)
                    .enable_all()
                    .build()
                    .expect("fixture runtime");
                runtime.block_on(async move {
                    let listener =
                        tokio::net::TcpListener::from_std(listener).expect("tokio listener");
                    axum::serve(listener, router)
                        .await
                        .expect("serve fixture server");
                });
            })
            .expect("spawn fixture server");

        Self { addr, state }
    }

    /// Register `resource` at `path` and return its URL.
    pub fn add(&self, path: &str, resource: Resource) -> String {
        self.state
            .resources
            .lock()
            .insert(path.to_string(), resource);
        self.url(path)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn stats(&self, path: &str) -> RequestStats {
        self.state
            .stats
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }
}

fn parse_range(headers: &HeaderMap) -> Option<(u64, Option<u64>)> {
    let value = headers.get(header::RANGE)?.to_str().ok()?;
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some((start, end))
}

fn status(code: StatusCode) -> Response {
    Response::builder()
        .status(code)
        .body(Body::empty())
        .expect("static response")
}

async fn handle(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = uri.path().to_string();
    let Some(resource) = state.resources.lock().get(&path).cloned() else {
        return status(StatusCode::NOT_FOUND);
    };
    let range = parse_range(&headers);
    let len = resource.body.len() as u64;

    let mut stats = state.stats.lock();
    let entry = stats.entry(path).or_default();

    if method == Method::HEAD {
        entry.heads += 1;
        if !resource.head_length {
            return status(StatusCode::METHOD_NOT_ALLOWED);
        }
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, len)
            .header(header::ACCEPT_RANGES, "bytes")
            .body(Body::empty())
            .expect("head response");
    }

    entry.gets += 1;
    if range.is_some() {
        entry.range_gets += 1;
    }

    if resource.always_fail {
        entry.failures += 1;
        return status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let honored = range.filter(|&(start, end)| {
        resource.ranges && (!resource.first_byte_range_only || (start == 0 && end == Some(0)))
    });
    if honored.is_none() && range.is_some_and(|(start, _)| start > 0) {
        if let Some(cut) = resource.short_full_body {
            let body = resource.body.slice(..cut.min(resource.body.len()));
            return Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_LENGTH, body.len())
                .body(Body::from(body))
                .expect("short response");
        }
    }

    match honored {
        Some((start, end)) => {
            if resource.fail_from.is_some_and(|from| start >= from) {
                entry.failures += 1;
                return status(StatusCode::INTERNAL_SERVER_ERROR);
            }
            if start >= len {
                return status(StatusCode::RANGE_NOT_SATISFIABLE);
            }
            let end = end.unwrap_or(len - 1).min(len - 1);
            let slice = resource.body.slice(start as usize..=end as usize);
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, len))
                .header(header::CONTENT_LENGTH, slice.len())
                .body(Body::from(slice))
                .expect("range response")
        }
        None => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, len)
            .body(Body::from(resource.body.clone()))
            .expect("full response"),
    }
}

/// One sample of a fixture track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureSample {
    pub start_time: u64,
    pub duration: u32,
    /// Composition offset (ctts) in track timescale units.
    pub rendering_offset: i32,
    pub is_sync: bool,
    pub bytes: Vec<u8>,
}

/// Build `count` samples with the given durations cycled, payloads tagged
/// with `tag`, and a sync sample every `gop` samples.
pub fn samples(count: usize, durations: &[u32], gop: usize, tag: u8) -> Vec<FixtureSample> {
    let mut start_time = 0;
    (0..count)
        .map(|i| {
            let duration = durations[i % durations.len()];
            let sample = FixtureSample {
                start_time,
                duration,
                rendering_offset: 0,
                is_sync: i % gop == 0,
                bytes: vec![tag, i as u8, (i >> 8) as u8, 0xAB, 0xCD][..3 + i % 3].to_vec(),
            };
            start_time += duration as u64;
            sample
        })
        .collect()
}

fn write_track(path: &Path, track: TrackConfig, samples: &[FixtureSample]) {
    let file = BufWriter::new(File::create(path).expect("create fixture"));
    let config = Mp4Config {
        major_brand: FourCC { value: *b"isom" },
        minor_version: 512,
        compatible_brands: vec![FourCC { value: *b"isom" }, FourCC { value: *b"mp41" }],
        timescale: 1000,
    };
    let mut writer = Mp4Writer::write_start(file, &config).expect("write_start");
    writer.add_track(&track).expect("add_track");
    for sample in samples {
        writer
            .write_sample(
                1,
                &Mp4Sample {
                    start_time: sample.start_time,
                    duration: sample.duration,
                    rendering_offset: sample.rendering_offset,
                    is_sync: sample.is_sync,
                    bytes: Bytes::copy_from_slice(&sample.bytes),
                },
            )
            .expect("write_sample");
    }
    writer.write_end().expect("write_end");
}

/// Write a single-track H.264 MP4.
pub fn write_video_mp4(path: &Path, samples: &[FixtureSample]) {
    let track = TrackConfig {
        track_type: TrackType::Video,
        timescale: 15_360,
        language: "und".to_string(),
        media_conf: MediaConfig::AvcConfig(AvcConfig {
            width: 320,
            height: 240,
            seq_param_set: vec![0x67, 0x64, 0x00, 0x0D, 0xAC, 0xD9],
            pic_param_set: vec![0x68, 0xEB, 0xE3, 0xCB],
        }),
    };
    write_track(path, track, samples);
}

/// Write a single-track AAC MP4.
pub fn write_audio_mp4(path: &Path, samples: &[FixtureSample]) {
    let track = TrackConfig {
        track_type: TrackType::Audio,
        timescale: 48_000,
        language: "und".to_string(),
        media_conf: MediaConfig::AacConfig(AacConfig {
            bitrate: 128_000,
            profile: AudioObjectType::AacLowComplexity,
            freq_index: SampleFreqIndex::Freq48000,
            chan_conf: ChannelConfig::Stereo,
        }),
    };
    write_track(path, track, samples);
}

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

fn full_box(kind: &[u8; 4], version: u8, flags: u32, fields: &[u8]) -> Vec<u8> {
    let mut payload = ((u32::from(version) << 24) | flags).to_be_bytes().to_vec();
    payload.extend_from_slice(fields);
    mp4_box(kind, &payload)
}

fn words(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Top-level boxes of `file` as (type, whole box) pairs.
fn top_level_boxes(file: &[u8]) -> Vec<([u8; 4], &[u8])> {
    let mut boxes = Vec::new();
    let mut rest = file;
    while rest.len() >= 8 {
        let size = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let kind = [rest[4], rest[5], rest[6], rest[7]];
        boxes.push((kind, &rest[..size]));
        rest = &rest[size..];
    }
    boxes
}

fn moof(sequence: u32, samples: &[FixtureSample], data_offset: u32) -> Vec<u8> {
    // default-base-is-moof; trun carries data offset, duration, size,
    // flags and composition offset per sample.
    let tfhd = full_box(b"tfhd", 0, 0x02_0000, &words(&[1]));
    let tfdt = full_box(b"tfdt", 1, 0, &samples[0].start_time.to_be_bytes());
    let mut entries = vec![samples.len() as u32, data_offset];
    for sample in samples {
        let flags = if sample.is_sync {
            0x0200_0000
        } else {
            0x0101_0000
        };
        entries.extend_from_slice(&[
            sample.duration,
            sample.bytes.len() as u32,
            flags,
            sample.rendering_offset as u32,
        ]);
    }
    let trun = full_box(b"trun", 0, 0x0F01, &words(&entries));
    let mfhd = full_box(b"mfhd", 0, 0, &words(&[sequence]));
    let traf = mp4_box(b"traf", &[tfhd, tfdt, trun].concat());
    mp4_box(b"moof", &[mfhd, traf].concat())
}

/// Write a fragmented single-track H.264 MP4: an init segment whose
/// `moov` carries `mvex`, then one `moof`/`mdat` pair per `fragment_len`
/// samples.
pub fn write_fragmented_video_mp4(path: &Path, samples: &[FixtureSample], fragment_len: usize) {
    write_video_mp4(path, &[]);
    let init = std::fs::read(path).expect("read init segment");

    let mut file = Vec::new();
    for (kind, whole) in top_level_boxes(&init) {
        match &kind {
            b"ftyp" => file.extend_from_slice(whole),
            b"moov" => {
                // trex defaults mark samples non-sync; trun flags override.
                let trex = full_box(b"trex", 0, 0, &words(&[1, 1, 0, 0, 0x0001_0000]));
                let mut payload = whole[8..].to_vec();
                payload.extend(mp4_box(b"mvex", &trex));
                file.extend(mp4_box(b"moov", &payload));
            }
            _ => {}
        }
    }

    for (i, fragment) in samples.chunks(fragment_len).enumerate() {
        let sequence = i as u32 + 1;
        let moof_len = moof(sequence, fragment, 0).len() as u32;
        file.extend(moof(sequence, fragment, moof_len + 8));
        let data: Vec<u8> = fragment.iter().flat_map(|s| s.bytes.clone()).collect();
        file.extend(mp4_box(b"mdat", &data));
    }
    std::fs::write(path, file).expect("write fragmented mp4");
}

/// Rewrite the first `stts` entry of `path` to cover only `count` samples.
pub fn set_first_stts_count(path: &Path, count: u32) {
    let mut file = std::fs::read(path).expect("read mp4");
    let at = file
        .windows(4)
        .position(|w| w == b"stts")
        .expect("stts box");
    // Version/flags and the entry count precede the first entry.
    file[at + 12..at + 16].copy_from_slice(&count.to_be_bytes());
    std::fs::write(path, file).expect("write mp4");
}

/// Track ids of `path` with their track types, ordered by id.
pub fn track_types(path: &Path) -> Vec<(u32, TrackType)> {
    let reader = open(path);
    let mut tracks: Vec<(u32, TrackType)> = reader
        .tracks()
        .iter()
        .map(|(id, track)| (*id, track.track_type().expect("track type")))
        .collect();
    tracks.sort_by_key(|(id, _)| *id);
    tracks
}

/// All samples of track `track_id` of `path`.
pub fn read_samples(path: &Path, track_id: u32) -> Vec<FixtureSample> {
    let mut reader = open(path);
    let count = reader.sample_count(track_id).expect("sample count");
    (1..=count)
        .map(|id| {
            let sample = reader
                .read_sample(track_id, id)
                .expect("read sample")
                .expect("sample present");
            FixtureSample {
                start_time: sample.start_time,
                duration: sample.duration,
                rendering_offset: sample.rendering_offset,
                is_sync: sample.is_sync,
                bytes: sample.bytes.to_vec(),
            }
        })
        .collect()
}

fn open(path: &Path) -> Mp4Reader<std::io::BufReader<File>> {
    let file = File::open(path).expect("open mp4");
    let size = file.metadata().expect("metadata").len();
    Mp4Reader::read_header(std::io::BufReader::new(file), size).expect("read_header")
}
