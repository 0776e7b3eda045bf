//! ISO-BMFF (MP4) back end built on the `mp4` crate.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use mp4::{
    AacConfig, AudioObjectType, AvcConfig, ChannelConfig, FourCC, MediaConfig, MediaType,
    Mp4Config, Mp4Reader, Mp4Sample, Mp4Track, Mp4Writer, SampleFreqIndex, TrackConfig,
    TrackType,
};
use tracing::{debug, warn};

use super::error::{MuxError, MuxResult};
use super::fragment::{self, FragmentTables};
use super::sample::{SampleFlags, SampleRecord, TrackFormat, TrackInfo};
use super::traits::{ContainerSink, SampleSource};

/// Movie-level timescale of written files; track timescales are copied
/// from the inputs.
const MOVIE_TIMESCALE: u32 = 1000;

fn brand(code: &[u8; 4]) -> FourCC {
    FourCC { value: *code }
}

/// Reads samples from an MP4 file.
pub struct Mp4SampleSource {
    path: PathBuf,
    reader: Mp4Reader<BufReader<File>>,
    tracks: Vec<TrackInfo>,
    /// Container track ids, parallel to `tracks`.
    track_ids: Vec<u32>,
    selected: Option<usize>,
    /// 1-based id of the next sample to read.
    next_sample: u32,
    /// Sample tables of fragmented tracks, read from `moof` boxes.
    fragments: FragmentTables,
    /// Second handle on the file for reading fragment sample data.
    data: BufReader<File>,
}

impl std::fmt::Debug for Mp4SampleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4SampleSource")
            .field("path", &self.path)
            .field("tracks", &self.tracks)
            .field("selected", &self.selected)
            .finish()
    }
}

impl Mp4SampleSource {
    /// Open `path` and parse its track table.
    pub fn open(path: &Path) -> MuxResult<Self> {
        let open_error = |source: mp4::Error| MuxError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|e| MuxError::io(path, e))?;
        let size = file.metadata().map_err(|e| MuxError::io(path, e))?.len();
        let reader = Mp4Reader::read_header(BufReader::new(file), size).map_err(open_error)?;

        let mut data = BufReader::new(File::open(path).map_err(|e| MuxError::io(path, e))?);
        let fragments = fragment::read_fragments(&mut data, size).map_err(open_error)?;

        let mut track_ids: Vec<u32> = reader.tracks().keys().copied().collect();
        track_ids.sort_unstable();

        let mut tracks = Vec::with_capacity(track_ids.len());
        for (index, id) in track_ids.iter().enumerate() {
            let Some(track) = reader.tracks().get(id) else {
                continue;
            };
            let fragmented = fragments.get(id);
            check_sample_tables(track, fragmented.is_some()).map_err(open_error)?;
            let mut info = describe(index, track);
            if let Some(samples) = fragmented {
                info.sample_count = samples.len() as u32;
            }
            tracks.push(info);
        }

        debug!(
            path = %path.display(),
            tracks = tracks.len(),
            fragmented = !fragments.is_empty(),
            "Opened sample source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            tracks,
            track_ids,
            selected: None,
            next_sample: 1,
            fragments,
            data,
        })
    }

    fn selected_id(&self) -> MuxResult<(usize, u32)> {
        let index = self
            .selected
            .ok_or(MuxError::InvalidState("no track selected"))?;
        Ok((index, self.track_ids[index]))
    }

    /// Read the next sample of a fragmented track from its run tables.
    fn read_fragment_sample(
        &mut self,
        index: usize,
        id: u32,
        buffer: &mut Vec<u8>,
    ) -> MuxResult<Option<SampleRecord>> {
        let Some(sample) = self
            .fragments
            .get(&id)
            .and_then(|samples| samples.get(self.next_sample as usize - 1))
            .copied()
        else {
            return Ok(None);
        };

        buffer.clear();
        buffer.resize(sample.size as usize, 0);
        self.data
            .seek(SeekFrom::Start(sample.offset))
            .and_then(|_| self.data.read_exact(buffer))
            .map_err(|e| MuxError::io(&self.path, e))?;
        self.next_sample += 1;

        Ok(Some(SampleRecord {
            track_index: index,
            offset: 0,
            size: buffer.len(),
            timestamp: sample.decode_time,
            duration: sample.duration,
            rendering_offset: sample.composition_offset,
            flags: sync_flags(sample.is_sync),
        }))
    }
}

fn sync_flags(is_sync: bool) -> SampleFlags {
    if is_sync {
        SampleFlags::SYNC
    } else {
        SampleFlags::default()
    }
}

/// Reject sample tables the `mp4` reader would panic on.
///
/// Timing (`stts`) and composition (`ctts`) runs must cover exactly the
/// samples sized by `stsz`. Fragmented tracks must keep `stbl` empty.
fn check_sample_tables(track: &Mp4Track, fragmented: bool) -> mp4::Result<()> {
    let stbl = &track.trak.mdia.minf.stbl;
    let count = u64::from(stbl.stsz.sample_count);
    if fragmented {
        if count > 0 {
            return Err(mp4::Error::InvalidData(
                "track has samples in both moov and movie fragments",
            ));
        }
        return Ok(());
    }

    let timed: u64 = stbl
        .stts
        .entries
        .iter()
        .map(|e| u64::from(e.sample_count))
        .sum();
    if timed != count {
        return Err(mp4::Error::InvalidData(
            "stts sample count does not match stsz",
        ));
    }
    if let Some(ctts) = &stbl.ctts {
        let offset: u64 = ctts.entries.iter().map(|e| u64::from(e.sample_count)).sum();
        if offset != count {
            return Err(mp4::Error::InvalidData(
                "ctts sample count does not match stsz",
            ));
        }
    }
    Ok(())
}

/// Translate a container track into a [`TrackInfo`].
fn describe(index: usize, track: &Mp4Track) -> TrackInfo {
    let (mime, format) = match track.media_type() {
        Ok(MediaType::H264) => (
            "video/avc".to_string(),
            TrackFormat::Avc {
                width: track.width(),
                height: track.height(),
                sps: track
                    .sequence_parameter_set()
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default(),
                pps: track
                    .picture_parameter_set()
                    .map(<[u8]>::to_vec)
                    .unwrap_or_default(),
            },
        ),
        Ok(MediaType::H265) => (
            "video/hevc".to_string(),
            TrackFormat::Hevc {
                width: track.width(),
                height: track.height(),
            },
        ),
        Ok(MediaType::VP9) => (
            "video/x-vnd.on2.vp9".to_string(),
            TrackFormat::Vp9 {
                width: track.width(),
                height: track.height(),
            },
        ),
        Ok(MediaType::AAC) => (
            "audio/mp4a-latm".to_string(),
            TrackFormat::Aac {
                bitrate: track.bitrate(),
                profile: track
                    .audio_profile()
                    .map(|p| p as u8)
                    .unwrap_or(AudioObjectType::AacLowComplexity as u8),
                freq_index: track
                    .sample_freq_index()
                    .map(|f| f as u8)
                    .unwrap_or(SampleFreqIndex::Freq44100 as u8),
                channels: track
                    .channel_config()
                    .map(|c| c as u8)
                    .unwrap_or(ChannelConfig::Stereo as u8),
            },
        ),
        Ok(other) => {
            let name = format!("{:?}", other).to_lowercase();
            (format!("text/x-{}", name), TrackFormat::Other(name))
        }
        Err(_) => {
            let prefix = match track.track_type() {
                Ok(TrackType::Video) => "video",
                Ok(TrackType::Audio) => "audio",
                _ => "application",
            };
            let fourcc = track
                .box_type()
                .map(|b| b.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            (
                format!("{}/x-{}", prefix, fourcc.trim()),
                TrackFormat::Other(fourcc),
            )
        }
    };

    TrackInfo {
        index,
        mime,
        timescale: track.timescale(),
        sample_count: track.sample_count(),
        format,
    }
}

impl SampleSource for Mp4SampleSource {
    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    fn select_track(&mut self, index: usize) -> MuxResult<()> {
        if index >= self.tracks.len() {
            return Err(MuxError::InvalidState("track index out of range"));
        }
        self.selected = Some(index);
        self.next_sample = 1;
        Ok(())
    }

    fn seek_to_start(&mut self) -> MuxResult<()> {
        let (_, id) = self.selected_id()?;
        let first_sync = match self.fragments.get(&id) {
            Some(samples) => samples
                .iter()
                .position(|s| s.is_sync)
                .map_or(1, |i| i as u32 + 1),
            None => self
                .reader
                .tracks()
                .get(&id)
                .and_then(|t| t.trak.mdia.minf.stbl.stss.as_ref())
                .and_then(|stss| stss.entries.first().copied())
                .unwrap_or(1),
        };
        if first_sync > 1 {
            warn!(
                path = %self.path.display(),
                skipped = first_sync - 1,
                "Track does not start on a sync sample"
            );
        }
        self.next_sample = first_sync;
        Ok(())
    }

    fn read_sample(&mut self, buffer: &mut Vec<u8>) -> MuxResult<Option<SampleRecord>> {
        let (index, id) = self.selected_id()?;
        if self.next_sample > self.tracks[index].sample_count {
            return Ok(None);
        }

        if self.fragments.contains_key(&id) {
            return self.read_fragment_sample(index, id, buffer);
        }

        let next = self.next_sample;
        let reader = &mut self.reader;
        let sample = panic::catch_unwind(AssertUnwindSafe(|| reader.read_sample(id, next)))
            .unwrap_or(Err(mp4::Error::InvalidData("sample tables are inconsistent")))
            .map_err(MuxError::container("read sample"))?;
        let Some(sample) = sample else {
            return Ok(None);
        };
        self.next_sample += 1;

        buffer.clear();
        buffer.extend_from_slice(&sample.bytes);

        Ok(Some(SampleRecord {
            track_index: index,
            offset: 0,
            size: buffer.len(),
            timestamp: sample.start_time,
            duration: sample.duration,
            rendering_offset: sample.rendering_offset,
            flags: sync_flags(sample.is_sync),
        }))
    }
}

/// Sample held back until the next one reveals its exact duration.
struct PendingSample {
    record: SampleRecord,
    bytes: Bytes,
}

/// Writes an MP4 file.
///
/// The underlying writer stores durations rather than timestamps, so every
/// sample is held until its successor arrives and written with
/// `duration = next.timestamp - timestamp`. This keeps each decode
/// timestamp identical to the source's. The last sample of a track keeps
/// its own duration.
pub struct Mp4ContainerSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    writer: Option<Mp4Writer<BufWriter<File>>>,
    tracks: Vec<TrackConfig>,
    pending: Vec<Option<PendingSample>>,
    finished: bool,
}

impl std::fmt::Debug for Mp4ContainerSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4ContainerSink")
            .field("path", &self.path)
            .field("tracks", &self.tracks.len())
            .field("started", &self.writer.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}

impl Mp4ContainerSink {
    /// Create (or truncate) the output file.
    pub fn create(path: &Path) -> MuxResult<Self> {
        let file = File::create(path).map_err(|e| MuxError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(BufWriter::new(file)),
            writer: None,
            tracks: Vec::new(),
            pending: Vec::new(),
            finished: false,
        })
    }

    fn write_now(&mut self, track: usize, pending: PendingSample, duration: u32) -> MuxResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or(MuxError::InvalidState("container not started"))?;
        let sample = Mp4Sample {
            start_time: pending.record.timestamp,
            duration,
            rendering_offset: pending.record.rendering_offset,
            is_sync: pending.record.flags.is_sync(),
            bytes: pending.bytes,
        };
        writer
            .write_sample(track as u32 + 1, &sample)
            .map_err(MuxError::container("write sample"))
    }
}

fn track_config(track: &TrackInfo) -> MuxResult<TrackConfig> {
    let (track_type, media_conf) = match &track.format {
        TrackFormat::Avc {
            width,
            height,
            sps,
            pps,
        } => (
            TrackType::Video,
            MediaConfig::AvcConfig(AvcConfig {
                width: *width,
                height: *height,
                seq_param_set: sps.clone(),
                pic_param_set: pps.clone(),
            }),
        ),
        // The writer emits empty hvcC/vpcC boxes, so the decoder
        // configuration of these formats cannot be carried over.
        TrackFormat::Hevc { .. } => {
            return Err(MuxError::UnsupportedTrack(
                "hevc (decoder configuration not preserved)".to_string(),
            ))
        }
        TrackFormat::Vp9 { .. } => {
            return Err(MuxError::UnsupportedTrack(
                "vp9 (decoder configuration not preserved)".to_string(),
            ))
        }
        TrackFormat::Aac {
            bitrate,
            profile,
            freq_index,
            channels,
        } => {
            let unsupported = |what: &str, code: u8| {
                MuxError::UnsupportedTrack(format!("AAC {} code {}", what, code))
            };
            (
                TrackType::Audio,
                MediaConfig::AacConfig(AacConfig {
                    bitrate: *bitrate,
                    profile: AudioObjectType::try_from(*profile)
                        .map_err(|_| unsupported("profile", *profile))?,
                    freq_index: SampleFreqIndex::try_from(*freq_index)
                        .map_err(|_| unsupported("frequency index", *freq_index))?,
                    chan_conf: ChannelConfig::try_from(*channels)
                        .map_err(|_| unsupported("channel configuration", *channels))?,
                }),
            )
        }
        TrackFormat::Other(name) => return Err(MuxError::UnsupportedTrack(name.clone())),
    };

    Ok(TrackConfig {
        track_type,
        timescale: track.timescale,
        language: "und".to_string(),
        media_conf,
    })
}

impl ContainerSink for Mp4ContainerSink {
    fn add_track(&mut self, track: &TrackInfo) -> MuxResult<usize> {
        if self.writer.is_some() || self.finished {
            return Err(MuxError::InvalidState("cannot add tracks after start"));
        }
        self.tracks.push(track_config(track)?);
        self.pending.push(None);
        Ok(self.tracks.len() - 1)
    }

    fn start(&mut self) -> MuxResult<()> {
        let file = self
            .file
            .take()
            .ok_or(MuxError::InvalidState("container already started"))?;
        let config = Mp4Config {
            major_brand: brand(b"isom"),
            minor_version: 512,
            compatible_brands: vec![brand(b"isom"), brand(b"iso2"), brand(b"avc1"), brand(b"mp41")],
            timescale: MOVIE_TIMESCALE,
        };
        let mut writer =
            Mp4Writer::write_start(file, &config).map_err(MuxError::container("start"))?;
        for track in &self.tracks {
            writer
                .add_track(track)
                .map_err(MuxError::container("add track"))?;
        }
        self.writer = Some(writer);
        Ok(())
    }

    fn write_sample(
        &mut self,
        track: usize,
        data: &[u8],
        sample: &SampleRecord,
    ) -> MuxResult<()> {
        if self.writer.is_none() {
            return Err(MuxError::InvalidState("container not started"));
        }
        let slot = self
            .pending
            .get_mut(track)
            .ok_or(MuxError::InvalidState("unknown output track"))?;

        let next = PendingSample {
            record: *sample,
            bytes: Bytes::copy_from_slice(data),
        };

        match slot.replace(next) {
            None => {
                if sample.timestamp != 0 {
                    warn!(
                        path = %self.path.display(),
                        track,
                        first_timestamp = sample.timestamp,
                        "Track timeline does not start at zero"
                    );
                }
                Ok(())
            }
            Some(previous) => {
                let delta = sample.timestamp.checked_sub(previous.record.timestamp);
                let duration = match delta.and_then(|d| u32::try_from(d).ok()) {
                    Some(d) if d > 0 => d,
                    _ => {
                        warn!(
                            track,
                            previous = previous.record.timestamp,
                            current = sample.timestamp,
                            "Non-increasing timestamps, keeping stored duration"
                        );
                        previous.record.duration
                    }
                };
                self.write_now(track, previous, duration)
            }
        }
    }

    fn stop(&mut self) -> MuxResult<()> {
        if self.writer.is_none() {
            return Err(MuxError::InvalidState("container not started"));
        }

        for track in 0..self.pending.len() {
            if let Some(last) = self.pending[track].take() {
                let duration = last.record.duration;
                self.write_now(track, last, duration)?;
            }
        }

        let mut writer = self
            .writer
            .take()
            .ok_or(MuxError::InvalidState("container not started"))?;
        writer
            .write_end()
            .map_err(MuxError::container("finalize"))?;
        writer
            .into_writer()
            .flush()
            .map_err(|e| MuxError::io(&self.path, e))?;
        self.finished = true;
        Ok(())
    }
}
