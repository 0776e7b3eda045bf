//! Sample tables of fragmented MP4 files.
//!
//! Fragmented inputs (`moov` with `mvex`, followed by `moof`/`mdat` pairs)
//! carry no samples in `stbl`; each movie fragment holds its own run
//! tables. The `mp4` crate resolves those runs against the wrong base
//! offset and synthesizes timestamps, so they are walked here instead:
//!
//! ```text
//! moof ─┬─ traf ─┬─ tfhd   track id, base offset, per-fragment defaults
//!       │        ├─ tfdt   decode time of the first sample
//!       │        └─ trun*  per-sample size, duration, flags, cts
//!       └─ traf ...
//! ```
//!
//! Every sample is resolved to an absolute file offset, a decode time, a
//! composition offset and a sync flag.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

use mp4::Error::InvalidData;

const HEADER_LEN: u64 = 8;
const LARGE_HEADER_LEN: u64 = 16;

const TFHD_BASE_DATA_OFFSET: u32 = 0x00_0001;
const TFHD_SAMPLE_DESCRIPTION_INDEX: u32 = 0x00_0002;
const TFHD_DEFAULT_DURATION: u32 = 0x00_0008;
const TFHD_DEFAULT_SIZE: u32 = 0x00_0010;
const TFHD_DEFAULT_FLAGS: u32 = 0x00_0020;
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

const TRUN_DATA_OFFSET: u32 = 0x00_0001;
const TRUN_FIRST_SAMPLE_FLAGS: u32 = 0x00_0004;
const TRUN_DURATION: u32 = 0x00_0100;
const TRUN_SIZE: u32 = 0x00_0200;
const TRUN_FLAGS: u32 = 0x00_0400;
const TRUN_CTS: u32 = 0x00_0800;

/// `sample_is_non_sync_sample` bit of the sample flags word.
const SAMPLE_IS_NON_SYNC: u32 = 0x0001_0000;

/// One sample of a fragmented track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FragmentSample {
    /// Absolute file offset of the sample data.
    pub offset: u64,
    pub size: u32,
    /// Decode time in track timescale units.
    pub decode_time: u64,
    pub duration: u32,
    pub composition_offset: i32,
    pub is_sync: bool,
}

/// Per-track defaults from `trex`, overridden per fragment by `tfhd`.
#[derive(Debug, Clone, Copy, Default)]
struct SampleDefaults {
    duration: u32,
    size: u32,
    flags: u32,
}

/// Samples of every fragmented track, keyed by container track id.
pub(crate) type FragmentTables = HashMap<u32, Vec<FragmentSample>>;

/// Walk the top-level boxes of a file of `file_size` bytes and collect the
/// samples of every movie fragment.
///
/// Returns an empty map for files without `moof` boxes.
pub(crate) fn read_fragments<R: Read + Seek>(
    reader: &mut R,
    file_size: u64,
) -> mp4::Result<FragmentTables> {
    let mut moov = None;
    let mut moofs = Vec::new();
    let mut pos = 0;

    while pos + HEADER_LEN <= file_size {
        reader.seek(SeekFrom::Start(pos))?;
        let mut head = [0u8; 8];
        reader.read_exact(&mut head)?;
        let kind = [head[4], head[5], head[6], head[7]];
        let (size, header_len) = match u32::from_be_bytes([head[0], head[1], head[2], head[3]]) {
            0 => (file_size - pos, HEADER_LEN),
            1 => {
                let mut large = [0u8; 8];
                reader.read_exact(&mut large)?;
                (u64::from_be_bytes(large), LARGE_HEADER_LEN)
            }
            n => (u64::from(n), HEADER_LEN),
        };
        if size < header_len || size > file_size - pos {
            return Err(InvalidData("box extends past end of file"));
        }

        match &kind {
            b"moov" => moov = Some((pos + header_len, size - header_len)),
            b"moof" => moofs.push((pos, read_payload(reader, pos + header_len, size - header_len)?)),
            _ => {}
        }
        pos += size;
    }

    let mut tables = FragmentTables::new();
    if moofs.is_empty() {
        return Ok(tables);
    }

    let defaults = match moov {
        Some((start, len)) => read_trex(&read_payload(reader, start, len)?)?,
        None => return Err(InvalidData("movie fragments without a moov box")),
    };

    let mut clocks: HashMap<u32, u64> = HashMap::new();
    for (moof_start, payload) in &moofs {
        let mut data_end = *moof_start;
        let mut first = true;
        for child in Children::new(payload) {
            let (kind, traf) = child?;
            if &kind != b"traf" {
                continue;
            }
            let context = TrafContext {
                moof_start: *moof_start,
                first_in_moof: first,
                previous_data_end: data_end,
                file_size,
            };
            data_end = read_traf(traf, &context, &defaults, &mut clocks, &mut tables)?;
            first = false;
        }
    }
    Ok(tables)
}

fn read_payload<R: Read + Seek>(reader: &mut R, start: u64, len: u64) -> mp4::Result<Vec<u8>> {
    let len = usize::try_from(len).map_err(|_| InvalidData("box too large"))?;
    reader.seek(SeekFrom::Start(start))?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// `trex` defaults of every track in `moov/mvex`.
fn read_trex(moov: &[u8]) -> mp4::Result<HashMap<u32, SampleDefaults>> {
    let mut defaults = HashMap::new();
    for child in Children::new(moov) {
        let (kind, mvex) = child?;
        if &kind != b"mvex" {
            continue;
        }
        for entry in Children::new(mvex) {
            let (kind, trex) = entry?;
            if &kind != b"trex" {
                continue;
            }
            let mut fields = Fields::new(trex);
            fields.u32()?;
            let track_id = fields.u32()?;
            fields.u32()?;
            defaults.insert(
                track_id,
                SampleDefaults {
                    duration: fields.u32()?,
                    size: fields.u32()?,
                    flags: fields.u32()?,
                },
            );
        }
    }
    Ok(defaults)
}

/// Where a `traf` sits, for resolving its base data offset.
struct TrafContext {
    moof_start: u64,
    first_in_moof: bool,
    previous_data_end: u64,
    file_size: u64,
}

/// Append the samples of one `traf` and return the end of its data.
fn read_traf(
    traf: &[u8],
    context: &TrafContext,
    defaults: &HashMap<u32, SampleDefaults>,
    clocks: &mut HashMap<u32, u64>,
    tables: &mut FragmentTables,
) -> mp4::Result<u64> {
    let mut tfhd = None;
    let mut tfdt = None;
    let mut truns = Vec::new();
    for child in Children::new(traf) {
        let (kind, payload) = child?;
        match &kind {
            b"tfhd" => tfhd = Some(payload),
            b"tfdt" => tfdt = Some(payload),
            b"trun" => truns.push(payload),
            _ => {}
        }
    }
    let tfhd = tfhd.ok_or(InvalidData("traf without tfhd"))?;

    let mut fields = Fields::new(tfhd);
    let flags = fields.u32()? & 0x00FF_FFFF;
    let track_id = fields.u32()?;
    let base_data_offset = if flags & TFHD_BASE_DATA_OFFSET != 0 {
        Some(fields.u64()?)
    } else {
        None
    };
    if flags & TFHD_SAMPLE_DESCRIPTION_INDEX != 0 {
        fields.u32()?;
    }
    let mut track_defaults = defaults.get(&track_id).copied().unwrap_or_default();
    if flags & TFHD_DEFAULT_DURATION != 0 {
        track_defaults.duration = fields.u32()?;
    }
    if flags & TFHD_DEFAULT_SIZE != 0 {
        track_defaults.size = fields.u32()?;
    }
    if flags & TFHD_DEFAULT_FLAGS != 0 {
        track_defaults.flags = fields.u32()?;
    }

    let base = match base_data_offset {
        Some(offset) => offset,
        None if flags & TFHD_DEFAULT_BASE_IS_MOOF != 0 || context.first_in_moof => {
            context.moof_start
        }
        None => context.previous_data_end,
    };

    let clock = clocks.entry(track_id).or_insert(0);
    if let Some(tfdt) = tfdt {
        let mut fields = Fields::new(tfdt);
        let version = fields.u32()? >> 24;
        *clock = if version == 1 {
            fields.u64()?
        } else {
            u64::from(fields.u32()?)
        };
    }

    let samples = tables.entry(track_id).or_default();
    let mut data_pos = base;
    for trun in truns {
        let mut fields = Fields::new(trun);
        let flags = fields.u32()? & 0x00FF_FFFF;
        let count = fields.u32()?;
        if flags & TRUN_DATA_OFFSET != 0 {
            data_pos = base
                .checked_add_signed(i64::from(fields.i32()?))
                .ok_or(InvalidData("trun data offset before start of file"))?;
        }
        let first_flags = if flags & TRUN_FIRST_SAMPLE_FLAGS != 0 {
            Some(fields.u32()?)
        } else {
            None
        };

        for i in 0..count {
            let duration = if flags & TRUN_DURATION != 0 {
                fields.u32()?
            } else {
                track_defaults.duration
            };
            let size = if flags & TRUN_SIZE != 0 {
                fields.u32()?
            } else {
                track_defaults.size
            };
            let sample_flags = match (flags & TRUN_FLAGS != 0, first_flags) {
                (true, _) => fields.u32()?,
                (false, Some(first)) if i == 0 => first,
                _ => track_defaults.flags,
            };
            let composition_offset = if flags & TRUN_CTS != 0 {
                // Version 0 stores unsigned offsets; both fit in i32 in practice.
                fields.u32()? as i32
            } else {
                0
            };

            if data_pos + u64::from(size) > context.file_size {
                return Err(InvalidData("fragment sample data past end of file"));
            }
            samples.push(FragmentSample {
                offset: data_pos,
                size,
                decode_time: *clock,
                duration,
                composition_offset,
                is_sync: sample_flags & SAMPLE_IS_NON_SYNC == 0,
            });
            data_pos += u64::from(size);
            *clock += u64::from(duration);
        }
    }
    Ok(data_pos)
}

/// Child boxes of a box payload.
struct Children<'a> {
    data: &'a [u8],
}

impl<'a> Children<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = mp4::Result<([u8; 4], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < HEADER_LEN as usize {
            return None;
        }
        let data = self.data;
        let kind = [data[4], data[5], data[6], data[7]];
        let (size, header_len) = match u32::from_be_bytes([data[0], data[1], data[2], data[3]]) {
            0 => (data.len(), HEADER_LEN as usize),
            1 if data.len() >= LARGE_HEADER_LEN as usize => {
                let mut large = [0u8; 8];
                large.copy_from_slice(&data[8..16]);
                match usize::try_from(u64::from_be_bytes(large)) {
                    Ok(size) => (size, LARGE_HEADER_LEN as usize),
                    Err(_) => (usize::MAX, LARGE_HEADER_LEN as usize),
                }
            }
            n => (n as usize, HEADER_LEN as usize),
        };
        if size < header_len || size > data.len() {
            self.data = &[];
            return Some(Err(InvalidData("child box overruns its parent")));
        }
        self.data = &data[size..];
        Some(Ok((kind, &data[header_len..size])))
    }
}

/// Big-endian field reader over a box payload.
struct Fields<'a> {
    data: &'a [u8],
}

impl<'a> Fields<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take<const N: usize>(&mut self) -> mp4::Result<[u8; N]> {
        if self.data.len() < N {
            return Err(InvalidData("truncated fragment box"));
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[..N]);
        self.data = &self.data[N..];
        Ok(bytes)
    }

    fn u32(&mut self) -> mp4::Result<u32> {
        self.take().map(u32::from_be_bytes)
    }

    fn i32(&mut self) -> mp4::Result<i32> {
        self.take().map(i32::from_be_bytes)
    }

    fn u64(&mut self) -> mp4::Result<u64> {
        self.take().map(u64::from_be_bytes)
    }
}
