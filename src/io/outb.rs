//! Reader (and fixture writer) for FAST binary output files (`.outb`).
//!
//! # File Format
//!
//! Little endian throughout:
//!
//! ```text
//! i16   file id            1 = packed with time, 2 = packed without time,
//!                          3 = float64 without time, 4 = packed, explicit name length
//! i16   name length        (id 4 only, otherwise 10)
//! i32   channel count      (time excluded)
//! i32   sample count
//! f64×2 time scale/offset  (id 1)  |  first time/increment (others)
//! f32×N column scales      (not id 3)
//! f32×N column offsets     (not id 3)
//! i32   description length, then the description bytes
//! (N+1) channel names, then (N+1) units, each `name length` bytes
//! i32×T packed time        (id 1 only)
//! T×N   data, row major    i16 (packed) or f64 (id 3)
//! ```
//!
//! Packed values decode as `(packed - offset) / scale`. Column 0 of the
//! decoded matrix is always `Time`.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

const DEFAULT_NAME_LEN: usize = 10;
const INT16_MIN: f64 = -32768.0;
const INT16_MAX: f64 = 32767.0;
const INT16_RANGE: f64 = 65535.0;
const INT32_MIN: f64 = -2147483648.0;
const INT32_MAX: f64 = 2147483647.0;
const INT32_RANGE: f64 = 4294967295.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    WithTime = 1,
    WithoutTime = 2,
    NoCompressWithoutTime = 3,
    ChanLenIn = 4,
}

impl FileFormat {
    fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(FileFormat::WithTime),
            2 => Some(FileFormat::WithoutTime),
            3 => Some(FileFormat::NoCompressWithoutTime),
            4 => Some(FileFormat::ChanLenIn),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OutbError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: unknown file format id {id}")]
    UnknownFormat { path: PathBuf, id: i16 },

    #[error("{path}: file ends while reading {what}")]
    Truncated { path: PathBuf, what: &'static str },

    #[error("{path}: invalid header: {message}")]
    InvalidHeader { path: PathBuf, message: String },

    #[error("channel `{name}` not found in {path}")]
    ChannelNotFound { path: PathBuf, name: String },
}

/// Decoded contents of one `.outb` file.
#[derive(Clone, Debug, PartialEq)]
pub struct OutbFile {
    pub description: String,
    /// Channel names, `Time` first.
    pub channels: Vec<String>,
    pub units: Vec<String>,
    /// Row-major samples, `channels.len()` values per row.
    pub data: Vec<f64>,
}

impl OutbFile {
    pub fn new(description: impl Into<String>, channels: Vec<String>, units: Vec<String>, data: Vec<f64>) -> Self {
        Self { description: description.into(), channels, units, data }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, OutbError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| OutbError::Io { path: path.to_path_buf(), source })?;
        Decoder { path, buf: &bytes[..] }.decode()
    }

    pub fn n_samples(&self) -> usize {
        if self.channels.is_empty() { 0 } else { self.data.len() / self.channels.len() }
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == name)
    }

    /// Extracts `names` (in that order) into a [`TimeSeries`].
    pub fn select<S: AsRef<str>>(&self, path: &Path, names: &[S]) -> Result<TimeSeries, OutbError> {
        let cols = names
            .iter()
            .map(|n| {
                self.channel_index(n.as_ref()).ok_or_else(|| OutbError::ChannelNotFound {
                    path: path.to_path_buf(),
                    name: n.as_ref().to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let width = self.channels.len();
        let rows = self.n_samples();
        let mut time = Vec::with_capacity(rows);
        let mut values = Vec::with_capacity(rows * cols.len());
        for row in self.data.chunks_exact(width.max(1)) {
            time.push(row[0]);
            values.extend(cols.iter().map(|&c| row[c]));
        }
        Ok(TimeSeries::new(names.iter().map(|n| n.as_ref().to_string()).collect(), time, values))
    }

    /// Encodes the file. Formats without a time column assume uniform steps.
    pub fn write(&self, path: impl AsRef<Path>, format: FileFormat) -> std::io::Result<()> {
        fs::write(path, self.encode(format))
    }

    pub fn encode(&self, format: FileFormat) -> Vec<u8> {
        let width = self.channels.len();
        let n_chans = width.saturating_sub(1);
        let rows = self.n_samples();
        let name_len = match format {
            FileFormat::ChanLenIn => self
                .channels
                .iter()
                .chain(self.units.iter())
                .map(|s| s.len() + 2)
                .max()
                .unwrap_or(DEFAULT_NAME_LEN)
                .max(DEFAULT_NAME_LEN),
            _ => DEFAULT_NAME_LEN,
        };
        let column = |c: usize| self.data.chunks_exact(width.max(1)).map(move |row| row[c]);

        let mut out = BytesMut::new();
        out.put_i16_le(format as i16);
        if format == FileFormat::ChanLenIn {
            out.put_i16_le(name_len as i16);
        }
        out.put_i32_le(n_chans as i32);
        out.put_i32_le(rows as i32);

        let (t0, t1) = (self.data.first().copied().unwrap_or(0.0), column(0).nth(1).unwrap_or(0.0));
        let mut time_pack = (1.0, 0.0);
        if format == FileFormat::WithTime {
            let (lo, hi) = min_max(column(0));
            let scl = if hi > lo { INT32_RANGE / (hi - lo) } else { 1.0 };
            let off = INT32_MIN - scl * lo;
            time_pack = (scl, off);
            out.put_f64_le(scl);
            out.put_f64_le(off);
        } else {
            out.put_f64_le(t0);
            out.put_f64_le(if rows > 1 { t1 - t0 } else { 0.0 });
        }

        let mut packs = Vec::with_capacity(n_chans);
        if format != FileFormat::NoCompressWithoutTime {
            for c in 1..width {
                let (lo, hi) = min_max(column(c));
                let scl = if hi > lo { (INT16_RANGE / (hi - lo)) as f32 } else { 1.0 };
                let off = (INT16_MIN - scl as f64 * lo) as f32;
                packs.push((scl, off));
            }
            packs.iter().for_each(|(s, _)| out.put_f32_le(*s));
            packs.iter().for_each(|(_, o)| out.put_f32_le(*o));
        }

        out.put_i32_le(self.description.len() as i32);
        out.put_slice(self.description.as_bytes());
        for name in &self.channels {
            put_padded(&mut out, name, name_len);
        }
        for c in 0..width {
            let unit = self.units.get(c).map(String::as_str).unwrap_or("-");
            put_padded(&mut out, &format!("({unit})"), name_len);
        }

        if format == FileFormat::WithTime {
            for t in column(0) {
                out.put_i32_le((time_pack.0 * t + time_pack.1).round().clamp(INT32_MIN, INT32_MAX) as i32);
            }
        }
        for row in self.data.chunks_exact(width.max(1)) {
            for (c, v) in row.iter().enumerate().skip(1) {
                match format {
                    FileFormat::NoCompressWithoutTime => out.put_f64_le(*v),
                    _ => {
                        let (scl, off) = packs[c - 1];
                        let packed = (scl as f64 * v + off as f64).round().clamp(INT16_MIN, INT16_MAX);
                        out.put_i16_le(packed as i16);
                    }
                }
            }
        }
        out.to_vec()
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn put_padded(out: &mut BytesMut, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    out.put_slice(&bytes[..n]);
    out.put_bytes(b' ', len - n);
}

struct Decoder<'a> {
    path: &'a Path,
    buf: &'a [u8],
}

impl Decoder<'_> {
    fn need(&self, n: usize, what: &'static str) -> Result<(), OutbError> {
        if self.buf.remaining() < n {
            Err(OutbError::Truncated { path: self.path.to_path_buf(), what })
        } else {
            Ok(())
        }
    }

    fn count(&mut self, what: &'static str) -> Result<usize, OutbError> {
        self.need(4, what)?;
        let n = self.buf.get_i32_le();
        usize::try_from(n).map_err(|_| OutbError::InvalidHeader {
            path: self.path.to_path_buf(),
            message: format!("negative {what} ({n})"),
        })
    }

    fn string(&mut self, len: usize, what: &'static str) -> Result<String, OutbError> {
        self.need(len, what)?;
        let raw = String::from_utf8_lossy(&self.buf[..len]).into_owned();
        self.buf.advance(len);
        Ok(raw)
    }

    fn invalid(&self, message: impl Into<String>) -> OutbError {
        OutbError::InvalidHeader { path: self.path.to_path_buf(), message: message.into() }
    }

    /// Product of `factors`, rejecting headers whose sizes overflow.
    fn size(&self, factors: &[usize]) -> Result<usize, OutbError> {
        factors
            .iter()
            .try_fold(1usize, |acc, &f| acc.checked_mul(f))
            .ok_or_else(|| self.invalid(format!("section of {factors:?} overflows")))
    }

    fn decode(mut self) -> Result<OutbFile, OutbError> {
        self.need(2, "file id")?;
        let id = self.buf.get_i16_le();
        let format = FileFormat::from_id(id)
            .ok_or_else(|| OutbError::UnknownFormat { path: self.path.to_path_buf(), id })?;

        let name_len = if format == FileFormat::ChanLenIn {
            self.need(2, "name length")?;
            self.buf.get_i16_le().max(0) as usize
        } else {
            DEFAULT_NAME_LEN
        };
        if name_len == 0 {
            return Err(self.invalid("zero channel name length"));
        }
        let n_chans = self.count("channel count")?;
        let rows = self.count("sample count")?;
        if n_chans == 0 && rows > 0 && format != FileFormat::WithTime {
            return Err(self.invalid(format!("{rows} samples but no channels")));
        }

        self.need(16, "time header")?;
        let (time_a, time_b) = (self.buf.get_f64_le(), self.buf.get_f64_le());

        // Everything after the description is sized by the header; check it
        // fits before allocating for it.
        let uncompressed = format == FileFormat::NoCompressWithoutTime;
        let sample_bytes = if uncompressed { 8 } else { 2 };
        let scale_bytes = if uncompressed { 0 } else { self.size(&[8, n_chans])? };
        let name_bytes = self.size(&[2, n_chans + 1, name_len])?;
        let time_bytes = if format == FileFormat::WithTime { self.size(&[4, rows])? } else { 0 };
        let data_bytes = self.size(&[sample_bytes, rows, n_chans])?;
        let payload = [scale_bytes, 4, name_bytes, time_bytes, data_bytes]
            .iter()
            .try_fold(0usize, |acc, &n| acc.checked_add(n))
            .ok_or_else(|| self.invalid("file size overflows"))?;
        self.need(payload, "header sections")?;

        let (scales, offsets) = if uncompressed {
            (vec![1.0f32; n_chans], vec![0.0f32; n_chans])
        } else {
            let scales: Vec<f32> = (0..n_chans).map(|_| self.buf.get_f32_le()).collect();
            let offsets: Vec<f32> = (0..n_chans).map(|_| self.buf.get_f32_le()).collect();
            (scales, offsets)
        };

        let desc_len = self.count("description length")?;
        let description = self.string(desc_len, "description")?.trim().to_string();
        let mut channels = Vec::with_capacity(n_chans + 1);
        for _ in 0..=n_chans {
            channels.push(self.string(name_len, "channel names")?.trim().to_string());
        }
        let mut units = Vec::with_capacity(n_chans + 1);
        for _ in 0..=n_chans {
            let raw = self.string(name_len, "channel units")?;
            let unit = raw.trim();
            let unit = unit.strip_prefix('(').and_then(|u| u.strip_suffix(')')).unwrap_or(unit);
            units.push(unit.to_string());
        }

        self.need(time_bytes + data_bytes, "channel data")?;
        let time: Vec<f64> = if format == FileFormat::WithTime {
            (0..rows).map(|_| (self.buf.get_i32_le() as f64 - time_b) / time_a).collect()
        } else {
            (0..rows).map(|i| time_a + time_b * i as f64).collect()
        };

        let mut data = Vec::with_capacity(rows * (n_chans + 1));
        for t in time {
            data.push(t);
            for c in 0..n_chans {
                let packed = if uncompressed {
                    self.buf.get_f64_le()
                } else {
                    self.buf.get_i16_le() as f64
                };
                data.push((packed - offsets[c] as f64) / scales[c] as f64);
            }
        }

        Ok(OutbFile { description, channels, units, data })
    }
}

/// Dense samples × channels matrix in the order the channels were requested.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeries {
    channels: Vec<String>,
    time: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// `values` is row major with `channels.len()` entries per row.
    pub(crate) fn new(channels: Vec<String>, time: Vec<f64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), time.len() * channels.len(), "ragged time series");
        Self { channels, time, values }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let w = self.channels.len();
        &self.values[i * w..(i + 1) * w]
    }

    pub fn column(&self, c: usize) -> Vec<f64> {
        let w = self.channels.len();
        self.values.iter().skip(c).step_by(w.max(1)).copied().collect()
    }

    pub fn column_by_name(&self, name: &str) -> Option<Vec<f64>> {
        self.channels.iter().position(|c| c == name).map(|c| self.column(c))
    }
}

/// Reads `names` from a binary output file.
pub fn read_channels<S: AsRef<str>>(path: impl AsRef<Path>, names: &[S]) -> Result<TimeSeries, OutbError> {
    let path = path.as_ref();
    OutbFile::read(path)?.select(path, names)
}
