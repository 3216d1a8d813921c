//! NDBC buoy records (standard meteorological, continuous wind, ocean
//! current) read from the plain-text historical files.
//!
//! Rows are whitespace separated and start with `YY(YY) MM DD hh mm`. Header
//! lines (`#`-prefixed, or any line whose first token is not a number) are
//! skipped. NDBC fills missing measurements with `MM` or with a run of
//! nines whose width depends on the column (`999` for directions, `99` for
//! speeds, heights and periods); those become `None`. The marker is matched
//! per column, so a real 99° bearing survives.
//!
//! Directions for wind and waves are stored as `360 − dir`, the convention
//! FAST uses (+y flipped relative to compass bearing).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetoceanError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected at least {expected} columns, found {found}")]
    ShortRow { line: usize, expected: usize, found: usize },

    #[error("line {line}, column {column}: `{token}` is not a number")]
    Number { line: usize, column: usize, token: String },

    #[error("line {line}: invalid timestamp")]
    Timestamp { line: usize },
}

/// Standard meteorological record (`stdmet`).
#[derive(Clone, Debug, PartialEq)]
pub struct MetRecord {
    pub time: NaiveDateTime,
    /// deg, FAST convention
    pub wind_dir: Option<f64>,
    /// m/s
    pub wind_speed: Option<f64>,
    /// Significant wave height, m.
    pub wave_height: Option<f64>,
    /// Dominant wave period, s.
    pub peak_period: Option<f64>,
    /// deg, FAST convention
    pub wave_dir: Option<f64>,
}

/// Continuous wind record (`cwind`).
#[derive(Clone, Debug, PartialEq)]
pub struct WindRecord {
    pub time: NaiveDateTime,
    pub wind_dir: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// Ocean current record (`adcp`), first bin.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentRecord {
    pub time: NaiveDateTime,
    /// m
    pub depth: Option<f64>,
    /// deg, compass
    pub direction: Option<f64>,
    /// cm/s
    pub speed: Option<f64>,
}

// Missing-value markers, per column.
const NO_DIR: f64 = 999.0;
const NO_SPEED: f64 = 99.0;
const NO_HEIGHT: f64 = 99.0;
const NO_PERIOD: f64 = 99.0;
const NO_BIN_DEPTH: f64 = 9999.0;
const NO_CURRENT: f64 = 999.0;

pub fn parse_met(text: &str) -> Result<Vec<MetRecord>, MetoceanError> {
    rows(text, 12, |row| {
        Ok(MetRecord {
            time: row.time()?,
            wind_dir: row.value(5, NO_DIR)?.map(flip),
            wind_speed: row.value(6, NO_SPEED)?,
            wave_height: row.value(8, NO_HEIGHT)?,
            peak_period: row.value(9, NO_PERIOD)?,
            wave_dir: row.value(11, NO_DIR)?.map(flip),
        })
    })
}

pub fn parse_wind(text: &str) -> Result<Vec<WindRecord>, MetoceanError> {
    rows(text, 7, |row| {
        Ok(WindRecord {
            time: row.time()?,
            wind_dir: row.value(5, NO_DIR)?.map(flip),
            wind_speed: row.value(6, NO_SPEED)?,
        })
    })
}

pub fn parse_current(text: &str) -> Result<Vec<CurrentRecord>, MetoceanError> {
    rows(text, 8, |row| {
        Ok(CurrentRecord {
            time: row.time()?,
            depth: row.value(5, NO_BIN_DEPTH)?,
            direction: row.value(6, NO_DIR)?,
            speed: row.value(7, NO_CURRENT)?,
        })
    })
}

pub fn read_met(path: impl AsRef<Path>) -> Result<Vec<MetRecord>, MetoceanError> {
    parse_met(&read(path.as_ref())?)
}

pub fn read_wind(path: impl AsRef<Path>) -> Result<Vec<WindRecord>, MetoceanError> {
    parse_wind(&read(path.as_ref())?)
}

pub fn read_current(path: impl AsRef<Path>) -> Result<Vec<CurrentRecord>, MetoceanError> {
    parse_current(&read(path.as_ref())?)
}

fn read(path: &Path) -> Result<String, MetoceanError> {
    fs::read_to_string(path).map_err(|source| MetoceanError::Io { path: path.to_path_buf(), source })
}

#[inline]
fn flip(dir: f64) -> f64 {
    360.0 - dir
}

struct Row<'a> {
    line: usize,
    fields: Vec<&'a str>,
}

impl Row<'_> {
    fn number(&self, column: usize) -> Result<f64, MetoceanError> {
        let token = self.fields[column];
        token.parse().map_err(|_| MetoceanError::Number {
            line: self.line,
            column,
            token: token.to_string(),
        })
    }

    /// `None` for `MM` or for this column's `missing` marker.
    fn value(&self, column: usize, missing: f64) -> Result<Option<f64>, MetoceanError> {
        if self.fields[column] == "MM" {
            return Ok(None);
        }
        let v = self.number(column)?;
        Ok(if v == missing { None } else { Some(v) })
    }

    fn time(&self) -> Result<NaiveDateTime, MetoceanError> {
        let bad = || MetoceanError::Timestamp { line: self.line };
        let int = |c: usize| -> Result<u32, MetoceanError> {
            let v = self.number(c)?;
            if v.fract() != 0.0 || v < 0.0 {
                return Err(bad());
            }
            Ok(v as u32)
        };
        let (year, month, day, hour, minute) = (int(0)?, int(1)?, int(2)?, int(3)?, int(4)?);
        let year = if year < 100 { year + 1900 } else { year };
        NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .ok_or_else(bad)
    }
}

fn is_data_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty()
        && !trimmed.starts_with('#')
        && trimmed.split_whitespace().next().is_some_and(|t| t.parse::<f64>().is_ok())
}

fn rows<T>(
    text: &str,
    min_columns: usize,
    mut record: impl FnMut(&Row<'_>) -> Result<T, MetoceanError>,
) -> Result<Vec<T>, MetoceanError> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if !is_data_line(line) {
            continue;
        }
        let row = Row { line: i + 1, fields: line.split_whitespace().collect() };
        if row.fields.len() < min_columns {
            return Err(MetoceanError::ShortRow { line: row.line, expected: min_columns, found: row.fields.len() });
        }
        out.push(record(&row)?);
    }
    Ok(out)
}
