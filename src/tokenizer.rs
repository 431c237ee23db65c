//! Line tokenizer for harp log files.
//!
//! Turns the whitespace separated log lines into [`LogRecord`]s in a single
//! forward pass. Field loggers produce plenty of garbage (truncated lines,
//! placeholder devices, broken timestamps, stray non-UTF-8 bytes); such lines
//! are counted and dropped without raising an error. Only a failing read of
//! the underlying file is reported as an error.

use crate::constants::{COMMENT_MARKER, FIELDS_PER_LINE, TIMESTAMP_FORMATS};
use crate::error::{HarpError, Result};
use crate::models::{DeviceId, HarpLayout, LogRecord, TokenizerStats};
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace};

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").expect("valid numeric pattern")
});

/// Lazy, single pass tokenizer over a harp log
pub struct LogTokenizer<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    layout: Option<HarpLayout>,
    comment_marker: char,
    stats: TokenizerStats,
}

impl LogTokenizer<BufReader<File>> {
    /// Open a log file for tokenizing
    pub fn open(path: &Path, layout: Option<HarpLayout>) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => HarpError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => HarpError::Io(e),
        })?;
        Ok(Self::new(BufReader::new(file), layout))
    }
}

impl<R: BufRead> LogTokenizer<R> {
    /// Tokenize `reader`; `layout` is inferred from the first usable line if `None`
    pub fn new(reader: R, layout: Option<HarpLayout>) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            layout,
            comment_marker: COMMENT_MARKER,
            stats: TokenizerStats::default(),
        }
    }

    pub fn with_comment_marker(mut self, marker: char) -> Self {
        self.comment_marker = marker;
        self
    }

    /// Layout in use, once known
    pub fn layout(&self) -> Option<HarpLayout> {
        self.layout
    }

    pub fn stats(&self) -> &TokenizerStats {
        &self.stats
    }

    /// Next raw line, decoded lossily; `None` at end of input
    fn next_line(&mut self) -> Option<Result<String>> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => Some(Ok(String::from_utf8_lossy(&self.buffer).into_owned())),
            Err(e) => Some(Err(HarpError::Io(e))),
        }
    }

    fn parse_line(&mut self, line: &str) -> Option<LogRecord> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != FIELDS_PER_LINE {
            return None;
        }

        let layout = match self.layout {
            Some(layout) => layout,
            None => {
                let layout = detect_layout(&fields)?;
                debug!("Detected {} layout", layout);
                self.layout = Some(layout);
                layout
            }
        };

        let (device, extra) = parse_device(fields[layout.device_field()], layout)?;
        let time = parse_timestamp(fields[layout.time_field()])?;

        let mut values = fields[layout.time_field() + 1..]
            .iter()
            .map(|field| parse_number(field))
            .collect::<Option<Vec<f64>>>()?;
        values.extend(extra);

        Some(LogRecord {
            device,
            time,
            values,
        })
    }
}

impl<R: BufRead> Iterator for LogTokenizer<R> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.next_line()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            self.stats.lines_read += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with(self.comment_marker) {
                self.stats.comment_lines += 1;
                continue;
            }

            match self.parse_line(trimmed) {
                Some(record) => {
                    self.stats.records_emitted += 1;
                    return Some(Ok(record));
                }
                None => {
                    self.stats.lines_dropped += 1;
                    trace!("Dropped line {}: {}", self.stats.lines_read, trimmed);
                }
            }
        }
    }
}

/// Infer the layout from where the device token sits
fn detect_layout(fields: &[&str]) -> Option<HarpLayout> {
    [HarpLayout::Salinity, HarpLayout::Light]
        .into_iter()
        .find(|layout| {
            parse_device(fields[layout.device_field()], *layout).is_some()
                && parse_timestamp(fields[layout.time_field()]).is_some()
        })
}

/// Parse `module:wire_pair[:]` (salinity) or `stick:diode:amplifier` (light).
///
/// Light harps key the device by its amplifier as well and also report the
/// amplifier as an extra channel value.
fn parse_device(token: &str, layout: HarpLayout) -> Option<(DeviceId, Option<f64>)> {
    let parts: Vec<&str> = token.split(':').collect();
    let module = parts.first()?.trim().parse::<u32>().ok()?;
    let wire_pair = parts.get(1)?.trim().parse::<u32>().ok()?;

    match layout {
        HarpLayout::Salinity => {
            // `i:k` or `i:k:`; anything more is not a salinity device token
            if parts.len() > 3 || parts.get(2).is_some_and(|p| !p.is_empty()) {
                return None;
            }
            Some((DeviceId::new(module, wire_pair), None))
        }
        HarpLayout::Light => {
            let amplifier = parts.get(2)?.trim().parse::<u32>().ok()?;
            Some((
                DeviceId::new(module, wire_pair).with_amplifier(amplifier),
                Some(f64::from(amplifier)),
            ))
        }
    }
}

/// Parse an ISO-8601-like timestamp; offsets are dropped keeping wall-clock time.
///
/// Lines are split on whitespace first, so a timestamp is always one token
/// with `T` between date and time.
pub fn parse_timestamp(token: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Some(dt.naive_local());
    }
    let token = token.strip_suffix('Z').unwrap_or(token);
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(token, format).ok())
}

/// Keep the numeric part of a field, e.g. `"-1.25°C"` -> `-1.25`.
///
/// A field with more than one numeric run (`"1.2.3"`) is missing.
pub fn parse_number(token: &str) -> Option<f64> {
    let mut runs = NUMBER.find_iter(token);
    let number = runs.next()?;
    if runs.next().is_some() {
        return None;
    }
    number.as_str().parse::<f64>().ok()
}
