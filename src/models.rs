//! Core data structures shared across the pipeline.
//!
//! Defines the two known harp log layouts, device identifiers, the parsed
//! record type and per-read statistics.

use crate::constants::{light_channels, salinity_channels};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Harp log layouts supported by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarpLayout {
    /// `i:k: time r2 d2 r16 d16 temperature logger_temp`
    Salinity,
    /// `cnt stick:diode:amplifier time C R G B Temp`
    Light,
}

impl HarpLayout {
    /// Channel names in the order they are stored on each record
    pub fn channel_names(&self) -> &'static [&'static str] {
        match self {
            HarpLayout::Salinity => salinity_channels::NAMES,
            HarpLayout::Light => light_channels::NAMES,
        }
    }

    /// Units matching `channel_names`
    pub fn channel_units(&self) -> &'static [&'static str] {
        match self {
            HarpLayout::Salinity => salinity_channels::UNITS,
            HarpLayout::Light => light_channels::UNITS,
        }
    }

    /// Index of the device token within a split line
    pub fn device_field(&self) -> usize {
        match self {
            HarpLayout::Salinity => 0,
            HarpLayout::Light => 1,
        }
    }

    /// Index of the timestamp token within a split line
    pub fn time_field(&self) -> usize {
        self.device_field() + 1
    }

    /// Human readable name used in status output
    pub fn label(&self) -> &'static str {
        match self {
            HarpLayout::Salinity => "salinity harp",
            HarpLayout::Light => "light harp",
        }
    }
}

impl fmt::Display for HarpLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Position of a sensor in the harp: module and wire pair within it.
///
/// Light harps also report the amplifier gain a sample was taken at; each
/// gain of a diode is a column of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub module: u32,
    pub wire_pair: u32,
    pub amplifier: Option<u32>,
}

impl DeviceId {
    pub fn new(module: u32, wire_pair: u32) -> Self {
        Self {
            module,
            wire_pair,
            amplifier: None,
        }
    }

    pub fn with_amplifier(mut self, amplifier: u32) -> Self {
        self.amplifier = Some(amplifier);
        self
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.amplifier {
            Some(amplifier) => write!(f, "{}:{}:{}", self.module, self.wire_pair, amplifier),
            None => write!(f, "{}:{}", self.module, self.wire_pair),
        }
    }
}

/// One parsed log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub device: DeviceId,
    pub time: NaiveDateTime,
    /// Channel values in layout order
    pub values: Vec<f64>,
}

/// Line accounting for a single tokenizer pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TokenizerStats {
    pub lines_read: usize,
    pub comment_lines: usize,
    pub records_emitted: usize,
    pub lines_dropped: usize,
}

/// Summary of one read
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub path: PathBuf,
    pub tokenizer: TokenizerStats,
    pub time_steps: usize,
    pub modules: usize,
    pub wire_pairs: usize,
    pub processing_time_ms: u128,
}
