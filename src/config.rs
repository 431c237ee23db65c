//! Configuration management and validation.
//!
//! Provides configuration structures for reading harp logs, detecting the
//! reference resistance, evaluating salinity and exporting datasets.

use crate::constants::{
    COMMENT_MARKER, DEFAULT_BUTTERWORTH_CUTOFF, DEFAULT_BUTTERWORTH_ORDER, DEFAULT_GRADIENT_LAG,
    DEFAULT_MEDIAN_WINDOW, DEFAULT_RESISTANCE_CHANNEL, DEFAULT_SAVGOL_POLYORDER,
    DEFAULT_SAVGOL_WINDOW, DEFAULT_TOLERANCE,
};
use crate::error::{HarpError, Result};
use crate::models::HarpLayout;
use crate::salinity::BrineFormula;
use crate::smoothing::SmoothingMethod;
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Settings for turning a log file into a `HarpDataset`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Force a layout instead of inferring it from the first data line
    pub layout: Option<HarpLayout>,

    /// Lines starting with this character are skipped
    pub comment_marker: char,

    /// Print "read ... now... done" status lines to stderr
    pub show_status: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            layout: None,
            comment_marker: COMMENT_MARKER,
            show_status: false,
        }
    }
}

impl ReaderConfig {
    pub fn with_layout(mut self, layout: HarpLayout) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_comment_marker(mut self, marker: char) -> Self {
        self.comment_marker = marker;
        self
    }

    pub fn with_status(mut self) -> Self {
        self.show_status = true;
        self
    }
}

/// Parameters of the freeze-onset detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Smoothing applied to the raw resistance series
    pub method: SmoothingMethod,

    /// Derivative band (low, high); reordered if given the wrong way round
    pub tolerance: (f64, f64),

    /// Lag in samples of the centered difference
    pub lag: usize,

    /// Window of the moving median (also used on the derivative)
    pub median_window: usize,

    /// Butterworth filter order
    pub butterworth_order: usize,

    /// Butterworth cutoff as a fraction of the Nyquist frequency
    pub butterworth_cutoff: f64,

    /// Savitzky-Golay window length (made odd if even)
    pub savgol_window: usize,

    /// Savitzky-Golay polynomial order
    pub savgol_polyorder: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            method: SmoothingMethod::MovingMedian,
            tolerance: DEFAULT_TOLERANCE,
            lag: DEFAULT_GRADIENT_LAG,
            median_window: DEFAULT_MEDIAN_WINDOW,
            butterworth_order: DEFAULT_BUTTERWORTH_ORDER,
            butterworth_cutoff: DEFAULT_BUTTERWORTH_CUTOFF,
            savgol_window: DEFAULT_SAVGOL_WINDOW,
            savgol_polyorder: DEFAULT_SAVGOL_POLYORDER,
        }
    }
}

impl DetectorConfig {
    pub fn with_method(mut self, method: SmoothingMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_tolerance(mut self, low: f64, high: f64) -> Self {
        self.tolerance = (low, high);
        self
    }

    pub fn with_lag(mut self, lag: usize) -> Self {
        self.lag = lag;
        self
    }

    pub fn with_median_window(mut self, window: usize) -> Self {
        self.median_window = window;
        self
    }

    /// Tolerance band with `low <= high`
    pub fn sorted_tolerance(&self) -> (f64, f64) {
        let (a, b) = self.tolerance;
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Reject parameter combinations the smoothers cannot work with
    pub fn validate(&self) -> Result<()> {
        let (low, high) = self.tolerance;
        if !low.is_finite() || !high.is_finite() {
            return Err(HarpError::Configuration {
                message: format!("tolerance bounds must be finite, got ({low}, {high})"),
            });
        }
        if self.lag == 0 {
            return Err(HarpError::Configuration {
                message: "gradient lag must be at least one sample".to_string(),
            });
        }
        if self.median_window == 0 {
            return Err(HarpError::Configuration {
                message: "median window must be at least one sample".to_string(),
            });
        }
        if self.butterworth_order == 0
            || !(self.butterworth_cutoff > 0.0 && self.butterworth_cutoff < 1.0)
        {
            return Err(HarpError::Configuration {
                message: format!(
                    "Butterworth filter needs order >= 1 and 0 < cutoff < 1, got order {} cutoff {}",
                    self.butterworth_order, self.butterworth_cutoff
                ),
            });
        }
        if self.savgol_polyorder >= self.savgol_window {
            return Err(HarpError::Configuration {
                message: format!(
                    "Savitzky-Golay polyorder {} must be less than window {}",
                    self.savgol_polyorder, self.savgol_window
                ),
            });
        }

        debug!("Detector configuration validated: {:?}", self);
        Ok(())
    }
}

/// Settings for the salinity evaluation of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Restrict evaluation to a single module
    pub module: Option<u32>,

    /// Resistance channel used for R0 and the liquid fraction
    pub resistance_channel: String,

    /// Brine salinity polynomial
    pub formula: BrineFormula,

    pub detector: DetectorConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            module: None,
            resistance_channel: DEFAULT_RESISTANCE_CHANNEL.to_string(),
            formula: BrineFormula::Vancoppenolle,
            detector: DetectorConfig {
                method: SmoothingMethod::Butterworth,
                ..DetectorConfig::default()
            },
        }
    }
}

impl EvaluationConfig {
    pub fn with_module(mut self, module: u32) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_resistance_channel(mut self, channel: impl Into<String>) -> Self {
        self.resistance_channel = channel.into();
        self
    }

    pub fn with_formula(mut self, formula: BrineFormula) -> Self {
        self.formula = formula;
        self
    }

    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }
}

/// Output file formats for dataset export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Parquet,
    Csv,
}

impl ExportFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Parquet => "parquet",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = HarpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "parquet" | "pq" => Ok(ExportFormat::Parquet),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(HarpError::invalid_argument(format!(
                "unknown export format '{other}' (expected parquet or csv)"
            ))),
        }
    }
}

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = HarpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(CompressionAlgorithm::Snappy),
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            "none" | "uncompressed" => Ok(CompressionAlgorithm::Uncompressed),
            other => Err(HarpError::invalid_argument(format!(
                "unknown compression '{other}' (expected snappy, zstd, lz4 or none)"
            ))),
        }
    }
}

/// Settings for writing a dataset to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub compression: CompressionAlgorithm,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Parquet,
            compression: CompressionAlgorithm::Snappy,
        }
    }
}

impl ExportConfig {
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.compression = compression;
        self
    }
}
