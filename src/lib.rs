//! Harp Processor Library
//!
//! Readers and evaluation tools for the logs written by salinity harps and
//! light harps, the wire-pair instruments frozen into sea ice to follow brine
//! salinity and light transmission through a growth season.
//!
//! This library provides tools for:
//! - Tokenizing harp log lines, dropping malformed telemetry
//! - Reconstructing regular multiplexer scan cycles into a 3-D dataset
//! - Detecting the freeze-onset reference resistance per wire pair
//! - Deriving brine salinity, liquid/solid fraction and bulk salinity
//! - Exporting datasets to Parquet or CSV

pub mod cache;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod discovery;
pub mod error;
pub mod evaluation;
pub mod models;
pub mod reader;
pub mod reference;
pub mod regularizer;
pub mod salinity;
pub mod smoothing;
pub mod tokenizer;
pub mod writer;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use cache::DatasetCache;
pub use config::{DetectorConfig, EvaluationConfig, ExportConfig, ReaderConfig};
pub use dataset::{HarpDataset, Variable};
pub use error::{HarpError, Result};
pub use evaluation::{Evaluation, evaluate};
pub use models::{DeviceId, HarpLayout, LogRecord};
pub use reader::{DatasetReader, HarpReader, read_harp_data, read_harp_file};
pub use reference::{ReferenceResistance, detect_reference};
pub use salinity::BrineFormula;
pub use smoothing::SmoothingMethod;
