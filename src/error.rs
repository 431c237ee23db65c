//! Error handling for harp log processing.
//!
//! Malformed telemetry lines never surface here; they are dropped by the
//! tokenizer. What remains are the fatal conditions a caller has to handle:
//! unreadable or empty files, unknown method/formula names and export failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid log format in file: {path} - {reason}")]
    DataFormat { path: PathBuf, reason: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Directory traversal failed: {0}")]
    Discovery(#[from] walkdir::Error),
}

impl HarpError {
    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a data format error for the given file
    pub fn data_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DataFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HarpError>;
