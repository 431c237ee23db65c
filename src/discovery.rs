//! Log file discovery.
//!
//! Field campaigns drop harp logs into nested per-deployment directories.
//! Discovery walks a root directory and collects every file whose name
//! matches one of the configured glob patterns.

use crate::constants::LOG_FILE_PATTERNS;
use crate::error::{HarpError, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Recursive search for harp log files
#[derive(Debug, Clone)]
pub struct LogDiscovery {
    root: PathBuf,
    patterns: Vec<Pattern>,
    max_depth: Option<usize>,
}

impl LogDiscovery {
    /// Discovery rooted at `root` with the default log file patterns
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_patterns(root, LOG_FILE_PATTERNS)
    }

    pub fn with_patterns<S: AsRef<str>>(root: impl Into<PathBuf>, patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| {
                    HarpError::invalid_argument(format!("invalid pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root: root.into(),
            patterns,
            max_depth: None,
        })
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sorted paths of all matching files below the root
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(HarpError::FileNotFound {
                path: self.root.clone(),
            });
        }
        if self.root.is_file() {
            return Ok(vec![self.root.clone()]);
        }

        debug!("Searching for harp logs in: {}", self.root.display());

        let mut walker = WalkDir::new(&self.root).follow_links(true);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && self.matches(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        debug!("Found {} log files", files.len());
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.patterns.iter().any(|p| p.matches(name)))
    }
}
