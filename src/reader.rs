//! File-level entry points: log file in, dataset out.

use crate::config::{EvaluationConfig, ReaderConfig};
use crate::dataset::HarpDataset;
use crate::error::{HarpError, Result};
use crate::evaluation::{Evaluation, evaluate};
use crate::models::{HarpLayout, ProcessingStats};
use crate::regularizer::Regularizer;
use crate::tokenizer::LogTokenizer;
use colored::*;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Anything that turns a file into a `HarpDataset`
pub trait DatasetReader {
    fn read(&self, path: &Path) -> Result<HarpDataset>;
}

/// Tokenizer + regulariser pipeline for harp logs
#[derive(Debug, Clone, Default)]
pub struct HarpReader {
    config: ReaderConfig,
}

impl HarpReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Read `path` and report what the tokenizer and regulariser did
    pub fn read_with_stats(&self, path: &Path) -> Result<(HarpDataset, ProcessingStats)> {
        let start = Instant::now();
        let mut tokenizer = LogTokenizer::open(path, self.config.layout)?
            .with_comment_marker(self.config.comment_marker);

        let label = self
            .config
            .layout
            .map(|l| l.label())
            .unwrap_or("harp");
        if self.config.show_status {
            eprint!("{} {} now...", "read".bright_cyan(), label);
            let _ = std::io::stderr().flush();
        }

        let records = tokenizer.by_ref().collect::<Result<Vec<_>>>()?;
        let layout = tokenizer.layout().unwrap_or(HarpLayout::Salinity);
        let tokenizer_stats = tokenizer.stats().clone();
        debug!(
            "{}: {} records from {} lines ({} dropped)",
            path.display(),
            tokenizer_stats.records_emitted,
            tokenizer_stats.lines_read,
            tokenizer_stats.lines_dropped
        );

        let dataset = Regularizer::new(layout).with_source(path).build(records);
        if self.config.show_status {
            match &dataset {
                Ok(_) => eprintln!(" {}", "done".bright_green()),
                Err(_) => eprintln!(" {}", "failed".bright_red()),
            }
        }
        let dataset = dataset?;

        let (time_steps, modules, wire_pairs) = dataset.shape();
        let stats = ProcessingStats {
            path: path.to_path_buf(),
            tokenizer: tokenizer_stats,
            time_steps,
            modules,
            wire_pairs,
            processing_time_ms: start.elapsed().as_millis(),
        };
        info!(
            "Read {} {}: {} time steps, {} modules x {} wire pairs in {} ms",
            layout,
            path.display(),
            time_steps,
            modules,
            wire_pairs,
            stats.processing_time_ms
        );

        Ok((dataset, stats))
    }
}

impl DatasetReader for HarpReader {
    fn read(&self, path: &Path) -> Result<HarpDataset> {
        self.read_with_stats(path).map(|(dataset, _)| dataset)
    }
}

/// Read a harp log with default settings, inferring the layout
pub fn read_harp_file(path: &Path) -> Result<HarpDataset> {
    HarpReader::default().read(path)
}

/// Read a salinity harp log and evaluate it
pub fn read_harp_data(path: &Path, config: &EvaluationConfig) -> Result<Evaluation> {
    let reader = HarpReader::new(ReaderConfig::default().with_layout(HarpLayout::Salinity));
    let dataset = reader.read(path)?;
    if !dataset.contains(&config.resistance_channel) {
        return Err(HarpError::invalid_argument(format!(
            "{} has no channel '{}'",
            path.display(),
            config.resistance_channel
        )));
    }
    evaluate(dataset, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn salinity_log(cycles: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# salinity harp test log").unwrap();
        for k in 0..cycles {
            for w in 0..2 {
                let second = k * 2 + w;
                writeln!(
                    file,
                    "0:{w}: 2019-01-24T12:{:02}:{:02} 510.0 2 500.{k} 2 -1.{k} 20.0",
                    second / 60,
                    second % 60
                )
                .unwrap();
            }
        }
        file
    }

    #[test]
    fn test_read_with_stats() {
        let file = salinity_log(4);
        let (dataset, stats) = HarpReader::default()
            .read_with_stats(file.path())
            .unwrap();

        assert_eq!(dataset.shape(), (3, 1, 2));
        assert_eq!(stats.time_steps, 3);
        assert_eq!(stats.tokenizer.comment_lines, 1);
        assert_eq!(stats.tokenizer.records_emitted, 8);
        assert_eq!(stats.path, file.path());
    }

    #[test]
    fn test_read_harp_file_missing() {
        let result = read_harp_file(Path::new("/nonexistent/harp.dat"));
        assert!(matches!(result, Err(HarpError::FileNotFound { .. })));
    }

    #[test]
    fn test_read_harp_file_without_records() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# only a header").unwrap();
        writeln!(file, "garbage line").unwrap();

        let result = read_harp_file(file.path());
        assert!(matches!(result, Err(HarpError::DataFormat { .. })));
    }

    #[test]
    fn test_read_harp_data_unknown_channel() {
        let file = salinity_log(4);
        let config = EvaluationConfig::default().with_resistance_channel("r10");
        let result = read_harp_data(file.path(), &config);
        assert!(matches!(result, Err(HarpError::InvalidArgument { .. })));
    }

    #[test]
    fn test_reader_trait_object() {
        let file = salinity_log(3);
        let reader: Box<dyn DatasetReader> = Box::new(HarpReader::new(
            ReaderConfig::default().with_layout(HarpLayout::Salinity),
        ));
        assert_eq!(reader.read(file.path()).unwrap().shape(), (2, 1, 2));
    }
}
