//! Dataset export to Parquet and CSV.
//!
//! The 3-D dataset is flattened to long format, one row per
//! (time, module, wire_pair) with one column per variable. Missing values are
//! written as nulls.

use crate::config::{ExportConfig, ExportFormat};
use crate::dataset::HarpDataset;
use crate::error::{HarpError, Result};
use polars::prelude::{
    Column, CsvWriter, DataFrame, DataType, NamedFrom, ParquetWriter as PolarsParquetWriter,
    SerWriter, Series, TimeUnit,
};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flatten `dataset` into a long-format DataFrame
pub fn dataset_to_dataframe(dataset: &HarpDataset) -> Result<DataFrame> {
    let (steps, module_count, wire_pair_count) = dataset.shape();
    let rows = steps * module_count * wire_pair_count;

    let mut millis = Vec::with_capacity(rows);
    let mut modules = Vec::with_capacity(rows);
    let mut wire_pairs = Vec::with_capacity(rows);
    for time in dataset.time() {
        for module in dataset.modules() {
            for wire_pair in dataset.wire_pairs() {
                millis.push(time.and_utc().timestamp_millis());
                modules.push(*module);
                wire_pairs.push(*wire_pair);
            }
        }
    }

    let time = Series::new("time".into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    let mut columns = vec![
        Column::from(time),
        Column::new("module".into(), modules),
        Column::new("wire_pair".into(), wire_pairs),
    ];

    for variable in dataset.variables() {
        // standard layout iterates time, then module, then wire pair
        let values: Vec<Option<f64>> = variable
            .data
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect();
        columns.push(Column::new(variable.name.as_str().into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Writes datasets to a single output file
#[derive(Debug)]
pub struct DatasetWriter {
    output_path: PathBuf,
    config: ExportConfig,
}

impl DatasetWriter {
    pub fn new(output_path: impl Into<PathBuf>, config: ExportConfig) -> Self {
        Self {
            output_path: output_path.into(),
            config,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Write `dataset` and return the number of rows written
    pub fn write(&self, dataset: &HarpDataset) -> Result<usize> {
        let mut df = dataset_to_dataframe(dataset)?;
        let rows = df.height();

        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.output_path)?;

        match self.config.format {
            ExportFormat::Parquet => {
                PolarsParquetWriter::new(file)
                    .with_compression(self.config.compression.to_polars_compression())
                    .finish(&mut df)
                    .map_err(|e| self.write_failed(e))?;
            }
            ExportFormat::Csv => {
                CsvWriter::new(file)
                    .include_header(true)
                    .finish(&mut df)
                    .map_err(|e| self.write_failed(e))?;
            }
        }

        debug!(
            "Wrote {} rows x {} columns to {}",
            rows,
            df.width(),
            self.output_path.display()
        );
        Ok(rows)
    }

    fn write_failed(&self, error: polars::error::PolarsError) -> HarpError {
        HarpError::data_format(
            &self.output_path,
            format!("failed to write {:?} output: {}", self.config.format, error),
        )
    }
}
