//! Regularised harp dataset.
//!
//! A `HarpDataset` holds three coordinate axes (time, module, wire pair) and
//! any number of named, unit-annotated variables. Every variable is a dense
//! `(time, module, wire_pair)` array with NaN marking missing cells.

use crate::error::{HarpError, Result};
use chrono::NaiveDateTime;
use ndarray::{Array3, Axis, s};
use std::fmt;

/// One named data variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub unit: String,
    pub data: Array3<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, data: Array3<f64>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            data,
        }
    }

    /// Number of non-missing cells
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// Dense multi-dimensional harp dataset
#[derive(Debug, Clone, PartialEq)]
pub struct HarpDataset {
    time: Vec<NaiveDateTime>,
    modules: Vec<u32>,
    wire_pairs: Vec<u32>,
    variables: Vec<Variable>,
}

impl HarpDataset {
    /// Assemble a dataset, checking axis ordering and variable shapes
    pub fn new(
        time: Vec<NaiveDateTime>,
        modules: Vec<u32>,
        wire_pairs: Vec<u32>,
        variables: Vec<Variable>,
    ) -> Result<Self> {
        if time.windows(2).any(|w| w[0] >= w[1]) {
            return Err(HarpError::invalid_argument(
                "time axis must be strictly increasing",
            ));
        }
        if modules.windows(2).any(|w| w[0] >= w[1]) || wire_pairs.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(HarpError::invalid_argument(
                "module and wire_pair axes must be sorted and unique",
            ));
        }

        let dataset = Self {
            time,
            modules,
            wire_pairs,
            variables: Vec::with_capacity(variables.len()),
        };
        variables
            .into_iter()
            .try_fold(dataset, |dataset, variable| dataset.with_variable(variable))
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    pub fn modules(&self) -> &[u32] {
        &self.modules
    }

    pub fn wire_pairs(&self) -> &[u32] {
        &self.wire_pairs
    }

    /// Shape of every variable: (time, module, wire_pair)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.time.len(), self.modules.len(), self.wire_pairs.len())
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    /// Look up a variable by name
    pub fn variable(&self, name: &str) -> Result<&Variable> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| {
                HarpError::invalid_argument(format!(
                    "unknown variable '{}' (available: {})",
                    name,
                    self.variable_names().join(", ")
                ))
            })
    }

    pub fn module_index(&self, module: u32) -> Option<usize> {
        self.modules.binary_search(&module).ok()
    }

    pub fn wire_pair_index(&self, wire_pair: u32) -> Option<usize> {
        self.wire_pairs.binary_search(&wire_pair).ok()
    }

    /// Append a variable, replacing an existing one of the same name
    pub fn with_variable(mut self, variable: Variable) -> Result<Self> {
        let expected = self.shape();
        if variable.data.dim() != expected {
            return Err(HarpError::invalid_argument(format!(
                "variable '{}' has shape {:?}, dataset expects {:?}",
                variable.name,
                variable.data.dim(),
                expected
            )));
        }

        match self.variables.iter_mut().find(|v| v.name == variable.name) {
            Some(existing) => *existing = variable,
            None => self.variables.push(variable),
        }
        Ok(self)
    }

    /// Dataset restricted to a single module
    pub fn select_module(&self, module: u32) -> Result<Self> {
        let index = self.module_index(module).ok_or_else(|| {
            HarpError::invalid_argument(format!(
                "module {} not present (available: {:?})",
                module, self.modules
            ))
        })?;

        Ok(Self {
            time: self.time.clone(),
            modules: vec![module],
            wire_pairs: self.wire_pairs.clone(),
            variables: self
                .variables
                .iter()
                .map(|v| Variable {
                    name: v.name.clone(),
                    unit: v.unit.clone(),
                    data: v.data.slice(s![.., index..index + 1, ..]).to_owned(),
                })
                .collect(),
        })
    }

    /// Dataset without its final `count` time steps
    pub fn drop_last_time_steps(&self, count: usize) -> Self {
        let keep = self.time.len().saturating_sub(count);
        Self {
            time: self.time[..keep].to_vec(),
            modules: self.modules.clone(),
            wire_pairs: self.wire_pairs.clone(),
            variables: self
                .variables
                .iter()
                .map(|v| Variable {
                    name: v.name.clone(),
                    unit: v.unit.clone(),
                    data: v.data.slice_axis(Axis(0), (..keep).into()).to_owned(),
                })
                .collect(),
        }
    }

    /// Time series of one variable at one (module, wire_pair) position
    pub fn series(&self, name: &str, module: u32, wire_pair: u32) -> Result<Vec<f64>> {
        let variable = self.variable(name)?;
        let (m, w) = self
            .module_index(module)
            .zip(self.wire_pair_index(wire_pair))
            .ok_or_else(|| {
                HarpError::invalid_argument(format!(
                    "device {module}:{wire_pair} not present in dataset"
                ))
            })?;
        Ok(variable.data.slice(s![.., m, w]).to_vec())
    }
}

impl fmt::Display for HarpDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (t, m, w) = self.shape();
        writeln!(f, "HarpDataset")?;
        writeln!(f, "Dimensions:  (time: {t}, module: {m}, wire_pair: {w})")?;
        writeln!(f, "Coordinates:")?;
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => writeln!(f, "  * time       {first} .. {last}")?,
            _ => writeln!(f, "  * time       (empty)")?,
        }
        writeln!(f, "  * module     {:?}", self.modules)?;
        writeln!(f, "  * wire_pair  {:?}", self.wire_pairs)?;
        writeln!(f, "Data variables:")?;
        for variable in &self.variables {
            writeln!(
                f,
                "    {:<16} [{}]  {} valid",
                variable.name,
                variable.unit,
                variable.valid_count()
            )?;
        }
        Ok(())
    }
}
