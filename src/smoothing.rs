//! Series smoothing used by the reference resistance detector.
//!
//! Each strategy implements [`Smoother`]: it maps a series to a series of the
//! same length and index. Missing samples (NaN) stay missing in the output;
//! the filters bridge interior gaps by linear interpolation internally.

use crate::config::DetectorConfig;
use crate::error::{HarpError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability shared by all smoothing strategies
pub trait Smoother {
    /// Smooth `series`, returning a series of the same length
    fn smooth(&self, series: &[f64]) -> Vec<f64>;
}

/// Smoothing strategies selectable for freeze-onset detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SmoothingMethod {
    MovingMedian,
    Butterworth,
    SavitzkyGolay,
}

impl SmoothingMethod {
    pub const ALL: [SmoothingMethod; 3] = [
        SmoothingMethod::MovingMedian,
        SmoothingMethod::Butterworth,
        SmoothingMethod::SavitzkyGolay,
    ];

    /// Build the smoother for this method from detector parameters
    pub fn smoother(&self, config: &DetectorConfig) -> Result<Box<dyn Smoother>> {
        Ok(match self {
            SmoothingMethod::MovingMedian => Box::new(MovingMedian::new(config.median_window)),
            SmoothingMethod::Butterworth => Box::new(Butterworth::low_pass(
                config.butterworth_order,
                config.butterworth_cutoff,
            )?),
            SmoothingMethod::SavitzkyGolay => Box::new(SavitzkyGolay::new(
                config.savgol_window,
                config.savgol_polyorder,
            )?),
        })
    }
}

impl FromStr for SmoothingMethod {
    type Err = HarpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "median" | "moving-median" | "moving_median" => Ok(SmoothingMethod::MovingMedian),
            "butterworth" | "butter" => Ok(SmoothingMethod::Butterworth),
            "savgol" | "savitzky-golay" | "savitzky_golay" => Ok(SmoothingMethod::SavitzkyGolay),
            other => Err(HarpError::invalid_argument(format!(
                "unknown smoothing method '{other}' (expected median, butterworth or savgol)"
            ))),
        }
    }
}

impl fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SmoothingMethod::MovingMedian => "median",
            SmoothingMethod::Butterworth => "butterworth",
            SmoothingMethod::SavitzkyGolay => "savgol",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Moving median
// =============================================================================

/// Centered moving median; windows shrink at the series edges
#[derive(Debug, Clone)]
pub struct MovingMedian {
    half_width: usize,
}

impl MovingMedian {
    /// Even windows are widened by one sample to stay centered
    pub fn new(window: usize) -> Self {
        Self {
            half_width: window / 2,
        }
    }
}

impl Smoother for MovingMedian {
    fn smooth(&self, series: &[f64]) -> Vec<f64> {
        let n = series.len();
        let mut buffer = Vec::with_capacity(2 * self.half_width + 1);

        (0..n)
            .map(|i| {
                let start = i.saturating_sub(self.half_width);
                let end = (i + self.half_width + 1).min(n);
                buffer.clear();
                buffer.extend(series[start..end].iter().copied().filter(|v| !v.is_nan()));
                median(&mut buffer)
            })
            .collect()
    }
}

/// Median of finite values; NaN for an empty slice
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    }
}

// =============================================================================
// Butterworth low-pass (zero phase)
// =============================================================================

/// One filter section in direct form II transposed; first-order sections
/// keep `b2 = a2 = 0`.
#[derive(Debug, Clone, Copy)]
struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    /// Filter `x` in place, starting from the steady state for `x[0]`
    fn apply(&self, x: &mut [f64]) {
        let Some(&x0) = x.first() else {
            return;
        };
        let mut z1 = x0 * (1.0 - self.b0);
        let mut z2 = x0 * (self.b2 - self.a2);

        for v in x.iter_mut() {
            let input = *v;
            let output = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * output + z2;
            z2 = self.b2 * input - self.a2 * output;
            *v = output;
        }
    }
}

/// Butterworth low-pass applied forward and backward (no phase shift)
#[derive(Debug, Clone)]
pub struct Butterworth {
    sections: Vec<Section>,
    order: usize,
}

impl Butterworth {
    /// Design a low-pass of `order` with `cutoff` given as fraction of Nyquist
    pub fn low_pass(order: usize, cutoff: f64) -> Result<Self> {
        if order == 0 || !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(HarpError::invalid_argument(format!(
                "Butterworth low-pass needs order >= 1 and 0 < cutoff < 1, got {order} and {cutoff}"
            )));
        }

        // bilinear transform with prewarped cutoff
        let k = (std::f64::consts::PI * cutoff / 2.0).tan();
        let k2 = k * k;
        let mut sections = Vec::with_capacity(order.div_ceil(2));

        for pair in 1..=order / 2 {
            let damping =
                2.0 * ((2 * pair - 1) as f64 * std::f64::consts::PI / (2 * order) as f64).sin();
            let norm = 1.0 / (1.0 + damping * k + k2);
            let b0 = k2 * norm;
            sections.push(Section {
                b0,
                b1: 2.0 * b0,
                b2: b0,
                a1: 2.0 * (k2 - 1.0) * norm,
                a2: (1.0 - damping * k + k2) * norm,
            });
        }

        if order % 2 == 1 {
            let b0 = k / (1.0 + k);
            sections.push(Section {
                b0,
                b1: b0,
                b2: 0.0,
                a1: (k - 1.0) / (k + 1.0),
                a2: 0.0,
            });
        }

        Ok(Self { sections, order })
    }

    fn filter_once(&self, x: &mut [f64]) {
        for section in &self.sections {
            section.apply(x);
        }
    }
}

impl Smoother for Butterworth {
    fn smooth(&self, series: &[f64]) -> Vec<f64> {
        let Some((filled, missing)) = fill_gaps(series) else {
            return series.to_vec();
        };
        let n = filled.len();
        if n < 2 {
            return series.to_vec();
        }

        // odd extension at both ends suppresses start-up transients
        let pad = (3 * (self.order + 1)).min(n - 1);
        let first = filled[0];
        let last = filled[n - 1];
        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - filled[i]));
        extended.extend_from_slice(&filled);
        extended.extend((1..=pad).map(|i| 2.0 * last - filled[n - 1 - i]));

        self.filter_once(&mut extended);
        extended.reverse();
        self.filter_once(&mut extended);
        extended.reverse();

        extended[pad..pad + n]
            .iter()
            .zip(&missing)
            .map(|(&v, &gap)| if gap { f64::NAN } else { v })
            .collect()
    }
}

// =============================================================================
// Savitzky-Golay
// =============================================================================

/// Least-squares polynomial smoothing over a sliding window.
///
/// Edge samples are evaluated from the polynomial fitted to the first or
/// last full window.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    polyorder: usize,
}

impl SavitzkyGolay {
    pub fn new(window: usize, polyorder: usize) -> Result<Self> {
        let window = if window % 2 == 0 { window + 1 } else { window };
        if polyorder >= window {
            return Err(HarpError::invalid_argument(format!(
                "Savitzky-Golay polyorder {polyorder} must be less than window {window}"
            )));
        }
        Ok(Self { window, polyorder })
    }

    /// Weights for evaluating the fitted polynomial at each window position
    fn weights(window: usize, polyorder: usize) -> Option<Vec<Vec<f64>>> {
        let half = (window / 2) as f64;
        let terms = polyorder + 1;
        let design: Vec<Vec<f64>> = (0..window)
            .map(|j| {
                let x = j as f64 - half;
                (0..terms).map(|k| x.powi(k as i32)).collect()
            })
            .collect();

        let mut normal = vec![vec![0.0; terms]; terms];
        for row in &design {
            for a in 0..terms {
                for b in 0..terms {
                    normal[a][b] += row[a] * row[b];
                }
            }
        }

        (0..window)
            .map(|position| {
                let x = position as f64 - half;
                let basis: Vec<f64> = (0..terms).map(|k| x.powi(k as i32)).collect();
                let coefficients = solve(normal.clone(), basis)?;
                Some(
                    design
                        .iter()
                        .map(|row| row.iter().zip(&coefficients).map(|(a, c)| a * c).sum::<f64>())
                        .collect(),
                )
            })
            .collect()
    }
}

impl Smoother for SavitzkyGolay {
    fn smooth(&self, series: &[f64]) -> Vec<f64> {
        let Some((filled, missing)) = fill_gaps(series) else {
            return series.to_vec();
        };
        let n = filled.len();

        // shrink the window for short series, keeping it odd
        let window = if n >= self.window {
            self.window
        } else if n % 2 == 1 {
            n
        } else {
            n.saturating_sub(1)
        };
        if window <= self.polyorder {
            return series.to_vec();
        }
        let Some(weights) = Self::weights(window, self.polyorder) else {
            return series.to_vec();
        };
        let half = window / 2;

        (0..n)
            .map(|i| {
                if missing[i] {
                    return f64::NAN;
                }
                let (start, position) = if i < half {
                    (0, i)
                } else if i + half >= n {
                    (n - window, i + window - n)
                } else {
                    (i - half, half)
                };
                filled[start..start + window]
                    .iter()
                    .zip(&weights[position])
                    .map(|(x, w)| x * w)
                    .sum::<f64>()
            })
            .collect()
    }
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < f64::EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Bridge NaN gaps: linear interpolation inside, nearest value at the edges.
///
/// Returns the filled series and the mask of originally missing samples, or
/// `None` when no sample is finite.
fn fill_gaps(series: &[f64]) -> Option<(Vec<f64>, Vec<bool>)> {
    let missing: Vec<bool> = series.iter().map(|v| !v.is_finite()).collect();
    let valid: Vec<usize> = (0..series.len()).filter(|&i| !missing[i]).collect();
    let (&first, &last) = (valid.first()?, valid.last()?);

    let mut filled = series.to_vec();
    filled[..first].fill(series[first]);
    filled[last + 1..].fill(series[last]);
    for pair in valid.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let step = (series[b] - series[a]) / (b - a) as f64;
        for i in a + 1..b {
            filled[i] = series[a] + step * (i - a) as f64;
        }
    }

    Some((filled, missing))
}

/// Centered difference `(x[i + lag] - x[i - lag]) / (2 lag)`, NaN out of range
pub fn centered_difference(series: &[f64], lag: usize) -> Vec<f64> {
    let n = series.len();
    (0..n)
        .map(|i| {
            if lag == 0 || i < lag || i + lag >= n {
                f64::NAN
            } else {
                (series[i + lag] - series[i - lag]) / (2 * lag) as f64
            }
        })
        .collect()
}
