//! Brine salinity and phase fraction formulas.
//!
//! Pure functions over arrays. Brine salinity follows one of three published
//! cubic fits `S = a + bT + cT² + dT³`; liquid fraction is the resistance
//! ratio `R0 / R`, which is physically bounded by one.

use crate::constants::brine_coefficients;
use crate::error::{HarpError, Result};
use ndarray::{Array, Array2, Array3, Axis, Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Published brine salinity polynomials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrineFormula {
    /// Assur (1958)
    Assur,
    /// Notz & Worster (2009)
    NotzWorster,
    /// Vancoppenolle et al. (2019)
    Vancoppenolle,
}

impl BrineFormula {
    /// Coefficients `[a, b, c, d]`
    pub fn coefficients(&self) -> [f64; 4] {
        match self {
            BrineFormula::Assur => brine_coefficients::ASSUR,
            BrineFormula::NotzWorster => brine_coefficients::NOTZ_WORSTER,
            BrineFormula::Vancoppenolle => brine_coefficients::VANCOPPENOLLE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BrineFormula::Assur => "Assur",
            BrineFormula::NotzWorster => "N&W09",
            BrineFormula::Vancoppenolle => "Vancoppenolle",
        }
    }

    /// Brine salinity at a single temperature (°C)
    pub fn evaluate(&self, temperature: f64) -> f64 {
        let [a, b, c, d] = self.coefficients();
        a + temperature * (b + temperature * (c + temperature * d))
    }

    /// Multi-line description of the polynomial and its coefficients
    pub fn describe(&self) -> String {
        let [a, b, c, d] = self.coefficients();
        format!(
            "For {}, the brine salinity is calculated as\n\
             \tS_brine = a + b*T + c*T**2 + d*T**3\n\
             with:\n\
             \ta = {a}\n\tb = {b}\n\tc = {c}\n\td = {d}",
            self.name()
        )
    }
}

impl FromStr for BrineFormula {
    type Err = HarpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Assur" | "assur" => Ok(BrineFormula::Assur),
            "N&W09" | "notz-worster" | "NotzWorster" => Ok(BrineFormula::NotzWorster),
            "Vancoppenolle" | "vancoppenolle" => Ok(BrineFormula::Vancoppenolle),
            other => Err(HarpError::invalid_argument(format!(
                "unknown brine salinity formula '{other}' (expected Assur, N&W09 or Vancoppenolle)"
            ))),
        }
    }
}

impl fmt::Display for BrineFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Brine salinity (g/kg) for temperatures in °C; NaN propagates
pub fn brine_salinity<D: Dimension>(
    temperature: &Array<f64, D>,
    formula: BrineFormula,
) -> Array<f64, D> {
    temperature.mapv(|t| formula.evaluate(t))
}

/// Brine salinity for a formula given by name
pub fn brine_salinity_named<D: Dimension>(
    temperature: &Array<f64, D>,
    formula: &str,
) -> Result<Array<f64, D>> {
    Ok(brine_salinity(temperature, formula.parse()?))
}

/// `R0 / R` per cell, with R0 broadcast along time; ratios above one are masked
pub fn liquid_fraction(reference: &Array2<f64>, resistance: &Array3<f64>) -> Array3<f64> {
    let mut fraction = resistance.clone();
    for mut step in fraction.axis_iter_mut(Axis(0)) {
        Zip::from(&mut step).and(reference).for_each(|r, &r0| {
            let ratio = r0 / *r;
            *r = if ratio.is_finite() && ratio <= 1.0 {
                ratio
            } else {
                f64::NAN
            };
        });
    }
    fraction
}

/// `1 - liquid fraction`
pub fn solid_fraction(liquid: &Array3<f64>) -> Array3<f64> {
    liquid.mapv(|f| 1.0 - f)
}

/// `liquid fraction * brine salinity`
pub fn bulk_salinity(liquid: &Array3<f64>, brine: &Array3<f64>) -> Array3<f64> {
    Zip::from(liquid)
        .and(brine)
        .map_collect(|&fraction, &salinity| fraction * salinity)
}

/// Keep temperatures at or below each cell's freezing temperature
pub fn mask_above_freezing(temperature: &Array3<f64>, freezing: &Array2<f64>) -> Array3<f64> {
    let mut masked = temperature.clone();
    for mut step in masked.axis_iter_mut(Axis(0)) {
        Zip::from(&mut step).and(freezing).for_each(|t, &t_freeze| {
            if !(*t <= t_freeze) {
                *t = f64::NAN;
            }
        });
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, array};

    #[test]
    fn test_brine_salinity_at_zero() {
        let zero = array![0.0];
        assert_eq!(brine_salinity(&zero, BrineFormula::Assur)[0], -1.20);
        assert_eq!(brine_salinity(&zero, BrineFormula::Vancoppenolle)[0], 0.0);
        assert_eq!(brine_salinity(&zero, BrineFormula::NotzWorster)[0], 0.0);
    }

    #[test]
    fn test_brine_salinity_values() {
        let t = array![-2.0];
        let expected = -1.20 + 21.8 * 2.0 - 0.919 * 4.0 + 0.0178 * 8.0;
        assert!((brine_salinity(&t, BrineFormula::Assur)[0] - expected).abs() < 1e-12);

        let expected = 18.7 * 2.0 - 0.519 * 4.0 + 0.00535 * 8.0;
        assert!((BrineFormula::Vancoppenolle.evaluate(-2.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_brine_salinity_keeps_shape() {
        let t = Array1::linspace(-10.0, 0.0, 10);
        let s = brine_salinity(&t, BrineFormula::Assur);
        assert_eq!(s.len(), t.len());

        let t = Array3::from_elem((2, 3, 4), f64::NAN);
        let s = brine_salinity(&t, BrineFormula::Vancoppenolle);
        assert_eq!(s.dim(), (2, 3, 4));
        assert!(s.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_unknown_formula() {
        let result = brine_salinity_named(&array![-1.0], "Cox&Weeks");
        assert!(matches!(result, Err(HarpError::InvalidArgument { .. })));
        assert!(brine_salinity_named(&array![-1.0], "N&W09").is_ok());
    }

    #[test]
    fn test_liquid_fraction_masks_ratios_above_one() {
        let reference = array![[500.0, 400.0]];
        let resistance =
            Array3::from_shape_vec((2, 1, 2), vec![1000.0, 200.0, 500.0, f64::NAN]).unwrap();

        let fraction = liquid_fraction(&reference, &resistance);
        assert_eq!(fraction[[0, 0, 0]], 0.5);
        assert!(fraction[[0, 0, 1]].is_nan());
        assert_eq!(fraction[[1, 0, 0]], 1.0);
        assert!(fraction[[1, 0, 1]].is_nan());
        assert!(fraction.iter().all(|v| v.is_nan() || *v <= 1.0));
    }

    #[test]
    fn test_liquid_fraction_zero_resistance_is_missing() {
        let fraction = liquid_fraction(&array![[500.0]], &Array3::zeros((1, 1, 1)));
        assert!(fraction[[0, 0, 0]].is_nan());
    }

    #[test]
    fn test_solid_and_bulk_propagate_missing() {
        let liquid = Array3::from_shape_vec((1, 1, 3), vec![0.25, f64::NAN, 1.0]).unwrap();
        let brine = Array3::from_shape_vec((1, 1, 3), vec![40.0, 30.0, f64::NAN]).unwrap();

        let solid = solid_fraction(&liquid);
        assert_eq!(solid[[0, 0, 0]], 0.75);
        assert!(solid[[0, 0, 1]].is_nan());

        let bulk = bulk_salinity(&liquid, &brine);
        assert_eq!(bulk[[0, 0, 0]], 10.0);
        assert!(bulk[[0, 0, 1]].is_nan());
        assert!(bulk[[0, 0, 2]].is_nan());
    }

    #[test]
    fn test_mask_above_freezing() {
        let freezing = array![[-1.5, f64::NAN]];
        let temperature =
            Array3::from_shape_vec((2, 1, 2), vec![-1.0, -3.0, -1.5, -4.0]).unwrap();

        let masked = mask_above_freezing(&temperature, &freezing);
        assert!(masked[[0, 0, 0]].is_nan());
        assert_eq!(masked[[1, 0, 0]], -1.5);
        assert!(masked[[0, 0, 1]].is_nan());
        assert!(masked[[1, 0, 1]].is_nan());
    }

    #[test]
    fn test_describe_lists_coefficients() {
        let text = BrineFormula::Assur.describe();
        assert!(text.contains("a = -1.2"));
        assert!(text.contains("d = -0.0178"));
    }
}
