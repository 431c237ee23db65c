//! Salinity evaluation of a regularised salinity harp dataset.
//!
//! Runs freeze-onset detection on the chosen resistance channel and appends
//! brine salinity, liquid/solid fraction and bulk salinity as new variables.
//! The measured channels are left untouched.

use crate::config::EvaluationConfig;
use crate::constants::{derived, salinity_channels};
use crate::dataset::{HarpDataset, Variable};
use crate::error::Result;
use crate::reference::{ReferenceResistance, detect_reference};
use crate::salinity::{
    brine_salinity, bulk_salinity, liquid_fraction, mask_above_freezing, solid_fraction,
};
use ndarray::Array2;
use tracing::debug;

/// Evaluated dataset together with the reference resistance it was derived from
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub dataset: HarpDataset,
    pub reference: ReferenceResistance,
}

/// Derive salinity variables for `dataset` according to `config`
pub fn evaluate(dataset: HarpDataset, config: &EvaluationConfig) -> Result<Evaluation> {
    let dataset = match config.module {
        Some(module) => dataset.select_module(module)?,
        None => dataset,
    };

    let reference = detect_reference(&dataset, &config.resistance_channel, &config.detector)?;
    let temperature = &dataset.variable(salinity_channels::TEMPERATURE)?.data;
    let resistance = &dataset.variable(&config.resistance_channel)?.data;

    // temperature at each device's freeze onset
    let freezing = Array2::from_shape_fn(reference.transition_index.dim(), |(m, w)| {
        reference.transition_index[[m, w]]
            .map(|t| temperature[[t, m, w]])
            .unwrap_or(f64::NAN)
    });

    let brine = brine_salinity(&mask_above_freezing(temperature, &freezing), config.formula);
    let liquid = liquid_fraction(&reference.resistance, resistance);
    let solid = solid_fraction(&liquid);
    let bulk = bulk_salinity(&liquid, &brine);

    debug!(
        "Evaluated {} wire pairs with {} brine salinity",
        reference.wire_pairs.len(),
        config.formula
    );

    let dataset = dataset
        .with_variable(Variable::new(
            derived::BRINE_SALINITY,
            derived::SALINITY_UNIT,
            brine,
        ))?
        .with_variable(Variable::new(
            derived::SOLID_FRACTION,
            derived::FRACTION_UNIT,
            solid,
        ))?
        .with_variable(Variable::new(
            derived::LIQUID_FRACTION,
            derived::FRACTION_UNIT,
            liquid,
        ))?
        .with_variable(Variable::new(
            derived::BULK_SALINITY,
            derived::SALINITY_UNIT,
            bulk,
        ))?;

    Ok(Evaluation { dataset, reference })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::error::HarpError;
    use crate::models::HarpLayout;
    use crate::salinity::BrineFormula;
    use crate::smoothing::SmoothingMethod;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array3;

    /// Salinity harp dataset cooling from 0 to -5 °C with resistance growth from step 50
    fn freezing_dataset() -> HarpDataset {
        let steps = 100;
        let start = NaiveDate::from_ymd_opt(2019, 1, 24)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..steps)
            .map(|i| start + Duration::seconds(60 * i as i64))
            .collect();
        let shape = (steps, 2, 2);
        let resistance =
            Array3::from_shape_fn(shape, |(t, _, _)| 500.0 + 2e-4 * t.saturating_sub(50) as f64);
        let temperature = Array3::from_shape_fn(shape, |(t, _, _)| -0.05 * t as f64);

        let names = HarpLayout::Salinity.channel_names();
        let units = HarpLayout::Salinity.channel_units();
        let variables = names
            .iter()
            .zip(units)
            .map(|(name, unit)| {
                let data = match *name {
                    "r2" | "r16" => resistance.clone(),
                    "temperature" => temperature.clone(),
                    _ => Array3::from_elem(shape, 2.0),
                };
                Variable::new(*name, *unit, data)
            })
            .collect();
        HarpDataset::new(time, vec![0, 1], vec![0, 1], variables).unwrap()
    }

    fn config() -> EvaluationConfig {
        EvaluationConfig::default()
            .with_detector(DetectorConfig::default().with_method(SmoothingMethod::MovingMedian))
    }

    #[test]
    fn test_evaluate_appends_derived_variables() {
        let evaluation = evaluate(freezing_dataset(), &config()).unwrap();
        let ds = &evaluation.dataset;

        for name in [
            "brine_salinity",
            "solid_fraction",
            "liquid_fraction",
            "bulk_salinity",
        ] {
            assert!(ds.contains(name), "missing {name}");
        }
        assert_eq!(ds.variable("brine_salinity").unwrap().unit, "g/kg");
        assert_eq!(ds.variables().len(), 10);
    }

    #[test]
    fn test_brine_salinity_masked_above_onset() {
        let evaluation = evaluate(freezing_dataset(), &config()).unwrap();
        let onset = evaluation.reference.transition_index[[0, 0]].unwrap();
        let brine = evaluation.dataset.series("brine_salinity", 0, 0).unwrap();

        assert!(brine[..onset].iter().all(|v| v.is_nan()));
        assert!(brine[onset..].iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn test_fractions_are_consistent() {
        let evaluation = evaluate(freezing_dataset(), &config()).unwrap();
        let ds = &evaluation.dataset;
        let liquid = ds.series("liquid_fraction", 1, 1).unwrap();
        let solid = ds.series("solid_fraction", 1, 1).unwrap();

        let onset = evaluation.reference.transition_index[[1, 1]].unwrap();
        // resistance below R0 before the onset gives ratios above one
        assert!(liquid.iter().all(|v| v.is_nan() || *v <= 1.0));
        assert_eq!(liquid[onset], 1.0);
        assert!(liquid[99] < 1.0);
        for (l, s) in liquid.iter().zip(&solid) {
            if l.is_finite() {
                assert!((l + s - 1.0).abs() < 1e-12);
            } else {
                assert!(s.is_nan());
            }
        }
    }

    #[test]
    fn test_original_channels_untouched() {
        let original = freezing_dataset();
        let evaluation = evaluate(original.clone(), &config()).unwrap();
        assert_eq!(
            evaluation.dataset.variable("r16").unwrap(),
            original.variable("r16").unwrap()
        );
    }

    #[test]
    fn test_module_selection() {
        let evaluation = evaluate(freezing_dataset(), &config().with_module(1)).unwrap();
        assert_eq!(evaluation.dataset.modules(), &[1]);
        assert_eq!(evaluation.reference.resistance.dim(), (1, 2));

        let result = evaluate(freezing_dataset(), &config().with_module(9));
        assert!(matches!(result, Err(HarpError::InvalidArgument { .. })));
    }

    #[test]
    fn test_formula_choice_changes_brine_salinity() {
        let assur = evaluate(
            freezing_dataset(),
            &config().with_formula(BrineFormula::Assur),
        )
        .unwrap();
        let vancoppenolle = evaluate(freezing_dataset(), &config()).unwrap();

        let a = assur.dataset.series("brine_salinity", 0, 0).unwrap();
        let v = vancoppenolle.dataset.series("brine_salinity", 0, 0).unwrap();
        assert!((a[99] - v[99]).abs() > 1.0);
    }
}
