//! Reference resistance (R0) detection.
//!
//! While a wire pair sits in liquid its resistance is flat; once freezing
//! starts the resistance grows steadily. The detector smooths each resistance
//! series, takes a centered difference over `lag` samples, smooths that with a
//! moving median and reports the first sample whose derivative lies strictly
//! inside the tolerance band. The raw resistance at that sample is R0.

use crate::config::DetectorConfig;
use crate::dataset::HarpDataset;
use crate::error::Result;
use crate::smoothing::{MovingMedian, Smoother, centered_difference};
use chrono::NaiveDateTime;
use ndarray::{Array2, ArrayView1, Axis, s};
use tracing::{debug, warn};

/// Detected freeze onset per (module, wire_pair)
#[derive(Debug, Clone)]
pub struct ReferenceResistance {
    pub channel: String,
    pub modules: Vec<u32>,
    pub wire_pairs: Vec<u32>,
    /// R0 per (module, wire_pair); NaN where no transition was found
    pub resistance: Array2<f64>,
    /// Time index of the transition per (module, wire_pair)
    pub transition_index: Array2<Option<usize>>,
    /// Timestamp of the transition per (module, wire_pair)
    pub transition_time: Array2<Option<NaiveDateTime>>,
}

impl ReferenceResistance {
    /// R0 values of one module, one per wire pair
    pub fn for_module(&self, module: u32) -> Option<ArrayView1<'_, f64>> {
        let m = self.modules.iter().position(|&v| v == module)?;
        Some(self.resistance.index_axis(Axis(0), m))
    }

    /// R0 of a single device
    pub fn get(&self, module: u32, wire_pair: u32) -> Option<f64> {
        let m = self.modules.iter().position(|&v| v == module)?;
        let w = self.wire_pairs.iter().position(|&v| v == wire_pair)?;
        Some(self.resistance[[m, w]])
    }

    /// Number of devices where a transition was found
    pub fn detected_count(&self) -> usize {
        self.transition_index.iter().filter(|i| i.is_some()).count()
    }
}

/// Detect R0 for every (module, wire_pair) of `channel`
pub fn detect_reference(
    dataset: &HarpDataset,
    channel: &str,
    config: &DetectorConfig,
) -> Result<ReferenceResistance> {
    config.validate()?;
    let variable = dataset.variable(channel)?;
    let smoother = config.method.smoother(config)?;
    let derivative_filter = MovingMedian::new(config.median_window);
    let (low, high) = config.sorted_tolerance();

    let (_, module_count, wire_pair_count) = dataset.shape();
    let mut resistance = Array2::from_elem((module_count, wire_pair_count), f64::NAN);
    let mut transition_index = Array2::from_elem((module_count, wire_pair_count), None);
    let mut transition_time = Array2::from_elem((module_count, wire_pair_count), None);

    for m in 0..module_count {
        for w in 0..wire_pair_count {
            let series = variable.data.slice(s![.., m, w]).to_vec();
            let smoothed = smoother.smooth(&series);
            let gradient = derivative_filter.smooth(&centered_difference(&smoothed, config.lag));

            match first_in_band(&gradient, low, high) {
                Some(index) => {
                    resistance[[m, w]] = series[index];
                    transition_index[[m, w]] = Some(index);
                    transition_time[[m, w]] = Some(dataset.time()[index]);
                }
                None => warn!(
                    "No freeze onset for {}:{} ({} derivative never within ({}, {}))",
                    dataset.modules()[m],
                    dataset.wire_pairs()[w],
                    channel,
                    low,
                    high
                ),
            }
        }
    }

    let reference = ReferenceResistance {
        channel: channel.to_string(),
        modules: dataset.modules().to_vec(),
        wire_pairs: dataset.wire_pairs().to_vec(),
        resistance,
        transition_index,
        transition_time,
    };
    debug!(
        "Detected {} of {} freeze onsets on '{}' using {} smoothing",
        reference.detected_count(),
        module_count * wire_pair_count,
        channel,
        config.method
    );

    Ok(reference)
}

/// First index with `low < value < high`
fn first_in_band(values: &[f64], low: f64, high: f64) -> Option<usize> {
    values.iter().position(|&v| v > low && v < high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Variable;
    use crate::error::HarpError;
    use crate::smoothing::SmoothingMethod;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array3;

    /// Flat at 500 Ohm, then rising by `slope` per sample from `onset`
    fn ramp_dataset(steps: usize, onset: usize, slope: f64) -> HarpDataset {
        let start = NaiveDate::from_ymd_opt(2019, 1, 24)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let time = (0..steps)
            .map(|i| start + Duration::seconds(60 * i as i64))
            .collect();
        let data = Array3::from_shape_fn((steps, 2, 3), |(t, m, w)| {
            500.0 + (m * 3 + w) as f64 + slope * t.saturating_sub(onset) as f64
        });
        HarpDataset::new(
            time,
            vec![0, 1],
            vec![0, 1, 2],
            vec![Variable::new("r16", "Ohm", data)],
        )
        .unwrap()
    }

    #[test]
    fn test_first_in_band_is_strict() {
        let values = [f64::NAN, 1e-4, 2e-4, 3e-4];
        assert_eq!(first_in_band(&values, 1e-4, 3e-4), Some(2));
        assert_eq!(first_in_band(&[f64::NAN, 0.0], 1e-4, 3e-4), None);
    }

    #[test]
    fn test_detects_onset_for_every_method() {
        let dataset = ramp_dataset(100, 50, 2e-4);
        for method in SmoothingMethod::ALL {
            let config = DetectorConfig::default().with_method(method);
            let reference = detect_reference(&dataset, "r16", &config).unwrap();

            assert_eq!(reference.resistance.dim(), (2, 3));
            assert_eq!(reference.detected_count(), 6, "{method}");
            for index in reference.transition_index.iter() {
                let index = index.unwrap();
                assert!(index.abs_diff(50) <= 20, "{method}: onset at {index}");
            }
        }
    }

    #[test]
    fn test_reference_is_raw_resistance_at_onset() {
        let dataset = ramp_dataset(100, 50, 2e-4);
        let reference = detect_reference(&dataset, "r16", &DetectorConfig::default()).unwrap();

        let index = reference.transition_index[[1, 2]].unwrap();
        let series = dataset.series("r16", 1, 2).unwrap();
        assert_eq!(reference.get(1, 2), Some(series[index]));
        assert_eq!(reference.transition_time[[1, 2]], Some(dataset.time()[index]));
        assert_eq!(reference.for_module(1).unwrap().len(), 3);
    }

    #[test]
    fn test_reversed_tolerance_gives_same_result() {
        let dataset = ramp_dataset(100, 50, 2e-4);
        let forward = detect_reference(
            &dataset,
            "r16",
            &DetectorConfig::default().with_tolerance(1e-4, 3e-4),
        )
        .unwrap();
        let reversed = detect_reference(
            &dataset,
            "r16",
            &DetectorConfig::default().with_tolerance(3e-4, 1e-4),
        )
        .unwrap();
        assert_eq!(forward.transition_index, reversed.transition_index);
    }

    #[test]
    fn test_flat_series_has_no_transition() {
        let dataset = ramp_dataset(100, 200, 2e-4);
        let reference = detect_reference(&dataset, "r16", &DetectorConfig::default()).unwrap();

        assert_eq!(reference.detected_count(), 0);
        assert!(reference.resistance.iter().all(|v| v.is_nan()));
        assert_eq!(reference.wire_pairs.len(), 3);
    }

    #[test]
    fn test_unknown_channel() {
        let dataset = ramp_dataset(10, 5, 2e-4);
        let result = detect_reference(&dataset, "r10", &DetectorConfig::default());
        assert!(matches!(result, Err(HarpError::InvalidArgument { .. })));
    }
}
