//! Reconstruction of multiplexer scan cycles.
//!
//! The harp multiplexer reports one (module, wire_pair) at a time, so a log is
//! a stream of interleaved single-channel samples with individual timestamps.
//! The regulariser groups samples per device and rebuilds one row per scan
//! cycle, yielding a dense `(time, module, wire_pair)` array per channel.
//!
//! Cycles are anchored at the first device in (module, wire_pair) order: each
//! of its timestamps opens a cycle, and every device contributes its first
//! valid sample up to the next anchor. The last cycle is never complete at
//! end of file and is dropped.
//!
//! Light harp diodes read at several amplifier gains are separate devices;
//! each gain is regularised on its own and stored in per-gain variables.

use crate::constants::light_channels;
use crate::dataset::{HarpDataset, Variable};
use crate::error::{HarpError, Result};
use crate::models::{DeviceId, HarpLayout, LogRecord};
use chrono::NaiveDateTime;
use ndarray::Array3;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};

/// One sample of a single device
#[derive(Debug, Clone)]
struct Sample {
    time: NaiveDateTime,
    values: Vec<f64>,
}

/// Output variable fed by one channel, optionally restricted to one gain
#[derive(Debug, Clone)]
struct Slot {
    name: String,
    unit: &'static str,
    channel: usize,
    gain: Option<u32>,
}

impl Slot {
    fn accepts(&self, device: &DeviceId) -> bool {
        self.gain.is_none() || self.gain == device.amplifier
    }
}

/// One variable per channel, or per channel and gain when a log mixes gains
fn variable_slots(
    names: &'static [&'static str],
    units: &'static [&'static str],
    gains: &BTreeSet<u32>,
) -> Vec<Slot> {
    let channels = names.iter().zip(units).enumerate();
    if gains.len() < 2 {
        return channels
            .map(|(channel, (name, unit))| Slot {
                name: name.to_string(),
                unit: *unit,
                channel,
                gain: None,
            })
            .collect();
    }

    channels
        .filter(|(_, (name, _))| **name != light_channels::AMPLIFIER)
        .flat_map(|(channel, (name, unit))| {
            gains.iter().map(move |gain| Slot {
                name: format!("{name}_amp{gain}"),
                unit: *unit,
                channel,
                gain: Some(*gain),
            })
        })
        .collect()
}

/// Builds a `HarpDataset` from tokenized records
#[derive(Debug, Clone)]
pub struct Regularizer {
    layout: HarpLayout,
    source: PathBuf,
}

impl Regularizer {
    pub fn new(layout: HarpLayout) -> Self {
        Self {
            layout,
            source: PathBuf::new(),
        }
    }

    /// File the records came from, used in error messages
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Regularise `records` (in file order) into a dense dataset
    pub fn build(&self, records: Vec<LogRecord>) -> Result<HarpDataset> {
        let names = self.layout.channel_names();
        let units = self.layout.channel_units();

        if records.is_empty() {
            return Err(HarpError::data_format(
                &self.source,
                "no parseable header/records found",
            ));
        }

        let columns = group_by_device(records, names.len());
        let modules: Vec<u32> = columns
            .keys()
            .map(|d| d.module)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let wire_pairs: Vec<u32> = columns
            .keys()
            .map(|d| d.wire_pair)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let gains: BTreeSet<u32> = columns.keys().filter_map(|d| d.amplifier).collect();
        let slots = variable_slots(names, units, &gains);
        if gains.len() > 1 {
            debug!("Splitting channels over amplifier gains {:?}", gains);
        }

        // first device in (module, wire_pair) order anchors the scan cycles
        let (anchor, anchor_samples) = columns
            .iter()
            .next()
            .ok_or_else(|| HarpError::data_format(&self.source, "no devices found"))?;
        let anchors: Vec<NaiveDateTime> = anchor_samples.iter().map(|s| s.time).collect();
        let cycles = anchors.len().saturating_sub(1);

        if cycles == 0 {
            warn!(
                "{}: reference device {} reported only {} sample(s), no complete scan cycle",
                self.source.display(),
                anchor,
                anchors.len()
            );
        }

        let mut data: Vec<Array3<f64>> = (0..slots.len())
            .map(|_| Array3::from_elem((cycles, modules.len(), wire_pairs.len()), f64::NAN))
            .collect();

        for (device, samples) in &columns {
            let m = modules.binary_search(&device.module).unwrap_or_default();
            let w = wire_pairs.binary_search(&device.wire_pair).unwrap_or_default();

            for k in 0..cycles {
                let (start, end) = (anchors[k], anchors[k + 1]);
                let first = samples.partition_point(|s| s.time < start);
                let window = samples[first..].iter().take_while(|s| s.time < end);

                for (slot, values) in slots.iter().zip(data.iter_mut()) {
                    if !slot.accepts(device) {
                        continue;
                    }
                    if let Some(value) = window
                        .clone()
                        .map(|s| s.values[slot.channel])
                        .find(|v| !v.is_nan())
                    {
                        values[[k, m, w]] = value;
                    }
                }
            }
        }

        let reported = columns
            .keys()
            .map(|d| (d.module, d.wire_pair))
            .collect::<BTreeSet<_>>()
            .len();
        let expected = modules.len() * wire_pairs.len();
        if reported < expected {
            debug!(
                "{} of {} module/wire_pair combinations never reported, filled with NaN",
                expected - reported,
                expected
            );
        }
        debug!(
            "Regularised {} devices into {} scan cycles ({} modules x {} wire pairs)",
            columns.len(),
            cycles,
            modules.len(),
            wire_pairs.len()
        );

        let variables = slots
            .into_iter()
            .zip(data)
            .map(|(slot, values)| Variable::new(slot.name, slot.unit, values))
            .collect();

        HarpDataset::new(anchors[..cycles].to_vec(), modules, wire_pairs, variables)
    }
}

/// Group records per device, sorted by time; for equal timestamps the later
/// record in file order wins.
fn group_by_device(records: Vec<LogRecord>, channels: usize) -> BTreeMap<DeviceId, Vec<Sample>> {
    let mut grouped: BTreeMap<DeviceId, Vec<Sample>> = BTreeMap::new();
    for record in records {
        let mut values = record.values;
        values.resize(channels, f64::NAN);
        grouped.entry(record.device).or_default().push(Sample {
            time: record.time,
            values,
        });
    }

    grouped
        .into_iter()
        .map(|(device, mut samples)| {
            // stable: file order is kept among equal timestamps
            samples.sort_by_key(|s| s.time);
            let mut deduped: Vec<Sample> = Vec::with_capacity(samples.len());
            for sample in samples {
                match deduped.last_mut() {
                    Some(last) if last.time == sample.time => *last = sample,
                    _ => deduped.push(sample),
                }
            }
            (device, deduped)
        })
        .collect()
}
