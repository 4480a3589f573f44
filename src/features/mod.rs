//! Feature extraction over the repeats of each stimulus condition and
//! aggregation of the per sweep values into mean and standard deviation.
//!
//! The per sweep computation is delegated to a [`FeatureCalculator`], a
//! reference implementation lives in [`basic`].

use std::{collections::BTreeMap, fs::File, path::Path};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::{STD_FLOOR, STD_MEAN_FRACTION};
use crate::error::{FeatureError, Result};
use crate::normalize::read_trace_file;
use crate::protocol::ProtocolMap;
use crate::stimulus::{distinct_id_of, StimulusType};
use crate::variance::correct_voltage_feature_std;

pub mod basic;


/// Spike count feature, used to tell spiking from non-spiking conditions
pub const SPIKECOUNT: &str = "Spikecount";
/// Spike peak times, never modelled statistically
pub const PEAK_TIME: &str = "peak_time";
/// Depolarization block check feature
pub const DEPOL_BLOCK: &str = "depol_block";
/// Axon initial segment initiation check feature
pub const CHECK_AIS_INITIATION: &str = "check_AISInitiation";

/// Mean, standard deviation and the raw per repeat values of one feature
///
/// Serialized as `[mean, std]` or `[mean, std, raw]`, `mean` and `std` are
/// `null` for features without a meaningful statistic such as `peak_time`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "FeatureStatRepr", into = "FeatureStatRepr")]
pub struct FeatureStat {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    /// Values of every valid repeat
    pub raw: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum FeatureStatRepr {
    WithRaw(Option<f64>, Option<f64>, Vec<Vec<f64>>),
    Pair(Option<f64>, Option<f64>),
}

impl From<FeatureStatRepr> for FeatureStat {
    fn from(repr: FeatureStatRepr) -> Self {
        match repr {
            FeatureStatRepr::WithRaw(mean, std, raw) => FeatureStat { mean, std, raw: Some(raw) },
            FeatureStatRepr::Pair(mean, std) => FeatureStat { mean, std, raw: None },
        }
    }
}

impl From<FeatureStat> for FeatureStatRepr {
    fn from(stat: FeatureStat) -> Self {
        match stat.raw {
            Some(raw) => FeatureStatRepr::WithRaw(stat.mean, stat.std, raw),
            None => FeatureStatRepr::Pair(stat.mean, stat.std),
        }
    }
}

impl FeatureStat {
    /// Feature with a known mean and standard deviation and no raw values
    pub fn new(mean: f64, std: f64) -> Self {
        FeatureStat { mean: Some(mean), std: Some(std), raw: None }
    }

    /// Feature whose statistics are not modelled
    pub fn not_applicable(raw: Vec<Vec<f64>>) -> Self {
        FeatureStat { mean: None, std: None, raw: Some(raw) }
    }

    /// Number of repeats the feature was measured in, if known
    pub fn repeats(&self) -> Option<usize> {
        self.raw.as_ref().map(|i| i.len())
    }

    /// Number of individual measurements across every repeat, if known
    pub fn measurements(&self) -> Option<usize> {
        self.raw.as_ref().map(|i| i.iter().map(|j| j.len()).sum())
    }
}

/// Features of one condition, recorded at the soma
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ConditionFeatures {
    pub soma: BTreeMap<String, FeatureStat>,
}

impl ConditionFeatures {
    /// Mean spike count of the condition, if measured
    pub fn spike_count(&self) -> Option<f64> {
        self.soma.get(SPIKECOUNT).and_then(|i| i.mean)
    }

    /// Whether the condition elicited spikes, conditions without a spike count
    /// are treated as non-spiking
    pub fn is_spiking(&self) -> bool {
        self.spike_count().map(|i| i > 0.).unwrap_or(false)
    }
}

/// Features keyed by condition name
pub type FeatureRecord = BTreeMap<String, ConditionFeatures>;

/// Spike times of every repeat of the noise conditions
pub type NoiseSpikeTimes = BTreeMap<String, Vec<Vec<f64>>>;

/// Copy of the record with the raw per repeat values removed
pub fn strip_raw(features: &FeatureRecord) -> FeatureRecord {
    features.iter()
        .map(|(name, condition)| {
            let soma = condition.soma.iter()
                .map(|(feature, stat)| {
                    (feature.clone(), FeatureStat { raw: None, ..stat.clone() })
                })
                .collect();

            (name.clone(), ConditionFeatures { soma })
        })
        .collect()
}

/// Which features to extract, either one list for every condition or a list
/// per AIBS stimulus name
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FeatureSpec {
    Uniform { features: Vec<String> },
    PerStimulus(BTreeMap<String, Vec<String>>),
}

impl FeatureSpec {
    /// Reads a feature set JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_reader(File::open(path)?)?)
    }

    /// Features to extract for a condition, `None` if its stimulus type has none
    pub fn features_for(&self, condition_name: &str) -> Option<&[String]> {
        let features = match self {
            FeatureSpec::Uniform { features } => Some(features),
            FeatureSpec::PerStimulus(map) => {
                let distinct_id = distinct_id_of(condition_name);
                StimulusType::from_distinct_id(distinct_id)
                    .and_then(|stim_type| map.get(stim_type.aibs_name))
                    .or_else(|| map.get(distinct_id))
            },
        };

        features
            .filter(|i| !i.is_empty())
            .map(|i| i.as_slice())
    }
}

/// One repeat handed to a [`FeatureCalculator`], time in ms and voltage in mV
#[derive(Debug, Clone, PartialEq)]
pub struct SweepInput {
    pub time: Vec<f64>,
    pub voltage: Vec<f64>,
    pub stim_start: f64,
    pub stim_end: f64,
}

/// Values of each requested feature for one sweep, `None` when the feature
/// could not be computed
pub type FeatureValues = BTreeMap<String, Option<Vec<f64>>>;

/// Computes features of voltage traces
pub trait FeatureCalculator {
    /// Returns one result per sweep, in the order the sweeps were given
    fn feature_values(&self, sweeps: &[SweepInput], feature_names: &[String]) -> Vec<FeatureValues>;
}

fn mean_of(values: &[f64]) -> f64 {
    Array1::from(values.to_vec()).mean().unwrap_or(f64::NAN)
}

/// Aggregates the values of one feature over the repeats of a condition
///
/// Repeats without a value are ignored. A single repeat gets 5% of `|mean|` as
/// standard deviation, several repeats get their population standard deviation
/// or `5% |mean| / sqrt(n)` if that is zero. A zero mean always gets a
/// standard deviation of `0.05`. Returns `None` if no repeat has a value or
/// the statistics are not a number.
pub fn aggregate_feature(feature_name: &str, per_repeat: &[Option<Vec<f64>>]) -> Option<FeatureStat> {
    let raw: Vec<Vec<f64>> = per_repeat.iter()
        .flatten()
        .cloned()
        .collect();

    if raw.is_empty() {
        return None;
    }

    if feature_name == PEAK_TIME {
        return Some(FeatureStat::not_applicable(raw));
    }

    let repeat_means = Array1::from(
        raw.iter().map(|i| mean_of(i)).collect::<Vec<f64>>()
    );
    let n = repeat_means.len();

    let (mean, std) = if n == 1 {
        (repeat_means[0], STD_MEAN_FRACTION * repeat_means[0].abs())
    } else {
        let mean = repeat_means.mean().unwrap_or(f64::NAN);
        let std = repeat_means.std(0.);

        if std == 0. {
            (mean, STD_MEAN_FRACTION * mean.abs() / (n as f64).sqrt())
        } else {
            (mean, std)
        }
    };

    if mean.is_nan() || std.is_nan() {
        return None;
    }

    let std = if mean == 0. { STD_FLOOR } else { std };

    Some(FeatureStat { mean: Some(mean), std: Some(std), raw: Some(raw) })
}

/// Result of extracting features for one cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    /// Aggregated features of every condition that produced any
    pub features: FeatureRecord,
    /// Spike times of the noise conditions
    pub noise_spike_times: NoiseSpikeTimes,
    /// Protocols of the conditions in `features`
    pub training_protocols: ProtocolMap,
}

fn load_repeats(
    data_dir: &Path,
    condition_name: &str,
    protocols: &ProtocolMap,
) -> Result<Vec<SweepInput>> {
    let primary = protocols.get(condition_name)
        .and_then(|i| i.primary())
        .ok_or_else(|| FeatureError::ConditionHasNoStimuli(String::from(condition_name)))?;

    let mut sweeps = vec![];
    for sweep_filename in primary.sweep_filenames.iter() {
        let (time, voltage) = read_trace_file(data_dir.join(sweep_filename))?;

        // features after the end of the trace would be artifacts
        let (time, voltage): (Vec<f64>, Vec<f64>) = time.into_iter()
            .zip(voltage)
            .filter(|(t, _)| *t <= primary.totduration)
            .unzip();

        sweeps.push(
            SweepInput {
                time,
                voltage,
                stim_start: primary.delay,
                stim_end: primary.stim_end,
            }
        );
    }

    Ok(sweeps)
}

/// Extracts features for every condition in `protocols` whose stimulus type
/// has features in `feature_spec`
///
/// Repeats are read from `data_dir`. Conditions whose name contains any of
/// `reject_stim_types` are skipped and noise conditions only have their spike
/// times recorded.
pub fn extract<C: FeatureCalculator + ?Sized>(
    feature_spec: &FeatureSpec,
    protocols: &ProtocolMap,
    data_dir: &Path,
    calculator: &C,
    reject_stim_types: &[String],
) -> Result<Extraction> {
    let mut extraction = Extraction::default();

    for (condition_name, protocol) in protocols.iter() {
        if reject_stim_types.iter().any(|i| condition_name.contains(i.as_str())) {
            continue;
        }

        let is_noise = condition_name.contains("Noise");
        let feature_names: Vec<String> = if is_noise {
            vec![String::from(PEAK_TIME)]
        } else {
            match feature_spec.features_for(condition_name) {
                Some(features) => features.to_vec(),
                None => continue,
            }
        };

        debug!("Getting features from {}", condition_name);

        let sweeps = load_repeats(data_dir, condition_name, protocols)?;
        let results = calculator.feature_values(&sweeps, &feature_names);
        if results.len() != sweeps.len() {
            return Err(
                FeatureError::CalculatorResultMismatch {
                    expected: sweeps.len(),
                    returned: results.len(),
                }.into()
            );
        }

        if is_noise {
            let spike_times = results.iter()
                .map(|i| i.get(PEAK_TIME).cloned().flatten().unwrap_or_default())
                .collect();
            extraction.noise_spike_times.insert(condition_name.clone(), spike_times);

            continue;
        }

        let mut condition = ConditionFeatures::default();
        for feature_name in feature_names.iter() {
            let per_repeat: Vec<Option<Vec<f64>>> = results.iter()
                .map(|i| i.get(feature_name).cloned().flatten())
                .collect();

            match aggregate_feature(feature_name, &per_repeat) {
                Some(stat) => { condition.soma.insert(feature_name.clone(), stat); },
                None => debug!("Dropping {} of {}", feature_name, condition_name),
            }
        }

        if !condition.soma.is_empty() {
            extraction.features.insert(condition_name.clone(), condition);
            extraction.training_protocols.insert(condition_name.clone(), protocol.clone());
        }
    }

    Ok(extraction)
}

/// Copy of the record without the depolarization block and initiation checks,
/// with voltage feature standard deviations corrected across conditions
pub fn lite_features(features: &FeatureRecord) -> FeatureRecord {
    let lite: FeatureRecord = features.iter()
        .map(|(name, condition)| {
            let soma = condition.soma.iter()
                .filter(|(feature, _)| *feature != DEPOL_BLOCK && *feature != CHECK_AIS_INITIATION)
                .map(|(feature, stat)| (feature.clone(), stat.clone()))
                .collect();

            (name.clone(), ConditionFeatures { soma })
        })
        .collect();

    correct_voltage_feature_std(&lite)
}
