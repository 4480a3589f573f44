//! Selection of the training and test conditions for each optimization stage.
//!
//! Every selection is a pure function of the feature record and the protocols,
//! the inputs are never modified.

use std::{collections::{BTreeMap, BTreeSet}, fmt, str::FromStr};
use tracing::debug;
use crate::config::{StageConfig, DEPOL_BLOCK_AMP_STEP, DEPOL_BLOCK_TARGET};
use crate::error::ConfigError;
use crate::features::{ConditionFeatures, FeatureRecord, FeatureStat, DEPOL_BLOCK, SPIKECOUNT};
use crate::protocol::{ProtocolMap, ProtocolRecord, StimulusPulse, SQUARE_PULSE};
use crate::variance::correct_voltage_feature_std;


/// Stimulus types never trained on in the basic and active stages
pub const TRAINING_STIMTYPE_REJECT: [&str; 5] = [
    "LongDCSupra", "Ramp", "Short_Square_Triple", "Noise", DEPOL_BLOCK_CONDITION,
];

/// Features removed in the basic stage
pub const BASIC_FEATURE_REJECT: [&str; 4] = ["time_to_first_spike", "ISI_CV", "adaptation_index2", DEPOL_BLOCK];

/// Name of the synthetic depolarization block condition
pub const DEPOL_BLOCK_CONDITION: &str = "DB_check_DC";

/// Options of the active stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveOptions {
    /// Number of highest amplitude spiking conditions trained on
    pub spike_proto: usize,
    /// Number of highest amplitude non-spiking conditions trained on
    pub nospike_proto: usize,
    /// Also train on the lowest spiking and highest non-spiking condition
    pub add_fi_kink: bool,
    /// Add a synthetic condition above the strongest spiking stimulus
    pub depol_block_check: bool,
}

impl Default for ActiveOptions {
    fn default() -> Self {
        ActiveOptions { spike_proto: 2, nospike_proto: 0, add_fi_kink: false, depol_block_check: false }
    }
}

/// Optimization stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Subthreshold behavior only
    Passive,
    /// Every regular stimulus without firing pattern features
    Basic,
    /// Spiking behavior at the highest amplitudes
    Active(ActiveOptions),
}

impl Stage {
    /// Stage described by a run configuration
    pub fn from_config(config: &StageConfig) -> Result<Self, ConfigError> {
        match config.name.parse::<Stage>()? {
            Stage::Active(_) => Ok(
                Stage::Active(
                    ActiveOptions {
                        spike_proto: config.spike_proto,
                        nospike_proto: config.nospike_proto,
                        add_fi_kink: config.add_fi_kink,
                        depol_block_check: config.depol_block_check,
                    }
                )
            ),
            stage => Ok(stage),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Passive => "passive",
            Stage::Basic => "basic",
            Stage::Active(_) => "active",
        }
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passive" => Ok(Stage::Passive),
            "basic" => Ok(Stage::Basic),
            "active" => Ok(Stage::Active(ActiveOptions::default())),
            _ => Err(ConfigError::UnknownStage(String::from(s))),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Training and test sets of one stage
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StageSelection {
    pub train_features: FeatureRecord,
    pub test_features: FeatureRecord,
    pub train_protocols: ProtocolMap,
    /// Stimuli of the synthetic depolarization block condition, if added
    pub depol_block_protocol: Option<Vec<StimulusPulse>>,
}

fn is_rejected_stim_type(condition_name: &str) -> bool {
    TRAINING_STIMTYPE_REJECT.iter().any(|i| condition_name.contains(i))
}

fn without_feature(condition: &ConditionFeatures, feature_name: &str) -> ConditionFeatures {
    let mut condition = condition.clone();
    condition.soma.remove(feature_name);

    condition
}

fn partition(
    features: &FeatureRecord,
    protocols: &ProtocolMap,
    selected: &BTreeSet<String>,
) -> (FeatureRecord, FeatureRecord, ProtocolMap) {
    let (train_features, test_features): (FeatureRecord, FeatureRecord) = features.iter()
        .map(|(name, condition)| (name.clone(), condition.clone()))
        .partition(|(name, _)| selected.contains(name));

    let train_protocols = protocols.iter()
        .filter(|(name, _)| selected.contains(*name))
        .map(|(name, protocol)| (name.clone(), protocol.clone()))
        .collect();

    (train_features, test_features, train_protocols)
}

/// Passive stage: non-spiking conditions are trained on, spiking ones are kept
/// for testing and the spike count is removed from every condition
pub fn select_passive(features: &FeatureRecord, protocols: &ProtocolMap) -> StageSelection {
    let spiking: BTreeSet<&String> = features.iter()
        .filter(|(_, condition)| condition.is_spiking())
        .map(|(name, _)| name)
        .collect();

    let mut selection = StageSelection::default();
    for (name, condition) in features.iter() {
        let stripped = without_feature(condition, SPIKECOUNT);

        if spiking.contains(name) {
            selection.test_features.insert(name.clone(), stripped);
        } else {
            selection.train_features.insert(name.clone(), stripped);
        }
    }

    selection.train_protocols = protocols.iter()
        .filter(|(name, _)| !spiking.contains(name))
        .map(|(name, protocol)| (name.clone(), protocol.clone()))
        .collect();

    selection
}

/// Basic stage: after voltage feature std correction every regular condition
/// is trained on without firing pattern features, conditions left without
/// features are dropped and the rest is kept for testing
pub fn select_basic(features: &FeatureRecord, protocols: &ProtocolMap) -> StageSelection {
    let corrected = correct_voltage_feature_std(features);

    let train_features: FeatureRecord = corrected.iter()
        .filter(|(name, _)| !is_rejected_stim_type(name))
        .map(|(name, condition)| {
            let mut condition = condition.clone();
            condition.soma.retain(|feature, _| !BASIC_FEATURE_REJECT.contains(&feature.as_str()));

            (name.clone(), condition)
        })
        .filter(|(_, condition)| !condition.soma.is_empty())
        .collect();

    let selected: BTreeSet<String> = train_features.keys().cloned().collect();
    let (_, test_features, train_protocols) = partition(&corrected, protocols, &selected);

    StageSelection { train_features, test_features, train_protocols, depol_block_protocol: None }
}

fn top_conditions(sorted: &[(String, f64)], count: usize, kind: &str) -> Vec<String> {
    if count > sorted.len() {
        debug!("Number of {} protocols requested exceeds data", kind);
    }

    sorted[sorted.len().saturating_sub(count)..].iter()
        .map(|(name, _)| name.clone())
        .collect()
}

fn depol_block_stimuli(protocol: &ProtocolRecord) -> Option<Vec<StimulusPulse>> {
    let stimuli = &protocol.stimuli;
    if stimuli.is_empty() {
        return None;
    }

    let max_of = |f: &dyn Fn(&StimulusPulse) -> f64| stimuli.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
    let min_of = |f: &dyn Fn(&StimulusPulse) -> f64| stimuli.iter().map(f).fold(f64::INFINITY, f64::min);

    let mut pulses = vec![
        StimulusPulse {
            pulse_type: String::from(SQUARE_PULSE),
            amp: max_of(&|i| i.amp) + DEPOL_BLOCK_AMP_STEP,
            amp_end: None,
            delay: max_of(&|i| i.delay),
            duration: min_of(&|i| i.duration),
            stim_end: min_of(&|i| i.stim_end),
            totduration: min_of(&|i| i.totduration),
            sweep_filenames: vec![],
        }
    ];

    if let Some(holding) = stimuli.iter().find(|i| i.delay == 0.) {
        pulses.push(holding.clone());
    }

    Some(pulses)
}

/// Active stage: the strongest spiking conditions above every non-spiking
/// amplitude are trained on, optionally with the rheobase transition and a
/// synthetic depolarization block condition
pub fn select_active(features: &FeatureRecord, protocols: &ProtocolMap, options: &ActiveOptions) -> StageSelection {
    let mut working = features.clone();
    let mut spiking: Vec<(String, f64)> = vec![];
    let mut non_spiking: Vec<(String, f64)> = vec![];

    for (name, condition) in working.iter_mut() {
        if is_rejected_stim_type(name) {
            continue;
        }

        let amplitude = match protocols.get(name) {
            Some(protocol) => protocol.amplitude(),
            None => {
                debug!("No protocol for {}, leaving it out of training", name);
                continue;
            },
        };
        if amplitude.is_nan() {
            debug!("Protocol of {} has no stimulus amplitude, leaving it out of training", name);
            continue;
        }

        if condition.is_spiking() {
            spiking.push((name.clone(), amplitude));
        } else {
            condition.soma.remove(DEPOL_BLOCK);
            non_spiking.push((name.clone(), amplitude));
        }
    }

    // spiking below the highest non-spiking amplitude is unreliable
    let max_non_spiking_amp = non_spiking.iter()
        .map(|(_, amp)| *amp)
        .fold(f64::NEG_INFINITY, f64::max);
    spiking.retain(|(_, amp)| *amp >= max_non_spiking_amp);

    spiking.sort_by(|a, b| a.1.total_cmp(&b.1));
    non_spiking.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut selected: BTreeSet<String> = top_conditions(&spiking, options.spike_proto, "spiking")
        .into_iter()
        .chain(top_conditions(&non_spiking, options.nospike_proto, "nonspiking"))
        .collect();

    if options.add_fi_kink {
        if let Some((name, _)) = spiking.first() {
            selected.insert(name.clone());
        }
        if let Some((name, _)) = non_spiking.last() {
            selected.insert(name.clone());
        }
    }

    let (mut train_features, test_features, mut train_protocols) = partition(&working, protocols, &selected);

    let mut depol_block_protocol = None;
    if options.depol_block_check {
        let stimuli = spiking.last()
            .and_then(|(name, _)| protocols.get(name))
            .and_then(depol_block_stimuli);

        match stimuli {
            Some(stimuli) => {
                let (mean, std) = DEPOL_BLOCK_TARGET;
                let soma = BTreeMap::from([(String::from(DEPOL_BLOCK), FeatureStat::new(mean, std))]);

                train_features.insert(String::from(DEPOL_BLOCK_CONDITION), ConditionFeatures { soma });
                train_protocols.insert(
                    String::from(DEPOL_BLOCK_CONDITION),
                    ProtocolRecord { stimuli: stimuli.clone(), extra_recordings: None },
                );
                depol_block_protocol = Some(stimuli);
            },
            None => debug!("No spiking condition to base the depolarization block check on"),
        }
    }

    StageSelection { train_features, test_features, train_protocols, depol_block_protocol }
}

/// Training and test sets for `stage`
pub fn select(stage: &Stage, features: &FeatureRecord, protocols: &ProtocolMap) -> StageSelection {
    match stage {
        Stage::Passive => select_passive(features, protocols),
        Stage::Basic => select_basic(features, protocols),
        Stage::Active(options) => select_active(features, protocols, options),
    }
}
