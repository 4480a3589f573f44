//! Stimulus onset, offset, amplitude and holding current detection.
//!
//! Three strategies implement [`StimulusCharacterizer`], one for clean step
//! stimuli, one that delegates epoch detection to a [`StimulusOntology`] and one
//! for noisy, non-standard recordings. [`Characterizer`] selects between them
//! using a [`CharacterizerKind`] tag from the run configuration.

use std::result::Result;
use serde::{Deserialize, Serialize};
use crate::config::{
    GRADIENT_THRESHOLD, HOLDING_WINDOW_END, HOLDING_WINDOW_OFFSET, NO_STIM_START_INDEX,
    NO_STIM_STOP_INDEX, ONTOLOGY_WINDOW_PADDING, PICO, TRAILING_HOLDING_WINDOW,
};
use crate::error::StimulusError;


/// Stimulus description of one sweep, times in seconds and currents in pA
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StimSummary {
    /// Stimulus onset (s)
    pub start: f64,
    /// Stimulus offset (s)
    pub stop: f64,
    /// Amplitude at onset relative to holding current (pA)
    pub amp_start: f64,
    /// Amplitude at offset relative to holding current (pA)
    pub amp_end: f64,
    /// Duration of the trace to keep (s)
    pub duration: f64,
    /// Baseline current outside the stimulus window (pA)
    pub holding_current: f64,
}

/// Detects stimulus parameters from a time series and its stimulus current
pub trait StimulusCharacterizer {
    /// Characterizes `stimulus` (A) sampled at `time` (s), `trace_name` is used
    /// to decide whether the trace carries a holding current (`DC` traces)
    fn characterize(
        &self,
        time: &[f64],
        stimulus: &[f64],
        trace_name: &str,
    ) -> Result<StimSummary, StimulusError>;
}

fn check_series(time: &[f64], stimulus: &[f64], trace_name: &str) -> Result<(), StimulusError> {
    if time.len() != stimulus.len() {
        return Err(
            StimulusError::SeriesAreNotSameLength { time: time.len(), stimulus: stimulus.len() }
        );
    }
    if time.is_empty() {
        return Err(StimulusError::EmptyTrace(String::from(trace_name)));
    }

    Ok(())
}

fn time_at(time: &[f64], index: usize, trace_name: &str) -> Result<f64, StimulusError> {
    time.get(index)
        .copied()
        .ok_or_else(|| StimulusError::TraceTooShort {
            name: String::from(trace_name),
            len: time.len(),
            index,
        })
}

fn last_time(time: &[f64]) -> f64 {
    time.last().copied().unwrap_or(0.)
}

/// Mean of `values[start..end]` with the bounds clipped to the slice,
/// an empty window gives `f64::NAN`
pub fn window_mean(values: &[f64], start: usize, end: usize) -> f64 {
    let end = end.min(values.len());
    let start = start.min(end);
    let window = &values[start..end];

    if window.is_empty() {
        return f64::NAN;
    }

    window.iter().sum::<f64>() / window.len() as f64
}

/// Holding current (pA) after the stimulus ending at `end_index`, only `DC`
/// traces carry one, a `NaN` from an empty window becomes `0.`
fn holding_current(stimulus: &[f64], end_index: usize, trace_name: &str) -> f64 {
    if !trace_name.contains("DC") {
        return 0.;
    }

    let hold = window_mean(
        stimulus,
        end_index + HOLDING_WINDOW_OFFSET,
        end_index + HOLDING_WINDOW_END,
    ) * PICO;

    if hold.is_nan() {
        0.
    } else {
        hold
    }
}

/// Placeholder summary for a trace without any stimulus
fn no_stimulus_summary(time: &[f64], trace_name: &str) -> Result<StimSummary, StimulusError> {
    Ok(
        StimSummary {
            start: time_at(time, NO_STIM_START_INDEX, trace_name)?,
            stop: last_time(time),
            amp_start: 0.,
            amp_end: 0.,
            duration: last_time(time),
            holding_current: 0.,
        }
    )
}

/// Discrete gradient using central differences in the interior and one sided
/// differences at the ends
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => vec![],
        1 => vec![0.],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    values[1] - values[0]
                } else if i == n - 1 {
                    values[n - 1] - values[n - 2]
                } else {
                    (values[i + 1] - values[i - 1]) / 2.
                }
            })
            .collect(),
    }
}

/// Finds the stimulus as the span between the first and last nonzero sample
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanStep;

impl StimulusCharacterizer for CleanStep {
    fn characterize(
        &self,
        time: &[f64],
        stimulus: &[f64],
        trace_name: &str,
    ) -> Result<StimSummary, StimulusError> {
        check_series(time, stimulus, trace_name)?;

        let first = stimulus.iter().position(|i| *i != 0.);
        let last = stimulus.iter().rposition(|i| *i != 0.);

        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => return no_stimulus_summary(time, trace_name),
        };

        let hold = holding_current(stimulus, last, trace_name);

        Ok(
            StimSummary {
                start: time[first],
                stop: time[last],
                amp_start: stimulus[first] * PICO - hold,
                amp_end: stimulus[last] * PICO - hold,
                duration: last_time(time),
                holding_current: hold,
            }
        )
    }
}

/// Epoch found by a stimulus ontology, times in seconds and amplitude in A
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OntologyCharacteristics {
    pub start_time: f64,
    pub duration: f64,
    pub amplitude: f64,
    pub start_index: usize,
    pub end_index: usize,
}

/// External routine that knows where the stimulus epoch of a sweep is
pub trait StimulusOntology: Send + Sync {
    /// Returns the stimulus epoch or `None` if the trace has none
    fn stim_characteristics(&self, stimulus: &[f64], time: &[f64]) -> Option<OntologyCharacteristics>;
}

/// Finds the stimulus epoch from the change points of the stimulus, optionally
/// ignoring the two change points of a leading test pulse
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochOntology {
    pub skip_test_pulse: bool,
}

impl StimulusOntology for EpochOntology {
    fn stim_characteristics(&self, stimulus: &[f64], time: &[f64]) -> Option<OntologyCharacteristics> {
        if stimulus.len() < 2 || stimulus.len() != time.len() {
            return None;
        }

        let mut change_points: Vec<usize> = (0..stimulus.len() - 1)
            .filter(|&i| stimulus[i + 1] - stimulus[i] != 0.)
            .collect();

        if self.skip_test_pulse {
            change_points = change_points.into_iter().skip(2).collect();
        }

        let start_index = change_points.first()? + 1;
        let end_index = match change_points.last() {
            Some(&last) if last >= start_index => last,
            _ => stimulus.len() - 1,
        };

        let epoch = &stimulus[start_index..=end_index];
        let peak_high = epoch.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let peak_low = epoch.iter().copied().fold(f64::INFINITY, f64::min);

        let amplitude = if peak_high.abs() > peak_low.abs() {
            peak_high
        } else {
            peak_low
        };

        Some(
            OntologyCharacteristics {
                start_time: time[start_index],
                duration: time[end_index] - time[start_index],
                amplitude,
                start_index,
                end_index,
            }
        )
    }
}

/// Delegates epoch detection to a [`StimulusOntology`] and bounds the trace
/// shortly after the stimulus ends
pub struct OntologyDriven {
    pub ontology: Box<dyn StimulusOntology>,
}

impl OntologyDriven {
    pub fn new<T: StimulusOntology + 'static>(ontology: T) -> Self {
        OntologyDriven { ontology: Box::new(ontology) }
    }
}

impl StimulusCharacterizer for OntologyDriven {
    fn characterize(
        &self,
        time: &[f64],
        stimulus: &[f64],
        trace_name: &str,
    ) -> Result<StimSummary, StimulusError> {
        check_series(time, stimulus, trace_name)?;

        let epoch = match self.ontology.stim_characteristics(stimulus, time) {
            Some(epoch) => epoch,
            None => return no_stimulus_summary(time, trace_name),
        };

        let stop = epoch.start_time + epoch.duration;

        Ok(
            StimSummary {
                start: epoch.start_time,
                stop,
                amp_start: stimulus[epoch.start_index] * PICO,
                amp_end: epoch.amplitude * PICO,
                duration: last_time(time).min(stop + ONTOLOGY_WINDOW_PADDING),
                holding_current: 0.,
            }
        )
    }
}

/// Finds stimulus edges of noisy recordings from the extrema of the
/// thresholded stimulus gradient
///
/// The earlier of the two extrema is always taken as onset, whether it is the
/// maximum or the minimum of the gradient.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonStandard;

impl StimulusCharacterizer for NonStandard {
    fn characterize(
        &self,
        time: &[f64],
        stimulus: &[f64],
        trace_name: &str,
    ) -> Result<StimSummary, StimulusError> {
        check_series(time, stimulus, trace_name)?;

        let thresholded: Vec<f64> = gradient(stimulus).into_iter()
            .map(|i| i * PICO)
            .map(|i| if i.abs() <= GRADIENT_THRESHOLD { 0. } else { i })
            .collect();

        if thresholded.iter().all(|i| *i == 0.) {
            let trailing_start = stimulus.len().saturating_sub(TRAILING_HOLDING_WINDOW);

            return Ok(
                StimSummary {
                    start: time_at(time, NO_STIM_START_INDEX, trace_name)?,
                    stop: time_at(time, NO_STIM_STOP_INDEX, trace_name)?,
                    amp_start: 0.,
                    amp_end: 0.,
                    duration: last_time(time),
                    holding_current: window_mean(stimulus, trailing_start, stimulus.len()) * PICO,
                }
            );
        }

        // first occurrence of each extremum
        let mut max_index = 0;
        let mut min_index = 0;
        for (n, value) in thresholded.iter().enumerate() {
            if *value > thresholded[max_index] {
                max_index = n;
            }
            if *value < thresholded[min_index] {
                min_index = n;
            }
        }

        let start_index = max_index.min(min_index);
        let end_index = max_index.max(min_index);

        let hold = holding_current(stimulus, end_index, trace_name);

        let amp = window_mean(stimulus, start_index, end_index);
        let amp = if amp.is_nan() { 0. } else { amp * PICO - hold };

        Ok(
            StimSummary {
                start: time[start_index],
                stop: time[end_index],
                amp_start: amp,
                amp_end: amp,
                duration: last_time(time),
                holding_current: hold,
            }
        )
    }
}

/// Tag selecting which characterization strategy a data source needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterizerKind {
    /// Standard recordings with clean step stimuli
    #[default]
    CleanStep,
    /// Recordings whose stimulus epochs come from a stimulus ontology
    Ontology,
    /// Non-standard recordings with noisy stimulus traces
    NonStandard,
}

/// One of the three characterization strategies
pub enum Characterizer {
    CleanStep(CleanStep),
    Ontology(OntologyDriven),
    NonStandard(NonStandard),
}

impl Characterizer {
    /// Builds the strategy for the given tag, the ontology strategy uses an
    /// [`EpochOntology`]
    pub fn from_kind(kind: CharacterizerKind, skip_test_pulse: bool) -> Self {
        match kind {
            CharacterizerKind::CleanStep => Characterizer::CleanStep(CleanStep),
            CharacterizerKind::Ontology => Characterizer::Ontology(
                OntologyDriven::new(EpochOntology { skip_test_pulse })
            ),
            CharacterizerKind::NonStandard => Characterizer::NonStandard(NonStandard),
        }
    }

    pub fn kind(&self) -> CharacterizerKind {
        match self {
            Characterizer::CleanStep(_) => CharacterizerKind::CleanStep,
            Characterizer::Ontology(_) => CharacterizerKind::Ontology,
            Characterizer::NonStandard(_) => CharacterizerKind::NonStandard,
        }
    }
}

impl StimulusCharacterizer for Characterizer {
    fn characterize(
        &self,
        time: &[f64],
        stimulus: &[f64],
        trace_name: &str,
    ) -> Result<StimSummary, StimulusError> {
        match self {
            Characterizer::CleanStep(strategy) => strategy.characterize(time, stimulus, trace_name),
            Characterizer::Ontology(strategy) => strategy.characterize(time, stimulus, trace_name),
            Characterizer::NonStandard(strategy) => strategy.characterize(time, stimulus, trace_name),
        }
    }
}

/// How an AIBS stimulus name maps onto condition names and simulator pulses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusType {
    /// Stimulus name as recorded in the sweep metadata
    pub aibs_name: &'static str,
    /// Prefix of condition names, `{distinct_id}_{sweep_number}`
    pub distinct_id: &'static str,
    /// Pulse type the simulator replays
    pub pulse_type: &'static str,
    /// Whether the stimulus waveform has to be replayed sample by sample
    pub current_play: bool,
}

/// Known stimulus types
pub const STIMULUS_TYPES: &[StimulusType] = &[
    StimulusType { aibs_name: "Long Square", distinct_id: "LongDC", pulse_type: "SquarePulse", current_play: false },
    StimulusType { aibs_name: "Short Square", distinct_id: "ShortDC", pulse_type: "SquarePulse", current_play: false },
    StimulusType { aibs_name: "Square - 2s Suprathreshold", distinct_id: "LongDCSupra", pulse_type: "SquarePulse", current_play: false },
    StimulusType { aibs_name: "Ramp", distinct_id: "Ramp", pulse_type: "RampPulse", current_play: false },
    StimulusType { aibs_name: "Ramp to Rheobase", distinct_id: "RampRheo", pulse_type: "RampPulse", current_play: false },
    StimulusType { aibs_name: "Short Square - Triple", distinct_id: "Short_Square_Triple", pulse_type: "TriBlip", current_play: true },
    StimulusType { aibs_name: "Noise 1", distinct_id: "Noise_1", pulse_type: "CurrentPlay", current_play: true },
    StimulusType { aibs_name: "Noise 2", distinct_id: "Noise_2", pulse_type: "CurrentPlay", current_play: true },
];

impl StimulusType {
    /// Looks up a stimulus type by its AIBS name
    pub fn from_aibs_name(name: &str) -> Result<&'static StimulusType, StimulusError> {
        STIMULUS_TYPES.iter()
            .find(|i| i.aibs_name == name)
            .ok_or_else(|| StimulusError::UnknownStimulusType(String::from(name)))
    }

    /// Looks up a stimulus type by its distinct id
    pub fn from_distinct_id(id: &str) -> Option<&'static StimulusType> {
        STIMULUS_TYPES.iter().find(|i| i.distinct_id == id)
    }

    /// Condition name for a sweep of this type
    pub fn trace_name(&self, sweep_number: u32) -> String {
        format!("{}_{}", self.distinct_id, sweep_number)
    }
}

/// Distinct id part of a condition name (`LongDC_45` -> `LongDC`)
pub fn distinct_id_of(condition_name: &str) -> &str {
    match condition_name.rsplit_once('_') {
        Some((id, _)) => id,
        None => condition_name,
    }
}
