//! Threshold based spike detection and a small set of voltage and firing
//! features computed directly from the trace.

use rayon::prelude::*;
use super::{FeatureCalculator, FeatureValues, SweepInput};


/// Feature calculator supporting `Spikecount`, `Spikecount_stimint`,
/// `peak_time`, `peak_voltage`, `AP_amplitude`, `mean_frequency`,
/// `time_to_first_spike`, `ISI_CV`, `adaptation_index2`, `voltage_base`,
/// `steady_state_voltage`, `steady_state_voltage_stimend`,
/// `voltage_deflection_vb_ssse`, `voltage_after_stim` and `depol_block`
///
/// Every other requested feature is reported as missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicFeatureCalculator {
    /// Upward crossing that starts a spike (mV)
    pub threshold: f64,
    /// Fraction of the stimulus onset where the baseline window starts
    pub voltage_base_start_fraction: f64,
    /// Fraction of the stimulus at its end averaged for the steady state
    pub steady_state_fraction: f64,
    /// Voltage above which a plateau counts as depolarization block (mV)
    pub depol_block_threshold: f64,
    /// Shortest plateau that counts as depolarization block (ms)
    pub depol_block_min_duration: f64,
}

impl Default for BasicFeatureCalculator {
    fn default() -> Self {
        BasicFeatureCalculator {
            threshold: -20.,
            voltage_base_start_fraction: 0.9,
            steady_state_fraction: 0.1,
            depol_block_threshold: -50.,
            depol_block_min_duration: 50.,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn window_values(sweep: &SweepInput, start: f64, end: f64) -> Vec<f64> {
    sweep.time.iter()
        .zip(sweep.voltage.iter())
        .filter(|(t, _)| **t >= start && **t <= end)
        .map(|(_, v)| *v)
        .collect()
}

impl BasicFeatureCalculator {
    /// Indices of spike peaks, a spike runs from an upward threshold crossing
    /// to the next downward crossing
    pub fn peak_indices(&self, voltage: &[f64]) -> Vec<usize> {
        let mut peaks = vec![];
        let mut spike_start: Option<usize> = None;

        for (n, v) in voltage.iter().enumerate() {
            match spike_start {
                None if *v >= self.threshold => spike_start = Some(n),
                Some(start) if *v < self.threshold => {
                    peaks.push(Self::argmax(voltage, start, n));
                    spike_start = None;
                },
                _ => {},
            }
        }

        // a spike still above threshold at the end of the trace
        if let Some(start) = spike_start {
            peaks.push(Self::argmax(voltage, start, voltage.len()));
        }

        peaks
    }

    fn argmax(voltage: &[f64], start: usize, end: usize) -> usize {
        (start..end).fold(start, |best, i| if voltage[i] > voltage[best] { i } else { best })
    }

    fn stimulus_peaks(&self, sweep: &SweepInput) -> Vec<usize> {
        self.peak_indices(&sweep.voltage).into_iter()
            .filter(|i| sweep.time[*i] >= sweep.stim_start && sweep.time[*i] <= sweep.stim_end)
            .collect()
    }

    fn voltage_base(&self, sweep: &SweepInput) -> Option<f64> {
        mean(&window_values(sweep, self.voltage_base_start_fraction * sweep.stim_start, sweep.stim_start))
    }

    fn steady_state_voltage_stimend(&self, sweep: &SweepInput) -> Option<f64> {
        let start = sweep.stim_end - self.steady_state_fraction * (sweep.stim_end - sweep.stim_start);

        mean(&window_values(sweep, start, sweep.stim_end))
    }

    fn has_depol_block(&self, sweep: &SweepInput) -> bool {
        let mut plateau_start: Option<f64> = None;

        for (t, v) in sweep.time.iter().zip(sweep.voltage.iter()) {
            if *t < sweep.stim_start || *t > sweep.stim_end {
                continue;
            }

            match plateau_start {
                Some(start) if *v > self.depol_block_threshold => {
                    if t - start >= self.depol_block_min_duration {
                        return true;
                    }
                },
                Some(_) => plateau_start = None,
                None if *v > self.depol_block_threshold => plateau_start = Some(*t),
                None => {},
            }
        }

        false
    }

    fn feature(&self, sweep: &SweepInput, peaks: &[usize], name: &str) -> Option<Vec<f64>> {
        let peak_times: Vec<f64> = peaks.iter().map(|i| sweep.time[*i]).collect();
        let isis: Vec<f64> = peak_times.windows(2).map(|i| i[1] - i[0]).collect();

        match name {
            "Spikecount" | "Spikecount_stimint" => Some(vec![peaks.len() as f64]),
            "peak_time" => Some(peak_times),
            "peak_voltage" => Some(peaks.iter().map(|i| sweep.voltage[*i]).collect()),
            "AP_amplitude" => {
                let base = self.voltage_base(sweep)?;
                Some(peaks.iter().map(|i| sweep.voltage[*i] - base).collect())
            },
            "mean_frequency" => {
                let last = peak_times.last()?;
                let window = last - sweep.stim_start;
                if window <= 0. {
                    return None;
                }

                Some(vec![1000. * peak_times.len() as f64 / window])
            },
            "time_to_first_spike" => {
                peak_times.first().map(|i| vec![i - sweep.stim_start])
            },
            "ISI_CV" => {
                if isis.len() < 2 {
                    return None;
                }

                let isi_mean = mean(&isis)?;
                let variance = isis.iter()
                    .map(|i| (i - isi_mean).powi(2))
                    .sum::<f64>() / (isis.len() - 1) as f64;

                Some(vec![variance.sqrt() / isi_mean])
            },
            "adaptation_index2" => {
                if isis.len() < 3 {
                    return None;
                }

                // first interval is excluded
                let ratios: Vec<f64> = isis[1..].windows(2)
                    .map(|i| (i[1] - i[0]) / (i[1] + i[0]))
                    .collect();

                mean(&ratios).map(|i| vec![i])
            },
            "voltage_base" => self.voltage_base(sweep).map(|i| vec![i]),
            "steady_state_voltage" => {
                let end = sweep.time.last().copied()?;
                mean(&window_values(sweep, sweep.stim_end, end)).map(|i| vec![i])
            },
            "steady_state_voltage_stimend" => self.steady_state_voltage_stimend(sweep).map(|i| vec![i]),
            "voltage_deflection_vb_ssse" => {
                let base = self.voltage_base(sweep)?;
                let steady_state = self.steady_state_voltage_stimend(sweep)?;

                Some(vec![steady_state - base])
            },
            "voltage_after_stim" => {
                let end = sweep.time.last().copied()?;
                let start = sweep.stim_end + 0.25 * (end - sweep.stim_end);

                mean(&window_values(sweep, start, end)).map(|i| vec![i])
            },
            // passes when no sustained plateau forms during the stimulus
            "depol_block" => {
                if self.has_depol_block(sweep) {
                    None
                } else {
                    Some(vec![1.])
                }
            },
            _ => None,
        }
    }

    fn sweep_features(&self, sweep: &SweepInput, feature_names: &[String]) -> FeatureValues {
        let peaks = self.stimulus_peaks(sweep);

        feature_names.iter()
            .map(|name| (name.clone(), self.feature(sweep, &peaks, name)))
            .collect()
    }
}

impl FeatureCalculator for BasicFeatureCalculator {
    fn feature_values(&self, sweeps: &[SweepInput], feature_names: &[String]) -> Vec<FeatureValues> {
        sweeps.par_iter()
            .map(|sweep| self.sweep_features(sweep, feature_names))
            .collect()
    }
}
