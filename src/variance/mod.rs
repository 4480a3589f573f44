//! Population level corrections of feature standard deviations for conditions
//! measured only once.

use std::collections::BTreeMap;
use ndarray::Array1;
use tracing::debug;
use crate::config::{STD_FLOOR, STD_MEAN_FRACTION};
use crate::features::{FeatureRecord, PEAK_TIME, SPIKECOUNT};
use crate::protocol::ProtocolMap;
use crate::stimulus::distinct_id_of;


/// Voltage features whose single repeat standard deviation is taken from the
/// spread across conditions
pub const VOLTAGE_FEATURES: [&str; 4] = [
    "voltage_base", "steady_state_voltage", "voltage_after_stim", "decay_time_constant_after_stim",
];

/// Features only meaningful on traces without spikes
pub const SUBTHRESHOLD_FEATURES: [&str; 2] = ["voltage_deflection_vb_ssse", "decay_time_constant_after_stim"];

/// Features only meaningful on traces with spikes
pub const SUPRATHRESHOLD_FEATURES: [&str; 1] = [SPIKECOUNT];

/// Distinct id of the conditions the regression correction is fit on
pub const REGRESSION_STIM_TYPE: &str = "LongDC";

fn fallback_std(mean: Option<f64>) -> f64 {
    let scaled = mean.map(|i| STD_MEAN_FRACTION * i.abs()).unwrap_or(f64::NAN);

    if scaled.is_nan() || scaled == 0. {
        STD_FLOOR
    } else {
        scaled
    }
}

/// Gives voltage features measured in a single repeat the population standard
/// deviation of their means across every condition where they were measured
/// once, `0.05` when that is zero or undefined
pub fn correct_voltage_feature_std(features: &FeatureRecord) -> FeatureRecord {
    let mut corrected = features.clone();

    let mut single_repeat_means: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    let mut targets: Vec<(String, &str)> = vec![];

    for (condition_name, condition) in features.iter() {
        for feature_name in VOLTAGE_FEATURES {
            let stat = match condition.soma.get(feature_name) {
                Some(stat) => stat,
                None => continue,
            };

            if stat.repeats() != Some(1) {
                continue;
            }

            if let Some(mean) = stat.mean {
                single_repeat_means.entry(feature_name).or_default().push(mean);
                targets.push((condition_name.clone(), feature_name));
            }
        }
    }

    for (condition_name, feature_name) in targets {
        let std = single_repeat_means.get(feature_name)
            .map(|i| Array1::from(i.clone()).std(0.))
            .unwrap_or(f64::NAN);
        let std = if std.is_nan() || std == 0. { STD_FLOOR } else { std };

        if let Some(stat) = corrected.get_mut(&condition_name)
            .and_then(|i| i.soma.get_mut(feature_name)) {
            stat.std = Some(std);
        }
    }

    corrected
}

/// Root mean square residual of an ordinary least squares fit of `y` against
/// `x` with an intercept, `sqrt(SSR / df^2)` where `df` is the number of
/// observations minus the rank of the design
///
/// Returns `f64::NAN` when there are no residual degrees of freedom.
pub fn ols_residual_rmse(x: &Array1<f64>, y: &Array1<f64>) -> f64 {
    let n = y.len();
    if n == 0 || x.len() != n {
        return f64::NAN;
    }

    let x_mean = x.mean().unwrap_or(f64::NAN);
    let y_mean = y.mean().unwrap_or(f64::NAN);
    let x_centered = x - x_mean;
    let y_centered = y - y_mean;
    let sxx = x_centered.mapv(|i| i.powi(2)).sum();

    // constant regressor collapses the design to the intercept
    let (ssr, rank) = if sxx == 0. {
        (y_centered.mapv(|i| i.powi(2)).sum(), 1)
    } else {
        let slope = (&x_centered * &y_centered).sum() / sxx;
        let residuals = &y_centered - &(x_centered * slope);

        (residuals.mapv(|i| i.powi(2)).sum(), 2)
    };

    if n <= rank {
        return f64::NAN;
    }

    let df_resid = (n - rank) as f64;

    (ssr / df_resid / df_resid).sqrt()
}

/// Revises the standard deviation of `LongDC` features measured only once using
/// the residual of a regression of every measurement of that feature against
/// stimulus amplitude
///
/// `peak_time` is never revised, subthreshold features are not used for
/// spiking conditions and the spike count is not used for non-spiking ones.
pub fn correct_feature_statistics(features: &FeatureRecord, protocols: &ProtocolMap) -> FeatureRecord {
    let mut corrected = features.clone();

    let mut values: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    let mut revisions: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (condition_name, condition) in features.iter() {
        if distinct_id_of(condition_name) != REGRESSION_STIM_TYPE {
            continue;
        }

        let amplitude = match protocols.get(condition_name) {
            Some(protocol) => protocol.amplitude(),
            None => {
                debug!("No protocol for {}, skipping it in the regression", condition_name);
                continue;
            },
        };
        let spiking = condition.is_spiking();

        for (feature_name, stat) in condition.soma.iter() {
            if feature_name == PEAK_TIME
                || (spiking && SUBTHRESHOLD_FEATURES.contains(&feature_name.as_str()))
                || (!spiking && SUPRATHRESHOLD_FEATURES.contains(&feature_name.as_str())) {
                continue;
            }

            let raw = match &stat.raw {
                Some(raw) => raw,
                None => continue,
            };

            if stat.measurements() == Some(1) {
                revisions.entry(feature_name.as_str()).or_default().push(condition_name.as_str());
            }

            let (feature_values, amplitudes) = values.entry(feature_name.as_str()).or_default();
            for repeat in raw.iter() {
                feature_values.extend(repeat.iter());
                amplitudes.extend(std::iter::repeat(amplitude).take(repeat.len()));
            }
        }
    }

    for (feature_name, conditions) in revisions {
        let rmse = match values.get(feature_name) {
            Some((feature_values, amplitudes)) => ols_residual_rmse(
                &Array1::from(amplitudes.clone()),
                &Array1::from(feature_values.clone()),
            ),
            None => f64::NAN,
        };

        for condition_name in conditions {
            if let Some(stat) = corrected.get_mut(condition_name)
                .and_then(|i| i.soma.get_mut(feature_name)) {
                stat.std = if rmse.is_nan() || rmse == 0. {
                    Some(fallback_std(stat.mean))
                } else {
                    Some(rmse)
                };
            }
        }
    }

    corrected
}

/// Applies both corrections in turn: the voltage feature population std, then
/// the `LongDC` amplitude regression
pub fn correct(features: &FeatureRecord, protocols: &ProtocolMap) -> FeatureRecord {
    correct_feature_statistics(&correct_voltage_feature_std(features), protocols)
}
