//! Model parameters and narrowing of their search bounds between optimization
//! stages.

use std::{fs::File, path::Path};
use serde::{Deserialize, Serialize};
use crate::error::{ParameterError, Result};


/// One optimizable parameter of a biophysical model
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelParameter {
    pub param_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sectionlist: Option<String>,
    /// Fixed or previously optimized value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Lower and upper search bound, absent for frozen parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 2]>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist_type: Option<String>,
}

impl ModelParameter {
    /// Whether `other` describes the same parameter on the same section list
    pub fn same_parameter(&self, other: &ModelParameter) -> bool {
        self.param_name == other.param_name && self.sectionlist == other.sectionlist
    }
}

/// Adjusts the search bounds of `param` around the value found in the previous
/// stage
///
/// A positive `tolerance` narrows the bounds to `value ± tolerance * |value|`,
/// clipped to the original bounds. A zero tolerance freezes the parameter at
/// the previous value and removes its bounds.
pub fn adjust_param_bounds(
    param: &ModelParameter,
    previous: &ModelParameter,
    tolerance: f64,
) -> std::result::Result<ModelParameter, ParameterError> {
    if tolerance < 0. || tolerance.is_nan() {
        return Err(ParameterError::NegativeTolerance(tolerance));
    }

    let value = previous.value
        .ok_or_else(|| ParameterError::MissingValue(previous.param_name.clone()))?;

    let mut adjusted = param.clone();
    if tolerance > 0. {
        let [lower, upper] = param.bounds
            .ok_or_else(|| ParameterError::MissingBounds(param.param_name.clone()))?;

        adjusted.bounds = Some([
            (value - tolerance * value.abs()).max(lower),
            (value + tolerance * value.abs()).min(upper),
        ]);
    } else {
        adjusted.bounds = None;
        adjusted.value = Some(value);
    }

    Ok(adjusted)
}

/// Adjusts every parameter that has a counterpart in `previous`, others are
/// kept as they are
pub fn adjust_all_param_bounds(
    params: &[ModelParameter],
    previous: &[ModelParameter],
    tolerance: f64,
) -> std::result::Result<Vec<ModelParameter>, ParameterError> {
    params.iter()
        .map(|param| {
            match previous.iter().find(|i| i.same_parameter(param)) {
                Some(prev) if param.bounds.is_some() => adjust_param_bounds(param, prev, tolerance),
                _ => Ok(param.clone()),
            }
        })
        .collect()
}

/// Reads a JSON list of parameters
pub fn read_parameters(path: impl AsRef<Path>) -> Result<Vec<ModelParameter>> {
    Ok(serde_json::from_reader(File::open(path)?)?)
}

/// Writes parameters as a JSON list
pub fn write_parameters(path: impl AsRef<Path>, params: &[ModelParameter]) -> Result<()> {
    serde_json::to_writer_pretty(File::create(path)?, params)?;

    Ok(())
}
