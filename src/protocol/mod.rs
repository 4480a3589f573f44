//! Replayable stimulus descriptions consumed by the simulator.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};


/// Pulse type of square current steps
pub const SQUARE_PULSE: &str = "SquarePulse";

/// One pulse segment of a stimulus protocol, currents in nA and times in ms
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StimulusPulse {
    #[serde(rename = "type")]
    pub pulse_type: String,
    pub amp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amp_end: Option<f64>,
    pub delay: f64,
    pub duration: f64,
    pub stim_end: f64,
    pub totduration: f64,
    /// Trace files of the repeats this pulse was measured in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sweep_filenames: Vec<String>,
}

impl StimulusPulse {
    /// Square pulse starting at time zero that lasts for the whole trace, used
    /// to replay a holding current
    pub fn holding(amp: f64, totduration: f64) -> Self {
        StimulusPulse {
            pulse_type: String::from(SQUARE_PULSE),
            amp,
            amp_end: Some(amp),
            delay: 0.,
            duration: totduration,
            stim_end: totduration,
            totduration,
            sweep_filenames: vec![],
        }
    }
}

/// Additional dendritic recording site
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecordingLocation {
    pub var: String,
    pub somadistance: f64,
    pub seclist_name: String,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: String,
}

impl RecordingLocation {
    /// Voltage recording on the apical dendrite `somadistance` um from the
    /// soma, `index` counts from zero
    pub fn apical(index: usize, somadistance: f64) -> Self {
        RecordingLocation {
            var: String::from("v"),
            somadistance,
            seclist_name: String::from("apical"),
            name: format!("dend{}", index + 1),
            location_type: String::from("somadistance"),
        }
    }
}

/// Stimulus protocol of one condition
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ProtocolRecord {
    pub stimuli: Vec<StimulusPulse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_recordings: Option<Vec<RecordingLocation>>,
}

impl ProtocolRecord {
    /// The pulse the condition is named after
    pub fn primary(&self) -> Option<&StimulusPulse> {
        self.stimuli.first()
    }

    /// Amplitude (nA) of the primary pulse, `f64::NAN` if there is none
    pub fn amplitude(&self) -> f64 {
        self.primary().map(|i| i.amp).unwrap_or(f64::NAN)
    }
}

/// Protocols keyed by condition name
pub type ProtocolMap = BTreeMap<String, ProtocolRecord>;
