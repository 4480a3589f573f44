//! Heuristic constants used by the extraction and filtering rules, and the
//! TOML run configuration.

use std::{fs::read_to_string, path::{Path, PathBuf}};
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::stimulus::CharacterizerKind;


/// Sample index used as stimulus start when no stimulus is found (100 ms at 200 kHz)
pub const NO_STIM_START_INDEX: usize = 20_000;
/// Sample index used as stimulus stop by the noisy strategy when no edge is found
pub const NO_STIM_STOP_INDEX: usize = 40_000;
/// Offset after stimulus end where the holding current window begins (samples)
pub const HOLDING_WINDOW_OFFSET: usize = 1_000;
/// Offset after stimulus end where the holding current window ends (samples)
pub const HOLDING_WINDOW_END: usize = 20_000;
/// Length of the trailing window averaged for holding current in noisy traces (samples)
pub const TRAILING_HOLDING_WINDOW: usize = 20_000;
/// Gradient magnitude (pA per sample) at or below which noisy stimulus gradients are zeroed
pub const GRADIENT_THRESHOLD: f64 = 10.;
/// Time (s) kept past stimulus end when the ontology strategy bounds a trace
pub const ONTOLOGY_WINDOW_PADDING: f64 = 1.;

/// Amperes to picoamperes
pub const PICO: f64 = 1e12;
/// Amperes to nanoamperes
pub const NANO: f64 = 1e9;
/// Seconds to milliseconds and volts to millivolts
pub const MILLI: f64 = 1e3;

/// Default liquid junction potential (mV)
pub const DEFAULT_JUNCTION_POTENTIAL: f64 = -14.;
/// Default recording temperature (celsius)
pub const DEFAULT_TEMPERATURE: f64 = 34.;
/// Keep every n-th sample when downsampling
pub const DOWNSAMPLE_STRIDE: usize = 5;

/// Fraction of `|mean|` used as standard deviation when no natural variance exists
pub const STD_MEAN_FRACTION: f64 = 0.05;
/// Standard deviation used when the mean is zero or a corrected std is degenerate
pub const STD_FLOOR: f64 = 0.05;
/// Precision (decimal places) at which repeat start and stop times must agree
pub const TIMING_DECIMALS: usize = 1;

/// Amplitude (nA) added above the strongest spiking stimulus for the depolarization block check
pub const DEPOL_BLOCK_AMP_STEP: f64 = 0.01;
/// Target `depol_block` feature value and standard deviation
pub const DEPOL_BLOCK_TARGET: (f64, f64) = (1., 0.05);

fn default_junction_potential() -> f64 {
    DEFAULT_JUNCTION_POTENTIAL
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_ephys_dir() -> PathBuf {
    PathBuf::from("preprocessed")
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_stage() -> String {
    String::from("active")
}

fn default_spike_proto() -> usize {
    2
}

fn default_acceptable_stimtypes() -> Vec<String> {
    vec![String::from("Long Square")]
}

/// Cell being processed and its recording source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellConfig {
    /// Cell identifier, used to name output directories
    pub cell_id: String,
    /// Path to the sweep recordings
    pub recordings: PathBuf,
    /// Liquid junction potential (mV) added to every response trace
    #[serde(default = "default_junction_potential")]
    pub junction_potential: f64,
    /// Recording temperature (celsius)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

/// Settings for turning sweeps into features
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Directory preprocessed traces and the stim map are written to
    #[serde(default = "default_ephys_dir")]
    pub ephys_dir: PathBuf,
    /// AIBS stimulus names to keep
    #[serde(default = "default_acceptable_stimtypes")]
    pub acceptable_stimtypes: Vec<String>,
    /// Strategy used to find stimulus onset and offset
    #[serde(default)]
    pub characterizer: CharacterizerKind,
    /// Skip a leading test pulse when the ontology strategy is used
    #[serde(default)]
    pub skip_test_pulse: bool,
    /// Feature set JSON file
    pub feature_set: PathBuf,
    /// Sweep numbers to restrict extraction to
    #[serde(default)]
    pub sweep_numbers: Option<Vec<u32>>,
    /// Conditions whose names contain any of these are skipped
    #[serde(default)]
    pub feature_reject_stim_type: Vec<String>,
    /// Dendritic recording locations (um from soma)
    #[serde(default)]
    pub record_locations: Vec<f64>,
    /// Where spike times of noise conditions are written
    #[serde(default)]
    pub spiketimes_path: Option<PathBuf>,
}

/// Optimization stage to select a training set for
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageConfig {
    /// One of `passive`, `basic` or `active`
    #[serde(default = "default_stage")]
    pub name: String,
    /// Number of highest amplitude spiking conditions to train on
    #[serde(default = "default_spike_proto")]
    pub spike_proto: usize,
    /// Number of highest amplitude non-spiking conditions to train on
    #[serde(default)]
    pub nospike_proto: usize,
    /// Also train on the rheobase transition
    #[serde(default)]
    pub add_fi_kink: bool,
    /// Add the synthetic depolarization block condition
    #[serde(default)]
    pub depol_block_check: bool,
}

impl Default for StageConfig {
    fn default() -> Self {
        StageConfig {
            name: default_stage(),
            spike_proto: default_spike_proto(),
            nospike_proto: 0,
            add_fi_kink: false,
            depol_block_check: false,
        }
    }
}

/// Where selected features and protocols are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Base directory, outputs go to `{base_dir}/{cell_id}/`
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { base_dir: default_base_dir() }
    }
}

/// Complete run configuration read from a `.toml` file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    pub cell: CellConfig,
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    /// Parses a run configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a run configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_to_string(path)?;

        RunConfig::from_toml_str(&content)
    }
}
