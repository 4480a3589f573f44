//! Sweep records and the recording sources they are read from.

use std::{fs::File, io::BufReader, path::{Path, PathBuf}};
use serde::{Deserialize, Serialize};
use crate::error::{ConfigError, Result};
use crate::normalize::RawTrace;


/// Samples of one recorded sweep in SI units
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawSweep {
    /// Injected current (A)
    pub stimulus: Vec<f64>,
    /// Recorded membrane voltage (V)
    pub response: Vec<f64>,
    /// Sampling rate (Hz)
    pub sampling_rate: f64,
    /// Start (inclusive) and stop (exclusive) index of the recorded part of the sweep
    pub index_range: (usize, usize),
}

impl RawSweep {
    /// Restricts the sweep to its index range and derives the time axis
    pub fn into_trace(self) -> RawTrace {
        let (start, stop) = self.index_range;
        let stop = stop.min(self.stimulus.len()).min(self.response.len());
        let start = start.min(stop);

        RawTrace::from_sampling_rate(
            self.stimulus[start..stop].to_vec(),
            self.response[start..stop].to_vec(),
            self.sampling_rate,
        )
    }
}

/// Metadata of one sweep
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SweepMetadata {
    pub aibs_stimulus_name: String,
}

/// A source of recorded sweeps, such as an NWB file reader
pub trait RecordingSource {
    /// Location of the underlying recording, used for provenance
    fn path(&self) -> &Path;
    /// Every sweep number available
    fn sweep_numbers(&self) -> Vec<u32>;
    /// Samples of a sweep
    fn get_sweep(&self, sweep_number: u32) -> Option<RawSweep>;
    /// Metadata of a sweep
    fn get_sweep_metadata(&self, sweep_number: u32) -> Option<SweepMetadata>;
}

/// One sweep as stored in a JSON recording file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonSweep {
    pub sweep_number: u32,
    pub aibs_stimulus_name: String,
    pub sampling_rate: f64,
    pub stimulus: Vec<f64>,
    pub response: Vec<f64>,
    /// Defaults to the whole sweep
    #[serde(default)]
    pub index_range: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct JsonRecordings {
    sweeps: Vec<JsonSweep>,
}

/// Recording source backed by a JSON document of the form
/// `{"sweeps": [{"sweep_number", "aibs_stimulus_name", "sampling_rate", "stimulus", "response"}]}`
#[derive(Debug, Clone)]
pub struct JsonRecordingSource {
    path: PathBuf,
    sweeps: Vec<JsonSweep>,
}

impl JsonRecordingSource {
    /// Reads every sweep of the file into memory
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::RecordingSourceNotFound(path.display().to_string()).into());
        }

        let reader = BufReader::new(File::open(path)?);
        let recordings: JsonRecordings = serde_json::from_reader(reader)?;

        Ok(JsonRecordingSource { path: path.to_path_buf(), sweeps: recordings.sweeps })
    }

    /// Builds a source from sweeps already in memory
    pub fn from_sweeps(path: impl AsRef<Path>, sweeps: Vec<JsonSweep>) -> Self {
        JsonRecordingSource { path: path.as_ref().to_path_buf(), sweeps }
    }

    /// Writes the sweeps to `path` in the format [`JsonRecordingSource::open`] reads
    pub fn write(path: impl AsRef<Path>, sweeps: &[JsonSweep]) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(file, &serde_json::json!({ "sweeps": sweeps }))?;

        Ok(())
    }

    fn find(&self, sweep_number: u32) -> Option<&JsonSweep> {
        self.sweeps.iter().find(|i| i.sweep_number == sweep_number)
    }
}

impl RecordingSource for JsonRecordingSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn sweep_numbers(&self) -> Vec<u32> {
        self.sweeps.iter().map(|i| i.sweep_number).collect()
    }

    fn get_sweep(&self, sweep_number: u32) -> Option<RawSweep> {
        self.find(sweep_number).map(|sweep| {
            RawSweep {
                stimulus: sweep.stimulus.clone(),
                response: sweep.response.clone(),
                sampling_rate: sweep.sampling_rate,
                index_range: sweep.index_range
                    .unwrap_or((0, sweep.stimulus.len())),
            }
        })
    }

    fn get_sweep_metadata(&self, sweep_number: u32) -> Option<SweepMetadata> {
        self.find(sweep_number).map(|sweep| {
            SweepMetadata { aibs_stimulus_name: sweep.aibs_stimulus_name.clone() }
        })
    }
}
