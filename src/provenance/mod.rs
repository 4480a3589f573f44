//! Provenance record of a preprocessing run and the recording conditions file
//! the simulator reads.

use std::{collections::BTreeMap, fs::{self, File}, path::{Path, PathBuf}};
use serde::{Deserialize, Serialize};
use crate::error::Result;


/// File name of the provenance record
pub const PROVENANCE_FILENAME: &str = "provenance.json";

/// File name of the recording conditions file
pub const SPECS_FILENAME: &str = "Specs";

/// Where the preprocessed data came from and how it was corrected
///
/// Fields are declared in alphabetical order so the JSON keys are sorted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Provenance {
    /// Junction potential (mV) added to every response
    pub junction_potential: f64,
    /// BLAKE3 hex digest of the recording file
    pub recording_hash: String,
    /// Absolute path of the recording file
    pub recording_path: String,
    /// Condition name to the sweep numbers of its repeats
    pub stim_reps_sweep_map: BTreeMap<String, Vec<u32>>,
    /// Trace name to its sweep number
    pub stim_sweep_map: BTreeMap<String, u32>,
    /// Recording temperature (celsius)
    pub temperature: f64,
}

/// BLAKE3 hex digest of a file's contents
pub fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let content = fs::read(path)?;

    Ok(blake3::hash(&content).to_hex().to_string())
}

impl Provenance {
    /// Records provenance of `recording_path`, hashing its contents
    pub fn new(
        recording_path: impl AsRef<Path>,
        temperature: f64,
        junction_potential: f64,
        stim_sweep_map: BTreeMap<String, u32>,
        stim_reps_sweep_map: BTreeMap<String, Vec<u32>>,
    ) -> Result<Self> {
        let recording_path = recording_path.as_ref();
        let absolute = fs::canonicalize(recording_path)
            .unwrap_or_else(|_| recording_path.to_path_buf());

        Ok(
            Provenance {
                junction_potential,
                recording_hash: hash_file(recording_path)?,
                recording_path: absolute.display().to_string(),
                stim_reps_sweep_map,
                stim_sweep_map,
                temperature,
            }
        )
    }

    /// Writes `provenance.json` into `output_dir`, returning its path
    pub fn write(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = output_dir.as_ref().join(PROVENANCE_FILENAME);
        serde_json::to_writer_pretty(File::create(&path)?, self)?;

        Ok(path)
    }

    /// Reads a provenance record
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_reader(File::open(path)?)?)
    }
}

/// Contents of the recording conditions file
pub fn specs_content(junction_potential: f64, temperature: f64) -> String {
    format!("junctionpotential={}\ntemperature={}\n", junction_potential, temperature)
}

/// Writes the recording conditions file into `output_dir`, returning its path
pub fn write_specs(output_dir: impl AsRef<Path>, junction_potential: f64, temperature: f64) -> Result<PathBuf> {
    let path = output_dir.as_ref().join(SPECS_FILENAME);
    fs::write(&path, specs_content(junction_potential, temperature))?;

    Ok(path)
}
