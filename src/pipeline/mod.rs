//! End to end extraction for one cell: preprocessing recorded sweeps into a
//! stim map, extracting features and writing the stage specific training set.

use std::{collections::BTreeMap, fs::{self, File}, path::{Path, PathBuf}};
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::config::{CellConfig, ExtractionConfig};
use crate::error::Result;
use crate::features::{self, FeatureCalculator, FeatureRecord, FeatureSpec, NoiseSpikeTimes, strip_raw};
use crate::normalize::{normalize_and_downsample, write_trace_file};
use crate::protocol::ProtocolMap;
use crate::provenance::{write_specs, Provenance};
use crate::stage::{select, Stage, StageSelection};
use crate::stim_map::{self, StimMap, StimMapRow, STIM_MAP_FILENAME};
use crate::stimulus::{Characterizer, StimulusCharacterizer, StimulusType};
use crate::sweep::RecordingSource;
use crate::variance;


/// File name of the selected training features
pub const TRAIN_FEATURES_FILENAME: &str = "train_features.json";
/// File name of the held out features
pub const TEST_FEATURES_FILENAME: &str = "test_features.json";
/// File name of the selected training protocols
pub const TRAIN_PROTOCOLS_FILENAME: &str = "train_protocols.json";
/// File name of every feature after variance correction
pub const CORRECTED_FEATURES_FILENAME: &str = "corrected_features.json";

/// Result of preprocessing a cell's sweeps
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCellData {
    /// Directory holding the trace files and the stim map
    pub output_dir: PathBuf,
    /// Path of the written stim map
    pub stim_map_path: PathBuf,
    pub stim_map: StimMap,
    /// Trace name to its sweep number
    pub stim_sweep_map: BTreeMap<String, u32>,
}

/// Features of a cell and the training set selected from them
#[derive(Debug, Clone, PartialEq)]
pub struct EphysFeatures {
    /// Every aggregated feature
    pub features: FeatureRecord,
    /// Features without the validation checks, voltage std corrected
    pub lite_features: FeatureRecord,
    /// Every feature after both variance corrections
    pub corrected_features: FeatureRecord,
    /// Protocols of every condition in the stim map
    pub all_protocols: ProtocolMap,
    /// Protocols of the conditions that produced features
    pub training_protocols: ProtocolMap,
    pub noise_spike_times: NoiseSpikeTimes,
    pub selection: StageSelection,
}

/// Paths of the written stage outputs
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFeatures {
    pub train_features: PathBuf,
    pub test_features: PathBuf,
    pub train_protocols: PathBuf,
}

/// Runs the extraction for one cell
#[derive(Debug, Clone, PartialEq)]
pub struct EphysExtractor {
    pub cell_id: String,
    /// Junction potential (mV)
    pub junction_potential: f64,
    /// Recording temperature (celsius)
    pub temperature: f64,
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    serde_json::to_writer_pretty(File::create(path)?, value)?;

    Ok(())
}

impl EphysExtractor {
    pub fn new(cell_id: &str, junction_potential: f64, temperature: f64) -> Self {
        EphysExtractor { cell_id: String::from(cell_id), junction_potential, temperature }
    }

    pub fn from_config(config: &CellConfig) -> Self {
        EphysExtractor::new(&config.cell_id, config.junction_potential, config.temperature)
    }

    /// Characterizes, normalizes and writes every acceptable sweep of `source`
    /// into `config.ephys_dir`, then merges repeats into the stim map and
    /// records provenance
    pub fn save_cell_data<S: RecordingSource + ?Sized>(
        &self,
        source: &S,
        config: &ExtractionConfig,
    ) -> Result<SavedCellData> {
        let output_dir = config.ephys_dir.clone();
        fs::create_dir_all(&output_dir)?;

        let characterizer = Characterizer::from_kind(config.characterizer, config.skip_test_pulse);
        let sweep_numbers = config.sweep_numbers.clone()
            .unwrap_or_else(|| source.sweep_numbers());

        let mut rows: BTreeMap<String, Vec<StimMapRow>> = BTreeMap::new();
        let mut stim_sweep_map: BTreeMap<String, u32> = BTreeMap::new();

        for sweep_number in sweep_numbers {
            let metadata = match source.get_sweep_metadata(sweep_number) {
                Some(metadata) => metadata,
                None => {
                    warn!("Sweep {} has no metadata, skipping", sweep_number);
                    continue;
                },
            };

            if !config.acceptable_stimtypes.contains(&metadata.aibs_stimulus_name) {
                continue;
            }

            let stim_type = StimulusType::from_aibs_name(&metadata.aibs_stimulus_name)?;
            let sweep = match source.get_sweep(sweep_number) {
                Some(sweep) => sweep,
                None => {
                    warn!("Sweep {} could not be read, skipping", sweep_number);
                    continue;
                },
            };

            let trace_name = stim_type.trace_name(sweep_number);
            let raw = sweep.into_trace();
            let summary = characterizer.characterize(&raw.time, &raw.stimulus, &trace_name)?;

            let trace = normalize_and_downsample(raw, self.junction_potential);
            let trace_filename = format!("{}.txt", trace_name);
            write_trace_file(output_dir.join(&trace_filename), &trace, stim_type.current_play)?;

            debug!("Saved {} from sweep {}", trace_filename, sweep_number);

            rows.entry(String::from(stim_type.distinct_id))
                .or_default()
                .push(StimMapRow::from_summary(&trace_name, stim_type.pulse_type, &summary, &trace_filename));
            stim_sweep_map.insert(trace_name, sweep_number);
        }

        let stim_map = stim_map::build(&rows, &stim_sweep_map)?;

        let stim_map_path = output_dir.join(STIM_MAP_FILENAME);
        stim_map.write_csv(&stim_map_path)?;
        info!("Wrote {}", stim_map_path.display());

        let provenance = Provenance::new(
            source.path(),
            self.temperature,
            self.junction_potential,
            stim_sweep_map.clone(),
            stim_map.sweep_repeats.clone(),
        )?;
        let provenance_path = provenance.write(&output_dir)?;
        info!("Wrote {}", provenance_path.display());

        Ok(SavedCellData { output_dir, stim_map_path, stim_map, stim_sweep_map })
    }

    /// Extracts features from the traces next to the stim map at
    /// `stim_map_path` and selects the training set for `stage`
    pub fn get_ephys_features<C: FeatureCalculator + ?Sized>(
        &self,
        feature_spec: &FeatureSpec,
        stim_map_path: &Path,
        config: &ExtractionConfig,
        stage: &Stage,
        calculator: &C,
    ) -> Result<EphysFeatures> {
        let all_protocols = stim_map::read_protocols(stim_map_path, &config.record_locations)?;
        let data_dir = stim_map_path.parent().unwrap_or_else(|| Path::new("."));

        let extraction = features::extract(
            feature_spec,
            &all_protocols,
            data_dir,
            calculator,
            &config.feature_reject_stim_type,
        )?;

        info!(
            "Extracted features for {} of {} conditions of cell {}",
            extraction.features.len(),
            all_protocols.len(),
            self.cell_id,
        );

        if let Some(path) = &config.spiketimes_path {
            if !extraction.noise_spike_times.is_empty() {
                write_json(path, &extraction.noise_spike_times)?;
                info!("Wrote {}", path.display());
            }
        }

        let selection = select(stage, &extraction.features, &extraction.training_protocols);
        let lite_features = features::lite_features(&extraction.features);
        let corrected_features = variance::correct(&extraction.features, &extraction.training_protocols);

        Ok(
            EphysFeatures {
                features: extraction.features,
                lite_features,
                corrected_features,
                all_protocols,
                training_protocols: extraction.training_protocols,
                noise_spike_times: extraction.noise_spike_times,
                selection,
            }
        )
    }

    /// Writes the training features, test features and training protocols to
    /// `{base_dir}/{cell_id}/`
    pub fn write_ephys_features(&self, selection: &StageSelection, base_dir: &Path) -> Result<WrittenFeatures> {
        let cell_dir = base_dir.join(&self.cell_id);

        let written = WrittenFeatures {
            train_features: cell_dir.join(TRAIN_FEATURES_FILENAME),
            test_features: cell_dir.join(TEST_FEATURES_FILENAME),
            train_protocols: cell_dir.join(TRAIN_PROTOCOLS_FILENAME),
        };

        write_json(&written.train_features, &strip_raw(&selection.train_features))?;
        write_json(&written.test_features, &strip_raw(&selection.test_features))?;
        write_json(&written.train_protocols, &selection.train_protocols)?;

        info!("Wrote stage outputs to {}", cell_dir.display());

        Ok(written)
    }

    /// Writes the variance corrected features, raw values stripped, to
    /// `{base_dir}/{cell_id}/`
    pub fn write_corrected_features(&self, features: &FeatureRecord, base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(&self.cell_id).join(CORRECTED_FEATURES_FILENAME);
        write_json(&path, &strip_raw(features))?;
        info!("Wrote {}", path.display());

        Ok(path)
    }

    /// Writes the recording conditions file for the cell to `{base_dir}/{cell_id}/`
    pub fn write_specs(&self, base_dir: &Path) -> Result<PathBuf> {
        let cell_dir = base_dir.join(&self.cell_id);
        fs::create_dir_all(&cell_dir)?;

        write_specs(cell_dir, self.junction_potential, self.temperature)
    }
}
