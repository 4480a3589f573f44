//! Merging repeated sweeps into canonical stimulus conditions and persisting
//! them as a stim map CSV.

use std::{collections::BTreeMap, fs::File, io::{Read, Write}, path::Path};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use crate::config::{MILLI, NANO, PICO, TIMING_DECIMALS};
use crate::error::{Result, StimMapError};
use crate::protocol::{ProtocolMap, ProtocolRecord, RecordingLocation, StimulusPulse};
use crate::stimulus::StimSummary;


/// Header of the stim map CSV
pub const STIM_MAP_HEADER: [&str; 9] = [
    "DistinctID", " StimType", " HoldingCurrent", " Amplitude_Start", " Amplitude_End",
    " Stim_Start", " Stim_End", " Duration", " DataPath",
];

/// File name the stim map is written to
pub const STIM_MAP_FILENAME: &str = "StimMapReps.csv";

/// Separator between repeat file names in the `DataPath` column
pub const DATA_PATH_SEPARATOR: char = '|';

/// One row of the stim map, currents in A and times in ms
#[derive(Debug, Clone, PartialEq)]
pub struct StimMapRow {
    /// Condition name, `{distinct_id}_{sweep_number}` of the first repeat
    pub distinct_id: String,
    /// Pulse type the simulator replays
    pub stim_type: String,
    pub holding_current: f64,
    pub amplitude_start: f64,
    pub amplitude_end: f64,
    pub stim_start: f64,
    pub stim_end: f64,
    pub duration: f64,
    /// Trace files of every repeat
    pub data_path: Vec<String>,
}

impl StimMapRow {
    /// Row for a single sweep from its characterized stimulus
    pub fn from_summary(trace_name: &str, pulse_type: &str, summary: &StimSummary, trace_file: &str) -> Self {
        StimMapRow {
            distinct_id: String::from(trace_name),
            stim_type: String::from(pulse_type),
            holding_current: summary.holding_current / PICO,
            amplitude_start: summary.amp_start / PICO,
            amplitude_end: summary.amp_end / PICO,
            stim_start: summary.start * MILLI,
            stim_end: summary.stop * MILLI,
            duration: summary.duration * MILLI,
            data_path: vec![String::from(trace_file)],
        }
    }

    /// Key separating conditions of one stimulus type, using both amplitudes
    /// keeps ramps apart from steps that start at the same amplitude
    pub fn amplitude_key(&self) -> String {
        format!("{}&{}", self.amplitude_start, self.amplitude_end)
    }

    /// Simulator protocol of this condition, `record_locations` adds dendritic
    /// recordings (um from soma)
    pub fn to_protocol(&self, record_locations: &[f64]) -> ProtocolRecord {
        let primary = StimulusPulse {
            pulse_type: String::from(self.stim_type.trim()),
            amp: NANO * self.amplitude_start,
            amp_end: Some(NANO * self.amplitude_end),
            delay: self.stim_start,
            duration: self.stim_end - self.stim_start,
            stim_end: self.stim_end,
            totduration: self.duration,
            sweep_filenames: self.data_path.clone(),
        };

        // ramps are replayed without their holding current
        let holding_current = if self.distinct_id.contains("Ramp") {
            0.
        } else {
            self.holding_current
        };

        let mut stimuli = vec![primary];
        if holding_current != 0. {
            stimuli.push(StimulusPulse::holding(NANO * holding_current, self.duration));
        }

        let extra_recordings = if record_locations.is_empty() {
            None
        } else {
            Some(
                record_locations.iter()
                    .enumerate()
                    .map(|(i, loc)| RecordingLocation::apical(i, *loc))
                    .collect()
            )
        };

        ProtocolRecord { stimuli, extra_recordings }
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CsvRow {
    #[serde(rename = "DistinctID")]
    distinct_id: String,
    #[serde(rename = "StimType")]
    stim_type: String,
    #[serde(rename = "HoldingCurrent")]
    holding_current: f64,
    #[serde(rename = "Amplitude_Start")]
    amplitude_start: f64,
    #[serde(rename = "Amplitude_End")]
    amplitude_end: f64,
    #[serde(rename = "Stim_Start")]
    stim_start: f64,
    #[serde(rename = "Stim_End")]
    stim_end: f64,
    #[serde(rename = "Duration")]
    duration: f64,
    #[serde(rename = "DataPath")]
    data_path: String,
}

impl From<&StimMapRow> for CsvRow {
    fn from(row: &StimMapRow) -> Self {
        let separator = DATA_PATH_SEPARATOR.to_string();

        CsvRow {
            distinct_id: row.distinct_id.clone(),
            stim_type: row.stim_type.clone(),
            holding_current: row.holding_current,
            amplitude_start: row.amplitude_start,
            amplitude_end: row.amplitude_end,
            stim_start: row.stim_start,
            stim_end: row.stim_end,
            duration: row.duration,
            data_path: row.data_path.join(&separator),
        }
    }
}

impl From<CsvRow> for StimMapRow {
    fn from(row: CsvRow) -> Self {
        StimMapRow {
            distinct_id: row.distinct_id,
            stim_type: row.stim_type,
            holding_current: row.holding_current,
            amplitude_start: row.amplitude_start,
            amplitude_end: row.amplitude_end,
            stim_start: row.stim_start,
            stim_end: row.stim_end,
            duration: row.duration,
            data_path: row.data_path.split(DATA_PATH_SEPARATOR)
                .map(|i| String::from(i.trim()))
                .filter(|i| !i.is_empty())
                .collect(),
        }
    }
}

/// Canonical stimulus conditions and the sweeps merged into each of them
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StimMap {
    /// One merged row per condition
    pub rows: Vec<StimMapRow>,
    /// Condition name to the sweep numbers of its repeats
    pub sweep_repeats: BTreeMap<String, Vec<u32>>,
}

fn timing_set(values: impl Iterator<Item = f64>) -> Vec<String> {
    let mut set: Vec<String> = values
        .map(|i| format!("{:.*}", TIMING_DECIMALS, i))
        .collect();
    set.sort();
    set.dedup();

    set
}

/// Groups the per sweep rows of each stimulus type by amplitude and merges
/// every group into one condition
///
/// The first row of a group is the template, its holding current becomes the
/// mean over the group and its data path lists every repeat. Repeats whose
/// start or stop times differ at 0.1 ms precision fail the whole build.
pub fn build(
    stim_map: &BTreeMap<String, Vec<StimMapRow>>,
    sweep_to_sweepnum: &BTreeMap<String, u32>,
) -> std::result::Result<StimMap, StimMapError> {
    let mut merged = StimMap::default();

    for (stim_type, rows) in stim_map.iter() {
        // first appearance order of amplitudes within a stimulus type
        let mut reps: Vec<(String, Vec<&StimMapRow>)> = vec![];
        for row in rows.iter() {
            let key = row.amplitude_key();
            match reps.iter_mut().find(|(amplitude, _)| *amplitude == key) {
                Some((_, group)) => group.push(row),
                None => reps.push((key, vec![row])),
            }
        }

        for (amplitude, group) in reps.iter() {
            let amplitude_start = amplitude.split('&').next().unwrap_or(amplitude).to_string();

            let start_times = timing_set(group.iter().map(|i| i.stim_start));
            if start_times.len() != 1 {
                return Err(
                    StimMapError::InconsistentStartTimes {
                        stim_type: stim_type.clone(),
                        amplitude: amplitude_start,
                        times: start_times,
                    }
                );
            }

            let stop_times = timing_set(group.iter().map(|i| i.stim_end));
            if stop_times.len() != 1 {
                return Err(
                    StimMapError::InconsistentStopTimes {
                        stim_type: stim_type.clone(),
                        amplitude: amplitude_start,
                        times: stop_times,
                    }
                );
            }

            let mut cumulative = group[0].clone();
            cumulative.holding_current = group.iter()
                .map(|i| i.holding_current)
                .sum::<f64>() / group.len() as f64;
            cumulative.data_path = group.iter()
                .flat_map(|i| i.data_path.iter().cloned())
                .collect();

            let sweeps = group.iter()
                .map(|i| {
                    sweep_to_sweepnum.get(&i.distinct_id)
                        .copied()
                        .ok_or_else(|| StimMapError::MissingSweepNumber(i.distinct_id.clone()))
                })
                .collect::<std::result::Result<Vec<u32>, StimMapError>>()?;

            merged.sweep_repeats.insert(cumulative.distinct_id.clone(), sweeps);
            merged.rows.push(cumulative);
        }
    }

    Ok(merged)
}

impl StimMap {
    /// Writes the rows as CSV with the stim map header
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        writer.write_record(STIM_MAP_HEADER)?;
        for row in self.rows.iter() {
            writer.serialize(CsvRow::from(row))?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Writes the rows to a CSV file
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;

        self.write_csv_to(file)
    }

    /// Protocols of every condition keyed by condition name
    pub fn protocols(&self, record_locations: &[f64]) -> ProtocolMap {
        protocols_from_rows(&self.rows, record_locations)
    }
}

/// Parses stim map rows from CSV text
pub fn read_rows_from<R: Read>(reader: R) -> Result<Vec<StimMapRow>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = vec![];
    for (n, record) in reader.deserialize::<CsvRow>().enumerate() {
        let record = record.map_err(|e| {
            StimMapError::MalformedRow { row: n + 1, reason: e.to_string() }
        })?;

        rows.push(StimMapRow::from(record));
    }

    Ok(rows)
}

/// Reads the rows of a stim map file
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<StimMapRow>> {
    read_rows_from(File::open(path)?)
}

/// Builds protocols keyed by condition name from stim map rows
pub fn protocols_from_rows(rows: &[StimMapRow], record_locations: &[f64]) -> ProtocolMap {
    rows.iter()
        .map(|row| (row.distinct_id.clone(), row.to_protocol(record_locations)))
        .collect()
}

/// Reads a stim map file into protocols keyed by condition name
pub fn read_protocols(path: impl AsRef<Path>, record_locations: &[f64]) -> Result<ProtocolMap> {
    Ok(protocols_from_rows(&read_rows(path)?, record_locations))
}
