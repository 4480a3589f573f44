//! Unit scaling, junction potential correction and downsampling of raw sweeps.

use std::{fs::File, io::{Read, Write}, path::Path};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use crate::config::{DOWNSAMPLE_STRIDE, MILLI, NANO};
use crate::error::{FeatureError, Result};


/// Sweep samples in SI units (s, A, V) as read from a recording
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrace {
    pub time: Vec<f64>,
    pub stimulus: Vec<f64>,
    pub response: Vec<f64>,
}

impl RawTrace {
    /// Builds a trace from stimulus and response series with time derived from
    /// the sampling rate (Hz)
    pub fn from_sampling_rate(stimulus: Vec<f64>, response: Vec<f64>, sampling_rate: f64) -> Self {
        let time = (0..stimulus.len())
            .map(|i| i as f64 / sampling_rate)
            .collect();

        RawTrace { time, stimulus, response }
    }
}

/// Sweep samples in ms, nA and junction potential corrected mV
///
/// Only [`normalize`] creates these, a trace that went through it once cannot
/// be corrected a second time.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTrace {
    time: Vec<f64>,
    stimulus: Vec<f64>,
    voltage: Vec<f64>,
}

impl NormalizedTrace {
    /// Time (ms)
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Stimulus current (nA)
    pub fn stimulus(&self) -> &[f64] {
        &self.stimulus
    }

    /// Junction potential corrected membrane voltage (mV)
    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Keeps every `stride`-th sample starting at the first, appending the true
    /// final sample when the stride does not land on it
    pub fn downsample(self, stride: usize) -> NormalizedTrace {
        let stride = stride.max(1);
        let n = self.time.len();

        if n == 0 {
            return self;
        }

        let mut indices: Vec<usize> = (0..n).step_by(stride).collect();
        let last_kept = indices[indices.len() - 1];
        if self.time[n - 1] != self.time[last_kept] {
            indices.push(n - 1);
        }

        NormalizedTrace {
            time: indices.iter().map(|&i| self.time[i]).collect(),
            stimulus: indices.iter().map(|&i| self.stimulus[i]).collect(),
            voltage: indices.iter().map(|&i| self.voltage[i]).collect(),
        }
    }
}

/// Converts a raw trace to ms, nA and mV, adding `junction_potential` (mV) to
/// the response exactly once
pub fn normalize(raw: RawTrace, junction_potential: f64) -> NormalizedTrace {
    let RawTrace { time, stimulus, response } = raw;

    NormalizedTrace {
        time: time.into_iter().map(|i| i * MILLI).collect(),
        stimulus: stimulus.into_iter().map(|i| i * NANO).collect(),
        voltage: response.into_iter().map(|i| i * MILLI + junction_potential).collect(),
    }
}

/// Normalizes a raw trace and downsamples it with the default stride
pub fn normalize_and_downsample(raw: RawTrace, junction_potential: f64) -> NormalizedTrace {
    normalize(raw, junction_potential).downsample(DOWNSAMPLE_STRIDE)
}

/// Writes a trace as space separated `time voltage` rows, `time voltage stimulus`
/// when `include_stimulus` is set
pub fn write_trace_to<W: Write>(writer: W, trace: &NormalizedTrace, include_stimulus: bool) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_writer(writer);

    for i in 0..trace.len() {
        let mut record = vec![trace.time[i].to_string(), trace.voltage[i].to_string()];
        if include_stimulus {
            record.push(trace.stimulus[i].to_string());
        }

        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes a trace file, see [`write_trace_to`]
pub fn write_trace_file(path: impl AsRef<Path>, trace: &NormalizedTrace, include_stimulus: bool) -> Result<()> {
    write_trace_to(File::create(path)?, trace, include_stimulus)
}

/// Reads the time and voltage columns of space separated trace text
pub fn read_trace_from<R: Read>(reader: R, name: &str) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let malformed = |reason: String| FeatureError::MalformedTrace { path: String::from(name), reason };

    let mut time = vec![];
    let mut voltage = vec![];
    for (n, record) in reader.records().enumerate() {
        let record = record?;
        let values = record.iter()
            .filter(|i| !i.is_empty())
            .map(|i| i.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| malformed(format!("line {}: {}", n + 1, e)))?;

        if values.is_empty() {
            continue;
        }
        if values.len() < 2 {
            return Err(malformed(format!("line {} has fewer than two columns", n + 1)).into());
        }

        time.push(values[0]);
        voltage.push(values[1]);
    }

    Ok((time, voltage))
}

/// Reads the time and voltage columns of a trace file
pub fn read_trace_file(path: impl AsRef<Path>) -> Result<(Vec<f64>, Vec<f64>)> {
    let path = path.as_ref();

    read_trace_from(File::open(path)?, &path.display().to_string())
}
