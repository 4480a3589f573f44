//! Error sets for each stage of the extraction pipeline and a crate level error
//! that wraps them.

use thiserror::Error;


/// Error set for stimulus characterization
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StimulusError {
    /// Time and stimulus series do not have the same number of samples
    #[error("Time ({time}) and stimulus ({stimulus}) series must be the same length")]
    SeriesAreNotSameLength { time: usize, stimulus: usize },
    /// Trace is empty
    #[error("Trace {0} is empty")]
    EmptyTrace(String),
    /// Trace is shorter than a fixed fallback marker requires
    #[error("Trace {name} has {len} samples but fallback marker needs index {index}")]
    TraceTooShort { name: String, len: usize, index: usize },
    /// Stimulus name has no known mapping
    #[error("Unknown stimulus type: {0}")]
    UnknownStimulusType(String),
}

/// Error set for building and reading stimulus maps
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StimMapError {
    /// Repeats of one condition do not share a start time
    #[error("Stim type {stim_type} Amplitude {amplitude} don't have equal start times: {times:?}")]
    InconsistentStartTimes { stim_type: String, amplitude: String, times: Vec<String> },
    /// Repeats of one condition do not share a stop time
    #[error("Stim type {stim_type} Amplitude {amplitude} don't have equal stop times: {times:?}")]
    InconsistentStopTimes { stim_type: String, amplitude: String, times: Vec<String> },
    /// Trace name has no associated sweep number
    #[error("Trace {0} has no sweep number")]
    MissingSweepNumber(String),
    /// A stim map row could not be parsed
    #[error("Malformed stim map row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },
}

/// Error set for feature extraction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// Persisted trace file could not be parsed
    #[error("Malformed trace file {path}: {reason}")]
    MalformedTrace { path: String, reason: String },
    /// Condition has no stimuli to take timing from
    #[error("Condition {0} has no stimuli")]
    ConditionHasNoStimuli(String),
    /// Calculator returned a different number of results than sweeps given
    #[error("Feature calculator returned {returned} results for {expected} sweeps")]
    CalculatorResultMismatch { expected: usize, returned: usize },
}

/// Error set for model parameter handling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// Bound tolerance is below zero
    #[error("Tolerance for parameter bounds has to be positive, got {0}")]
    NegativeTolerance(f64),
    /// Parameter has no bounds to adjust
    #[error("Parameter {0} has no bounds")]
    MissingBounds(String),
    /// Previous stage parameter has no value
    #[error("Parameter {0} has no value from previous stage")]
    MissingValue(String),
}

/// Error set for run configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Stage name is not one of `passive`, `basic` or `active`
    #[error("Unknown optimization stage: {0}")]
    UnknownStage(String),
    /// Requested sweep source does not exist
    #[error("Recording source not found: {0}")]
    RecordingSourceNotFound(String),
}

/// A set of errors that may occur when using the library
#[derive(Error, Debug)]
pub enum EphysError {
    /// Errors related to stimulus characterization
    #[error(transparent)]
    StimulusRelatedError(#[from] StimulusError),
    /// Errors related to stimulus maps
    #[error(transparent)]
    StimMapRelatedError(#[from] StimMapError),
    /// Errors related to feature extraction
    #[error(transparent)]
    FeatureRelatedError(#[from] FeatureError),
    /// Errors related to model parameters
    #[error(transparent)]
    ParameterRelatedError(#[from] ParameterError),
    /// Errors related to configuration
    #[error(transparent)]
    ConfigRelatedError(#[from] ConfigError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, EphysError>;
