//! # Ephys Features
//!
//! `ephys_features` turns patch-clamp recordings into the training data of a
//! biophysical neuron model optimizer. Recorded sweeps are characterized to
//! find their stimulus, normalized to ms, nA and junction potential corrected
//! mV, merged across repeats into stimulus conditions and reduced to
//! electrophysiological features with a mean and standard deviation per
//! condition. The conditions and features each optimization stage trains on
//! are then selected from the full set.
//!
//! ## Pipeline
//!
//! 1. [`stimulus`] finds stimulus onset, offset, amplitude and holding current
//! 2. [`normalize`] scales and downsamples traces
//! 3. [`stim_map`] merges repeats into conditions and writes `StimMapReps.csv`
//! 4. [`features`] aggregates per sweep features over repeats
//! 5. [`variance`] corrects standard deviations of singly measured features
//! 6. [`stage`] selects the training and test sets of a stage
//!
//! ## Example Code
//!
//! ### Selecting the active stage training set
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use ephys_features::{
//!     features::{ConditionFeatures, FeatureRecord, FeatureStat},
//!     protocol::{ProtocolMap, ProtocolRecord, StimulusPulse},
//!     stage::{select, ActiveOptions, Stage},
//! };
//!
//! /// Condition with a single square pulse of `amp` nA
//! fn protocol(amp: f64) -> ProtocolRecord {
//!     ProtocolRecord {
//!         stimuli: vec![
//!             StimulusPulse {
//!                 pulse_type: String::from("SquarePulse"),
//!                 amp,
//!                 amp_end: Some(amp),
//!                 delay: 270.,
//!                 duration: 1000.,
//!                 stim_end: 1270.,
//!                 totduration: 1500.,
//!                 sweep_filenames: vec![],
//!             }
//!         ],
//!         extra_recordings: None,
//!     }
//! }
//!
//! /// Condition firing `spikes` spikes
//! fn condition(spikes: f64) -> ConditionFeatures {
//!     let mut soma = BTreeMap::new();
//!     soma.insert(String::from("Spikecount"), FeatureStat::new(spikes, 1.));
//!
//!     ConditionFeatures { soma }
//! }
//!
//! let mut features = FeatureRecord::new();
//! let mut protocols = ProtocolMap::new();
//! for (name, amp, spikes) in [("LongDC_1", 0.05, 0.), ("LongDC_2", 0.1, 3.), ("LongDC_3", 0.15, 7.)] {
//!     features.insert(String::from(name), condition(spikes));
//!     protocols.insert(String::from(name), protocol(amp));
//! }
//!
//! let selection = select(&Stage::Active(ActiveOptions::default()), &features, &protocols);
//!
//! assert!(selection.train_features.contains_key("LongDC_2"));
//! assert!(selection.train_features.contains_key("LongDC_3"));
//! assert!(selection.test_features.contains_key("LongDC_1"));
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod normalize;
pub mod params;
pub mod pipeline;
pub mod protocol;
pub mod provenance;
pub mod stage;
pub mod stim_map;
pub mod stimulus;
pub mod sweep;
pub mod variance;
