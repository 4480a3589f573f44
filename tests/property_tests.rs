#[cfg(test)]
mod tests {
    extern crate ephys_features;
    use std::collections::BTreeMap;
    use proptest::prelude::*;
    use ephys_features::{
        features::{aggregate_feature, ConditionFeatures, FeatureRecord, FeatureStat, PEAK_TIME},
        normalize::{normalize, RawTrace},
        params::{adjust_param_bounds, ModelParameter},
        protocol::{ProtocolMap, ProtocolRecord, StimulusPulse},
        stage::{select_active, ActiveOptions},
        stim_map::{build, StimMapRow},
    };

    fn arb_condition() -> impl Strategy<Value = (f64, bool)> {
        (-0.5f64..0.5, any::<bool>())
    }

    fn parameter(value: Option<f64>, bounds: Option<[f64; 2]>) -> ModelParameter {
        ModelParameter {
            param_name: String::from("gbar_Ih"),
            sectionlist: Some(String::from("somatic")),
            value,
            bounds,
            param_type: None,
            dist_type: None,
        }
    }

    fn pulse(amp: f64) -> StimulusPulse {
        StimulusPulse {
            pulse_type: String::from("SquarePulse"),
            amp,
            amp_end: Some(amp),
            delay: 270.,
            duration: 1000.,
            stim_end: 1270.,
            totduration: 2000.,
            sweep_filenames: vec![],
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_single_repeat_std_scales_with_mean(value in -200f64..200.) {
            let stat = aggregate_feature("voltage_base", &[Some(vec![value])]).unwrap();

            let expected = if value == 0. { 0.05 } else { 0.05 * value.abs() };
            prop_assert_eq!(stat.std, Some(expected));
            prop_assert_eq!(stat.repeats(), Some(1));
        }

        #[test]
        fn prop_peak_time_never_numeric(
            repeats in proptest::collection::vec(proptest::collection::vec(0f64..3000., 1..10), 1..5)
        ) {
            let per_repeat: Vec<Option<Vec<f64>>> = repeats.iter().cloned().map(Some).collect();
            let stat = aggregate_feature(PEAK_TIME, &per_repeat).unwrap();

            prop_assert_eq!(stat.mean, None);
            prop_assert_eq!(stat.std, None);
            prop_assert_eq!(stat.raw, Some(repeats));
        }

        #[test]
        fn prop_downsample_keeps_stride_and_endpoint(n in 1usize..3000, stride in 1usize..12) {
            let raw = RawTrace::from_sampling_rate(vec![0.; n], vec![-0.07; n], 200_000.);
            let full = normalize(raw, -14.);
            let last = full.time()[n - 1];

            let trace = full.downsample(stride);

            let expected = (n + stride - 1) / stride + usize::from((n - 1) % stride != 0);
            prop_assert_eq!(trace.len(), expected);
            prop_assert_eq!(trace.time()[trace.len() - 1], last);
            prop_assert_eq!(trace.time()[0], 0.);
        }

        #[test]
        fn prop_identical_timing_gives_one_row(amp in -500i32..500, repeats in 1u32..8) {
            let amplitude = amp as f64 * 1e-12;
            let rows: Vec<StimMapRow> = (0..repeats)
                .map(|i| StimMapRow {
                    distinct_id: format!("LongDC_{}", i),
                    stim_type: String::from("SquarePulse"),
                    holding_current: 0.,
                    amplitude_start: amplitude,
                    amplitude_end: amplitude,
                    stim_start: 270.,
                    stim_end: 1270.,
                    duration: 2000.,
                    data_path: vec![format!("LongDC_{}.txt", i)],
                })
                .collect();
            let sweep_numbers: BTreeMap<String, u32> = (0..repeats)
                .map(|i| (format!("LongDC_{}", i), i))
                .collect();

            let stim_map = build(&BTreeMap::from([(String::from("LongDC"), rows)]), &sweep_numbers).unwrap();

            prop_assert_eq!(stim_map.rows.len(), 1);
            prop_assert_eq!(stim_map.rows[0].data_path.len(), repeats as usize);
            prop_assert_eq!(&stim_map.sweep_repeats["LongDC_0"], &(0..repeats).collect::<Vec<u32>>());
        }

        #[test]
        fn prop_active_training_spikes_above_silence(
            conditions in proptest::collection::vec(arb_condition(), 1..12),
            spike_proto in 0usize..4,
            nospike_proto in 0usize..3,
        ) {
            let mut features = FeatureRecord::new();
            let mut protocols = ProtocolMap::new();
            for (i, (amp, spiking)) in conditions.iter().enumerate() {
                let name = format!("LongDC_{}", i);
                let spike_count = if *spiking { 3. } else { 0. };
                let soma = BTreeMap::from([(String::from("Spikecount"), FeatureStat::new(spike_count, 0.05))]);

                features.insert(name.clone(), ConditionFeatures { soma });
                protocols.insert(name, ProtocolRecord { stimuli: vec![pulse(*amp)], extra_recordings: None });
            }

            let options = ActiveOptions { spike_proto, nospike_proto, ..ActiveOptions::default() };
            let selection = select_active(&features, &protocols, &options);

            let max_silent = conditions.iter()
                .filter(|(_, spiking)| !spiking)
                .map(|(amp, _)| *amp)
                .fold(f64::NEG_INFINITY, f64::max);

            prop_assert!(selection.train_features.len() <= spike_proto + nospike_proto);
            prop_assert_eq!(selection.train_features.len() + selection.test_features.len(), features.len());
            for (name, condition) in selection.train_features.iter() {
                if condition.is_spiking() {
                    prop_assert!(protocols[name].amplitude() >= max_silent);
                }
                prop_assert!(selection.train_protocols.contains_key(name));
            }
        }

        #[test]
        fn prop_adjusted_bounds_stay_inside(
            lower in -10f64..0.,
            width in 0.1f64..20.,
            position in 0f64..1.,
            tolerance in 0.01f64..2.,
        ) {
            let upper = lower + width;
            let value = lower + position * width;

            let adjusted = adjust_param_bounds(
                &parameter(None, Some([lower, upper])),
                &parameter(Some(value), None),
                tolerance,
            ).unwrap();
            let [new_lower, new_upper] = adjusted.bounds.unwrap();

            prop_assert!(new_lower >= lower && new_upper <= upper);
            prop_assert!(new_lower <= value && value <= new_upper);
        }
    }
}
