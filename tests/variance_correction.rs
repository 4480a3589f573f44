#[cfg(test)]
mod tests {
    extern crate ephys_features;
    use std::collections::BTreeMap;
    use ndarray::array;
    use ephys_features::{
        features::{ConditionFeatures, FeatureRecord, FeatureStat},
        protocol::{ProtocolMap, ProtocolRecord, StimulusPulse},
        variance::{correct, correct_feature_statistics, correct_voltage_feature_std, ols_residual_rmse},
    };

    fn measured(raw: &[&[f64]], std: f64) -> FeatureStat {
        let raw: Vec<Vec<f64>> = raw.iter().map(|i| i.to_vec()).collect();
        let means: Vec<f64> = raw.iter().map(|i| i.iter().sum::<f64>() / i.len() as f64).collect();
        let mean = means.iter().sum::<f64>() / means.len() as f64;

        FeatureStat { mean: Some(mean), std: Some(std), raw: Some(raw) }
    }

    fn condition(features: Vec<(&str, FeatureStat)>) -> ConditionFeatures {
        ConditionFeatures {
            soma: features.into_iter().map(|(name, stat)| (String::from(name), stat)).collect(),
        }
    }

    fn protocol(amp: f64) -> ProtocolRecord {
        ProtocolRecord {
            stimuli: vec![
                StimulusPulse {
                    pulse_type: String::from("SquarePulse"),
                    amp,
                    amp_end: Some(amp),
                    delay: 270.,
                    duration: 1000.,
                    stim_end: 1270.,
                    totduration: 2000.,
                    sweep_filenames: vec![],
                },
            ],
            extra_recordings: None,
        }
    }

    fn std_of(features: &FeatureRecord, condition: &str, feature: &str) -> Option<f64> {
        features[condition].soma[feature].std
    }

    #[test]
    pub fn test_voltage_std_from_population() {
        let mut features = FeatureRecord::new();
        features.insert(
            String::from("LongDC_1"),
            condition(vec![
                ("voltage_base", measured(&[&[-80.]], 4.)),
                ("steady_state_voltage", measured(&[&[-75.]], 3.75)),
            ]),
        );
        features.insert(String::from("LongDC_2"), condition(vec![("voltage_base", measured(&[&[-76.]], 3.8))]));
        features.insert(
            String::from("LongDC_3"),
            condition(vec![("voltage_base", measured(&[&[-70.], &[-72.]], 1.))]),
        );
        features.insert(String::from("LongDC_4"), condition(vec![("Spikecount", measured(&[&[3.]], 0.15))]));

        let corrected = correct_voltage_feature_std(&features);

        assert_eq!(std_of(&corrected, "LongDC_1", "voltage_base"), Some(2.));
        assert_eq!(std_of(&corrected, "LongDC_2", "voltage_base"), Some(2.));
        // repeated measurements keep their own spread
        assert_eq!(std_of(&corrected, "LongDC_3", "voltage_base"), Some(1.));
        // measured once in one condition only
        assert_eq!(std_of(&corrected, "LongDC_1", "steady_state_voltage"), Some(0.05));
        assert_eq!(std_of(&corrected, "LongDC_4", "Spikecount"), Some(0.15));

        assert_eq!(std_of(&features, "LongDC_1", "voltage_base"), Some(4.));
    }

    #[test]
    pub fn test_ols_residual_rmse() {
        assert_eq!(ols_residual_rmse(&array![1., 2., 3.], &array![2., 4., 6.]), 0.);

        let rmse = ols_residual_rmse(&array![1., 2., 3., 4.], &array![1., 3., 2., 4.]);
        assert!((rmse - 0.45_f64.sqrt()).abs() < 1e-12);

        // constant amplitude leaves only the intercept
        let rmse = ols_residual_rmse(&array![1., 1., 1.], &array![1., 2., 3.]);
        assert!((rmse - 0.5_f64.sqrt()).abs() < 1e-12);

        assert!(ols_residual_rmse(&array![1., 2.], &array![1., 5.]).is_nan());
        assert!(ols_residual_rmse(&array![1.], &array![1.]).is_nan());
        assert!(ols_residual_rmse(&array![], &array![]).is_nan());
        assert!(ols_residual_rmse(&array![1., 2.], &array![1., 2., 3.]).is_nan());
    }

    fn regression_record() -> (FeatureRecord, ProtocolMap) {
        let mut features = FeatureRecord::new();
        features.insert(
            String::from("LongDC_1"),
            condition(vec![
                ("Spikecount", measured(&[&[0.]], 0.05)),
                ("voltage_base", measured(&[&[-80.]], 4.)),
                ("voltage_deflection_vb_ssse", measured(&[&[-5.]], 0.25)),
            ]),
        );
        features.insert(
            String::from("LongDC_2"),
            condition(vec![
                ("Spikecount", measured(&[&[0.]], 0.05)),
                ("voltage_base", measured(&[&[-78.]], 3.9)),
                ("voltage_deflection_vb_ssse", measured(&[&[-10.]], 0.5)),
            ]),
        );
        features.insert(
            String::from("LongDC_3"),
            condition(vec![
                ("Spikecount", measured(&[&[4.]], 0.1)),
                ("voltage_base", measured(&[&[-77.], &[-75.]], 1.)),
                ("voltage_deflection_vb_ssse", measured(&[&[-20.]], 0.7)),
                ("peak_time", FeatureStat::not_applicable(vec![vec![300.]])),
            ]),
        );
        features.insert(String::from("Ramp_4"), condition(vec![("voltage_base", measured(&[&[-60.]], 3.))]));
        features.insert(String::from("LongDC_9"), condition(vec![("voltage_base", measured(&[&[-50.]], 2.5))]));

        let protocols = BTreeMap::from([
            (String::from("LongDC_1"), protocol(0.1)),
            (String::from("LongDC_2"), protocol(0.2)),
            (String::from("LongDC_3"), protocol(0.3)),
            (String::from("Ramp_4"), protocol(0.4)),
        ]);

        (features, protocols)
    }

    #[test]
    pub fn test_regression_correction() {
        let (features, protocols) = regression_record();

        let corrected = correct_feature_statistics(&features, &protocols);

        let expected = ols_residual_rmse(&array![0.1, 0.2, 0.3, 0.3], &array![-80., -78., -77., -75.]);
        assert!(expected > 0.);
        assert_eq!(std_of(&corrected, "LongDC_1", "voltage_base"), Some(expected));
        assert_eq!(std_of(&corrected, "LongDC_2", "voltage_base"), Some(expected));
        assert_eq!(std_of(&corrected, "LongDC_3", "voltage_base"), Some(1.));

        // other stimulus types and conditions without protocol are left alone
        assert_eq!(std_of(&corrected, "Ramp_4", "voltage_base"), Some(3.));
        assert_eq!(std_of(&corrected, "LongDC_9", "voltage_base"), Some(2.5));
    }

    #[test]
    pub fn test_regression_fallbacks() {
        let (features, protocols) = regression_record();

        let corrected = correct_feature_statistics(&features, &protocols);

        // only one spiking condition to fit the spike count on
        assert!((std_of(&corrected, "LongDC_3", "Spikecount").unwrap() - 0.2).abs() < 1e-12);
        // non-spiking spike counts are not revised
        assert_eq!(std_of(&corrected, "LongDC_1", "Spikecount"), Some(0.05));

        // two subthreshold points leave no residual degrees of freedom
        assert!((std_of(&corrected, "LongDC_1", "voltage_deflection_vb_ssse").unwrap() - 0.25).abs() < 1e-12);
        assert!((std_of(&corrected, "LongDC_2", "voltage_deflection_vb_ssse").unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(std_of(&corrected, "LongDC_3", "voltage_deflection_vb_ssse"), Some(0.7));

        assert_eq!(corrected["LongDC_3"].soma["peak_time"], features["LongDC_3"].soma["peak_time"]);
    }

    #[test]
    pub fn test_both_corrections_applied() {
        let mut features = FeatureRecord::new();
        for (name, value) in [("LongDC_1", -80.), ("LongDC_2", -78.), ("LongDC_3", -77.), ("Ramp_4", -79.)] {
            features.insert(String::from(name), condition(vec![("voltage_base", measured(&[&[value]], 4.))]));
        }
        let protocols = BTreeMap::from([
            (String::from("LongDC_1"), protocol(1.)),
            (String::from("LongDC_2"), protocol(2.)),
            (String::from("LongDC_3"), protocol(3.)),
        ]);

        let corrected = correct(&features, &protocols);

        let rmse = ols_residual_rmse(&array![1., 2., 3.], &array![-80., -78., -77.]);
        assert!(rmse > 0.);
        for name in ["LongDC_1", "LongDC_2", "LongDC_3"] {
            assert_eq!(std_of(&corrected, name, "voltage_base"), Some(rmse));
        }
        // population std of the four single repeat means
        assert!((std_of(&corrected, "Ramp_4", "voltage_base").unwrap() - 1.25f64.sqrt()).abs() < 1e-12);

        assert_eq!(std_of(&features, "Ramp_4", "voltage_base"), Some(4.));
    }

    #[test]
    pub fn test_perfect_fit_falls_back_to_mean_fraction() {
        let mut features = FeatureRecord::new();
        features.insert(String::from("LongDC_1"), condition(vec![("AP_amplitude", measured(&[&[80.]], 1.))]));
        features.insert(String::from("LongDC_2"), condition(vec![("AP_amplitude", measured(&[&[90.]], 1.))]));
        features.insert(String::from("LongDC_3"), condition(vec![("AP_amplitude", measured(&[&[100.]], 1.))]));

        let protocols = BTreeMap::from([
            (String::from("LongDC_1"), protocol(1.)),
            (String::from("LongDC_2"), protocol(2.)),
            (String::from("LongDC_3"), protocol(3.)),
        ]);

        let corrected = correct_feature_statistics(&features, &protocols);

        for (name, mean) in [("LongDC_1", 80.), ("LongDC_2", 90.), ("LongDC_3", 100.)] {
            assert_eq!(std_of(&corrected, name, "AP_amplitude"), Some(0.05 * mean));
        }
    }
}
