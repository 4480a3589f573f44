#[cfg(test)]
mod tests {
    extern crate ephys_features;
    use ephys_features::{
        config::NO_STIM_START_INDEX,
        error::StimulusError,
        stimulus::{
            distinct_id_of, gradient, window_mean, Characterizer, CharacterizerKind, CleanStep,
            EpochOntology, NonStandard, OntologyDriven, StimulusCharacterizer, StimulusType,
        },
    };

    const SAMPLING_RATE: f64 = 200_000.;

    fn time_axis(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 / SAMPLING_RATE).collect()
    }

    fn step(n: usize, start: usize, stop: usize, amp: f64) -> Vec<f64> {
        (0..n).map(|i| if i >= start && i < stop { amp } else { 0. }).collect()
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "actual: {}, expected: {}",
            actual,
            expected,
        );
    }

    #[test]
    pub fn test_clean_step_square_pulse() -> Result<(), StimulusError> {
        let n = 30_000;
        let time = time_axis(n);
        let stimulus = step(n, 5_000, 10_000, 1e-10);

        let summary = CleanStep.characterize(&time, &stimulus, "LongDC_7")?;

        assert_eq!(summary.start, time[5_000]);
        assert_eq!(summary.stop, time[9_999]);
        assert_close(summary.amp_start, 100., 1e-9);
        assert_close(summary.amp_end, 100., 1e-9);
        assert_eq!(summary.duration, time[n - 1]);
        assert_eq!(summary.holding_current, 0.);

        Ok(())
    }

    #[test]
    pub fn test_clean_step_holding_current_only_for_dc() -> Result<(), StimulusError> {
        let n = 40_000;
        let time = time_axis(n);
        // holding of 20 pA after the step ends at a different level
        let stimulus: Vec<f64> = (0..n)
            .map(|i| {
                if (5_000..10_000).contains(&i) {
                    1.2e-10
                } else if (10_000..30_000).contains(&i) {
                    2e-11
                } else {
                    0.
                }
            })
            .collect();

        let ramp = CleanStep.characterize(&time, &stimulus, "Ramp_3")?;
        assert_eq!(ramp.holding_current, 0.);

        let long_dc = CleanStep.characterize(&time, &stimulus, "LongDC_3")?;
        // no current after the last nonzero sample
        assert_eq!(long_dc.holding_current, 0.);
        assert_eq!(long_dc.stop, time[29_999]);

        Ok(())
    }

    #[test]
    pub fn test_non_standard_holding_current() -> Result<(), StimulusError> {
        let n = 40_000;
        let time = time_axis(n);
        let stimulus: Vec<f64> = step(n, 5_000, 10_000, 1e-10).into_iter()
            .map(|i| i + 2e-11)
            .collect();

        let summary = NonStandard.characterize(&time, &stimulus, "LongDC_9")?;

        assert_close(summary.holding_current, 20., 1e-6);
        assert_close(summary.amp_start, (20. + 4_999. * 120.) / 5_000. - 20., 1e-6);

        let without_dc = NonStandard.characterize(&time, &stimulus, "Noise_1_9")?;
        assert_eq!(without_dc.holding_current, 0.);

        Ok(())
    }

    #[test]
    pub fn test_clean_step_without_stimulus() -> Result<(), StimulusError> {
        let n = 25_000;
        let time = time_axis(n);
        let stimulus = vec![0.; n];

        let summary = CleanStep.characterize(&time, &stimulus, "LongDC_1")?;

        assert_eq!(summary.start, time[NO_STIM_START_INDEX]);
        assert_eq!(summary.stop, time[n - 1]);
        assert_eq!(summary.amp_start, 0.);
        assert_eq!(summary.amp_end, 0.);
        assert_eq!(summary.holding_current, 0.);

        Ok(())
    }

    #[test]
    pub fn test_short_trace_without_stimulus_errors() {
        let time = time_axis(100);
        let stimulus = vec![0.; 100];

        let result = CleanStep.characterize(&time, &stimulus, "LongDC_1");

        assert_eq!(
            result,
            Err(StimulusError::TraceTooShort { name: String::from("LongDC_1"), len: 100, index: NO_STIM_START_INDEX }),
        );
    }

    #[test]
    pub fn test_mismatched_series_error() {
        let time = time_axis(10);
        let stimulus = vec![0.; 11];

        assert_eq!(
            CleanStep.characterize(&time, &stimulus, "LongDC_1"),
            Err(StimulusError::SeriesAreNotSameLength { time: 10, stimulus: 11 }),
        );
        assert_eq!(
            NonStandard.characterize(&[], &[], "LongDC_1"),
            Err(StimulusError::EmptyTrace(String::from("LongDC_1"))),
        );
    }

    #[test]
    pub fn test_non_standard_step_edges() -> Result<(), StimulusError> {
        let n = 30_000;
        let time = time_axis(n);
        let stimulus = step(n, 5_000, 10_000, 1e-10);

        let summary = NonStandard.characterize(&time, &stimulus, "Noise_1_4")?;

        assert_eq!(summary.start, time[4_999]);
        assert_eq!(summary.stop, time[9_999]);
        assert_close(summary.amp_start, 100. * 4_999. / 5_000., 1e-9);
        assert_eq!(summary.amp_start, summary.amp_end);
        assert_eq!(summary.holding_current, 0.);

        Ok(())
    }

    #[test]
    pub fn test_non_standard_earlier_extremum_is_start() -> Result<(), StimulusError> {
        let n = 30_000;
        let time = time_axis(n);

        let positive = NonStandard.characterize(&time, &step(n, 5_000, 10_000, 1e-10), "Noise_1_4")?;
        let negative = NonStandard.characterize(&time, &step(n, 5_000, 10_000, -1e-10), "Noise_1_4")?;

        assert_eq!(positive.start, negative.start);
        assert_eq!(positive.stop, negative.stop);
        assert!(negative.start < negative.stop);
        assert!(negative.amp_start < 0.);

        Ok(())
    }

    #[test]
    pub fn test_non_standard_flat_stimulus() -> Result<(), StimulusError> {
        let n = 50_000;
        let time = time_axis(n);
        let stimulus = vec![2e-11; n];

        let summary = NonStandard.characterize(&time, &stimulus, "LongDC_2")?;

        assert_eq!(summary.start, time[20_000]);
        assert_eq!(summary.stop, time[40_000]);
        assert_eq!(summary.amp_start, 0.);
        assert_close(summary.holding_current, 20., 1e-9);

        let short = NonStandard.characterize(&time_axis(30_000), &vec![0.; 30_000], "LongDC_2");
        assert!(matches!(short, Err(StimulusError::TraceTooShort { index: 40_000, .. })));

        Ok(())
    }

    #[test]
    pub fn test_ontology_skips_test_pulse() -> Result<(), StimulusError> {
        let n = 30_000;
        let time = time_axis(n);
        let stimulus: Vec<f64> = step(n, 5_000, 10_000, 1e-10).into_iter()
            .zip(step(n, 1_000, 1_500, -2e-11))
            .map(|(a, b)| a + b)
            .collect();

        let characterizer = OntologyDriven::new(EpochOntology { skip_test_pulse: true });
        let summary = characterizer.characterize(&time, &stimulus, "LongDC_5")?;

        assert_eq!(summary.start, time[5_000]);
        assert_close(summary.stop, time[9_999], 1e-12);
        assert_close(summary.amp_start, 100., 1e-9);
        assert_close(summary.amp_end, 100., 1e-9);
        assert_eq!(summary.duration, time[n - 1]);
        assert_eq!(summary.holding_current, 0.);

        Ok(())
    }

    #[test]
    pub fn test_ontology_window_capped_after_stimulus() -> Result<(), StimulusError> {
        // 5 s at 1 ms spacing, step from 1 to 2 s
        let n = 5_000;
        let time: Vec<f64> = (0..n).map(|i| i as f64 * 1e-3).collect();
        let stimulus = step(n, 1_000, 2_000, 1e-10);

        let characterizer = OntologyDriven::new(EpochOntology { skip_test_pulse: false });
        let summary = characterizer.characterize(&time, &stimulus, "LongDC_7")?;

        assert_close(summary.start, 1., 1e-12);
        assert_close(summary.stop, 1.999, 1e-12);
        assert_close(summary.duration, 2.999, 1e-12);
        assert!(summary.duration < time[n - 1]);
        assert_close(summary.amp_end, 100., 1e-9);

        Ok(())
    }

    #[test]
    pub fn test_ontology_without_epoch_uses_placeholder() -> Result<(), StimulusError> {
        let n = 25_000;
        let time = time_axis(n);

        let characterizer = Characterizer::from_kind(CharacterizerKind::Ontology, false);
        let summary = characterizer.characterize(&time, &vec![0.; n], "LongDC_5")?;

        assert_eq!(summary.start, time[NO_STIM_START_INDEX]);
        assert_eq!(summary.amp_end, 0.);

        Ok(())
    }

    #[test]
    pub fn test_characterizer_selection() {
        for kind in [CharacterizerKind::CleanStep, CharacterizerKind::Ontology, CharacterizerKind::NonStandard] {
            assert_eq!(Characterizer::from_kind(kind, false).kind(), kind);
        }

        assert_eq!(CharacterizerKind::default(), CharacterizerKind::CleanStep);
    }

    #[test]
    pub fn test_stimulus_type_lookup() {
        let long_square = StimulusType::from_aibs_name("Long Square").unwrap();
        assert_eq!(long_square.distinct_id, "LongDC");
        assert_eq!(long_square.trace_name(45), "LongDC_45");
        assert!(!long_square.current_play);

        let noise = StimulusType::from_aibs_name("Noise 1").unwrap();
        assert!(noise.current_play);
        assert_eq!(StimulusType::from_distinct_id("Noise_1"), Some(noise));

        assert_eq!(
            StimulusType::from_aibs_name("Chirp"),
            Err(StimulusError::UnknownStimulusType(String::from("Chirp"))),
        );

        assert_eq!(distinct_id_of("Short_Square_Triple_12"), "Short_Square_Triple");
        assert_eq!(distinct_id_of("LongDC_45"), "LongDC");
        assert_eq!(distinct_id_of("DB"), "DB");
    }

    #[test]
    pub fn test_helpers() {
        assert_eq!(gradient(&[0., 1., 4., 9.]), vec![1., 2., 4., 5.]);
        assert_eq!(gradient(&[3.]), vec![0.]);
        assert_eq!(window_mean(&[1., 2., 3., 4.], 1, 3), 2.5);
        assert!(window_mean(&[1., 2.], 2, 10).is_nan());
        assert_eq!(window_mean(&[1., 2., 3.], 1, 100), 2.5);
    }
}
