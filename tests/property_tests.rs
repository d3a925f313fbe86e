//! Property-based tests for alignment, peak detection and RSD filtering

use std::collections::BTreeSet;

use breathxplorer::prelude::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// A feature set whose m/z values sit on a 0.0003 grid, so that neighbours
/// from different sets often fall inside the default alignment window
fn feature_set_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::btree_map(0u32..200, 1u32..1000, 0..25)
        .prop_map(|m| m.into_iter().collect())
}

fn build_set(name: &str, ticks: &[(u32, u32)]) -> FeatureSet {
    let features = ticks
        .iter()
        .map(|&(k, intensity)| Feature::new(100.0 + k as f64 * 0.0003, intensity as f64, vec![intensity as f64]))
        .collect();
    FeatureSet::new(name, vec![0.0], features).unwrap()
}

fn signal_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..100.0, 3..80)
}

fn axis(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 * 0.5).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Reordering the inputs only reorders the columns
    #[test]
    fn test_alignment_permutation_invariance(
        sets in prop::collection::vec(feature_set_strategy(), 1..5),
        rotation in 0usize..5,
    ) {
        let names: Vec<String> = (0..sets.len()).map(|i| format!("s{}", i)).collect();
        let built: Vec<FeatureSet> = sets.iter().zip(&names).map(|(s, n)| build_set(n, s)).collect();

        let shift = rotation % sets.len();
        let mut rotated_sets = built.clone();
        rotated_sets.rotate_left(shift);
        let mut rotated_names = names.clone();
        rotated_names.rotate_left(shift);

        let engine = AlignmentEngine::default();
        let original = engine.align_default(&built, &names).unwrap();
        let rotated = engine.align_default(&rotated_sets, &rotated_names).unwrap();

        prop_assert_eq!(original.len(), rotated.len());
        let mz_a: Vec<f64> = original.rows().iter().map(|r| r.mz).collect();
        let mz_b: Vec<f64> = rotated.rows().iter().map(|r| r.mz).collect();
        prop_assert_eq!(mz_a, mz_b);
        for name in &names {
            prop_assert_eq!(original.column(name), rotated.column(name));
        }
    }

    /// Every feature lands in exactly one cell of its own column
    #[test]
    fn test_alignment_preserves_intensity(sets in prop::collection::vec(feature_set_strategy(), 1..4)) {
        let names: Vec<String> = (0..sets.len()).map(|i| format!("s{}", i)).collect();
        let built: Vec<FeatureSet> = sets.iter().zip(&names).map(|(s, n)| build_set(n, s)).collect();
        let sample = AlignmentEngine::default().align_default(&built, &names).unwrap();

        for (set, name) in built.iter().zip(&names) {
            let column = sample.column(name).unwrap();
            let expected: f64 = set.iter().map(|f| f.total_intensity).sum();
            prop_assert_eq!(column.iter().sum::<f64>(), expected);
            prop_assert_eq!(column.iter().filter(|&&v| v > 0.0).count(), set.len());
        }
    }

    /// A single set aligns to itself
    #[test]
    fn test_single_set_alignment_identity(ticks in feature_set_strategy()) {
        let set = build_set("only", &ticks);
        let sample = AlignmentEngine::default().align_default(&[set.clone()], &["only"]).unwrap();

        prop_assert_eq!(sample.len(), set.len());
        for (row, feature) in sample.rows().iter().zip(set.iter()) {
            prop_assert_eq!(row.mz, feature.mz);
            prop_assert_eq!(&row.intensities, &vec![feature.total_intensity]);
        }
    }

    /// Raising the quality never adds peaks
    #[test]
    fn test_topological_filtering_is_monotone(
        signal in signal_strategy(),
        q1 in 0.0f64..1.0,
        q2 in 0.0f64..1.0,
    ) {
        let (low, high) = if q1 <= q2 { (q1, q2) } else { (q2, q1) };
        let time = axis(signal.len());

        let apexes = |q: f64| -> BTreeSet<u64> {
            TopologicalDetector::new(q)
                .detect(&time, &signal)
                .peaks
                .iter()
                .map(|p| p.apex_time.to_bits())
                .collect()
        };

        let loose = apexes(low);
        let strict = apexes(high);
        prop_assert!(strict.is_subset(&loose));
    }

    /// Topological peaks are ordered and do not overlap
    #[test]
    fn test_topological_peaks_are_disjoint(signal in signal_strategy(), q in 0.0f64..1.0) {
        let time = axis(signal.len());
        let peaks = TopologicalDetector::new(q).detect(&time, &signal).peaks;

        for peak in &peaks {
            prop_assert!(peak.start_time <= peak.apex_time && peak.apex_time <= peak.end_time);
        }
        for pair in peaks.windows(2) {
            prop_assert!(pair[0].end_time <= pair[1].start_time);
        }
    }

    /// A k-component mixture yields at most k intervals, inside the time axis
    #[test]
    fn test_mixture_interval_count(signal in signal_strategy(), k in 1usize..5) {
        let time = axis(signal.len());
        let detection = GaussianMixtureDetector::new(k).detect(&time, &signal);

        prop_assert!(detection.peaks.len() <= k);
        prop_assert!(detection.peaks.len() <= signal.len());
        let last = time[time.len() - 1];
        for peak in &detection.peaks {
            prop_assert!(peak.start_time >= 0.0 && peak.end_time <= last);
        }
    }

    /// Constant series have zero RSD and survive a zero threshold
    #[test]
    fn test_constant_series_rsd(value in 0.1f64..1e6, n in 1usize..50) {
        let series = vec![value; n];
        prop_assert_eq!(relative_std_dev(&series), 0.0);

        let set = FeatureSet::new("c", axis(n), vec![Feature::new(1.0, value, series)]).unwrap();
        prop_assert_eq!(QualityFilter::new().filter(&set, 0.0).len(), 1);
        prop_assert_eq!(QualityFilter::new().filter(&set, -1e-9).len(), 0);
    }

    /// Filtering keeps exactly the features at or below the threshold
    #[test]
    fn test_quality_filter_threshold(
        series in prop::collection::vec(prop::collection::vec(0.0f64..50.0, 4), 1..10),
        threshold in 0.0f64..2.0,
    ) {
        let features = series
            .iter()
            .enumerate()
            .map(|(i, s)| Feature::new(100.0 + i as f64, 1.0, s.clone()))
            .collect();
        let set = FeatureSet::new("r", axis(4), features).unwrap();
        let kept = QualityFilter::new().filter(&set, threshold);

        let expected = set.iter().filter(|f| relative_std_dev(&f.intensity) <= threshold).count();
        prop_assert_eq!(kept.len(), expected);
        for feature in &kept {
            prop_assert!(feature.rsd.unwrap() <= threshold);
        }
    }
}
