//! Reproducibility filtering by relative standard deviation
//!
//! Breath features should rise and fall with exhalation. A feature whose
//! non-zero trace is very uneven is more likely noise, so features are kept
//! only when their RSD stays at or below a threshold.

use super::FeatureSet;

/// Population standard deviation of the non-zero values divided by their mean
///
/// Returns 0 for an empty or constant series.
pub fn relative_std_dev(series: &[f64]) -> f64 {
    let values: Vec<f64> = series.iter().copied().filter(|&v| v != 0.0).collect();
    if values.is_empty() {
        return 0.0;
    }

    if values.iter().all(|&v| v == values[0]) {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if variance <= 0.0 || mean == 0.0 {
        return 0.0;
    }
    variance.sqrt() / mean.abs()
}

/// Linear-interpolated quantile `q` of the feature RSDs
///
/// Useful for deriving a threshold from the run itself. `None` for an empty set.
pub fn rsd_quantile(feature_set: &FeatureSet, q: f64) -> Option<f64> {
    let mut values: Vec<f64> = feature_set
        .iter()
        .map(|f| relative_std_dev(&f.intensity))
        .collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let position = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(values[lower] + (values[upper] - values[lower]) * fraction)
}

/// Scalar RSD cutoff over a feature set
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityFilter;

impl QualityFilter {
    /// Create a filter
    pub fn new() -> Self {
        Self
    }

    /// Keep features with `rsd ≤ rsd_threshold`, recording their RSD
    pub fn filter(&self, feature_set: &FeatureSet, rsd_threshold: f64) -> FeatureSet {
        let kept: Vec<_> = feature_set
            .iter()
            .filter_map(|feature| {
                let rsd = relative_std_dev(&feature.intensity);
                (rsd <= rsd_threshold).then(|| {
                    let mut feature = feature.clone();
                    feature.rsd = Some(rsd);
                    feature
                })
            })
            .collect();

        log::debug!(
            "{}: RSD filter ≤ {} kept {} of {} features",
            feature_set.source(),
            rsd_threshold,
            kept.len(),
            feature_set.len()
        );

        feature_set.with_features(kept)
    }
}
