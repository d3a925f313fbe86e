//! # Features
//!
//! A [`Feature`] is one m/z bucket that carried at least one accepted peak,
//! with its integrated intensity and its trace along the run's time axis.
//! A [`FeatureSet`] holds the features of one run, ascending by m/z.
//!
//! Submodules:
//! - [`extractor`]: raw scans to a feature set
//! - [`quality`]: RSD-based reproducibility filtering

use std::fmt;

use serde::Serialize;

pub mod extractor;
pub mod quality;

pub use extractor::{Extraction, ExtractionConfig, ExtractionWarning, FeatureExtractor};
pub use quality::{relative_std_dev, rsd_quantile, QualityFilter};

use crate::tolerance::Tolerance;

/// Errors that abort feature extraction
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// A scan violates the raw-scan contract
    #[error("Malformed scan {scan_index}: {reason}")]
    MalformedInput {
        /// Position of the scan in the input slice
        scan_index: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A feature series does not follow the set's time axis
    #[error("Series length mismatch at m/z {mz}: time axis has {time_len} points, series has {series_len}")]
    SeriesLengthMismatch {
        /// m/z of the offending feature
        mz: f64,
        /// Length of the time axis
        time_len: usize,
        /// Length of the series
        series_len: usize,
    },

    /// Two features share an m/z
    #[error("Duplicate feature m/z {mz}")]
    DuplicateMz {
        /// The repeated m/z
        mz: f64,
    },

    /// A detection parameter is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Tables whose rows are keyed by m/z
///
/// Implemented by [`FeatureSet`] and [`crate::alignment::Sample`] so that
/// annotation and tandem retrieval accept either.
pub trait MzTable {
    /// Row m/z values, ascending
    fn mz_values(&self) -> Vec<f64>;

    /// Number of rows
    fn row_count(&self) -> usize {
        self.mz_values().len()
    }
}

impl<T: MzTable + ?Sized> MzTable for Box<T> {
    fn mz_values(&self) -> Vec<f64> {
        (**self).mz_values()
    }

    fn row_count(&self) -> usize {
        (**self).row_count()
    }
}

/// One detected VOC feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    /// Bucket m/z
    pub mz: f64,
    /// Integrated intensity over the accepted peak intervals
    pub total_intensity: f64,
    /// Intensity along the set's time axis, zero outside the peak span
    pub intensity: Vec<f64>,
    /// Relative standard deviation, set by [`QualityFilter`]
    pub rsd: Option<f64>,
}

impl Feature {
    /// Create a feature without an RSD
    pub fn new(mz: f64, total_intensity: f64, intensity: Vec<f64>) -> Self {
        Self {
            mz,
            total_intensity,
            intensity,
            rsd: None,
        }
    }
}

/// Features of one run on a shared time axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    source: String,
    time: Vec<f64>,
    features: Vec<Feature>,
}

impl FeatureSet {
    /// Create a set, sorting features by m/z
    ///
    /// Fails when a feature series does not have one value per time point, or
    /// when two features share an m/z.
    pub fn new(
        source: impl Into<String>,
        time: Vec<f64>,
        mut features: Vec<Feature>,
    ) -> Result<Self, ExtractError> {
        if let Some(bad) = features.iter().find(|f| f.intensity.len() != time.len()) {
            return Err(ExtractError::SeriesLengthMismatch {
                mz: bad.mz,
                time_len: time.len(),
                series_len: bad.intensity.len(),
            });
        }
        features.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        if let Some(pair) = features.windows(2).find(|pair| pair[1].mz <= pair[0].mz) {
            return Err(ExtractError::DuplicateMz { mz: pair[1].mz });
        }
        Ok(Self {
            source: source.into(),
            time,
            features,
        })
    }

    /// A set with a time axis and no features
    pub fn empty(source: impl Into<String>, time: Vec<f64>) -> Self {
        Self {
            source: source.into(),
            time,
            features: Vec::new(),
        }
    }

    /// Same source and axis, different features (already validated and ordered)
    pub(crate) fn with_features(&self, features: Vec<Feature>) -> Self {
        Self {
            source: self.source.clone(),
            time: self.time.clone(),
            features,
        }
    }

    /// Run the set was extracted from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Time axis in seconds
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Features ascending by m/z
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set has no features
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate features ascending by m/z
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Nearest feature within `tolerance` of `mz`
    ///
    /// On an exact distance tie the lower m/z wins.
    pub fn get(&self, mz: f64, tolerance: Tolerance) -> Option<&Feature> {
        let upper = self.features.partition_point(|f| f.mz < mz);
        let below = upper.checked_sub(1).map(|i| &self.features[i]);
        let above = self.features.get(upper);

        let candidate = match (below, above) {
            (Some(b), Some(a)) => {
                if (mz - b.mz).abs() <= (a.mz - mz).abs() {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };
        tolerance.matches(mz, candidate.mz).then_some(candidate)
    }

    /// Interpolate every feature onto another time axis
    ///
    /// Values outside the original axis are extrapolated from the end
    /// segments; negative results are clamped to zero. Integrated intensities
    /// and RSDs are carried over unchanged.
    pub fn resample(&self, axis: &[f64]) -> FeatureSet {
        let features = self
            .features
            .iter()
            .map(|f| Feature {
                intensity: axis
                    .iter()
                    .map(|&t| interpolate(&self.time, &f.intensity, t).max(0.0))
                    .collect(),
                ..f.clone()
            })
            .collect();

        Self {
            source: self.source.clone(),
            time: axis.to_vec(),
            features,
        }
    }
}

impl MzTable for FeatureSet {
    fn mz_values(&self) -> Vec<f64> {
        self.features.iter().map(|f| f.mz).collect()
    }

    fn row_count(&self) -> usize {
        self.features.len()
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} features over {} scans",
            self.source,
            self.features.len(),
            self.time.len()
        )
    }
}

/// Sorted union of the time axes of several sets
pub fn time_union(sets: &[FeatureSet]) -> Vec<f64> {
    let mut axis: Vec<f64> = sets.iter().flat_map(|s| s.time.iter().copied()).collect();
    axis.sort_by(f64::total_cmp);
    axis.dedup();
    axis
}

/// Piecewise-linear value of `(x, y)` at `t`, extrapolating from the end segments
pub(crate) fn interpolate(x: &[f64], y: &[f64], t: f64) -> f64 {
    match x.len() {
        0 => 0.0,
        1 => y[0],
        n => {
            let upper = x.partition_point(|&v| v < t).clamp(1, n - 1);
            let (x0, x1) = (x[upper - 1], x[upper]);
            let (y0, y1) = (y[upper - 1], y[upper]);
            if x1 == x0 {
                y0
            } else {
                y0 + (y1 - y0) * (t - x0) / (x1 - x0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> FeatureSet {
        FeatureSet::new(
            "run",
            vec![0.0, 1.0, 2.0],
            vec![
                Feature::new(150.0, 3.0, vec![0.0, 2.0, 1.0]),
                Feature::new(100.0, 5.0, vec![1.0, 4.0, 0.0]),
                Feature::new(100.002, 1.0, vec![0.0, 1.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_features_sorted_by_mz() {
        let set = sample_set();
        assert_eq!(set.mz_values(), vec![100.0, 100.002, 150.0]);
        assert_eq!(set.row_count(), 3);
    }

    #[test]
    fn test_series_length_is_checked() {
        let result = FeatureSet::new("bad", vec![0.0, 1.0], vec![Feature::new(1.0, 1.0, vec![1.0])]);
        assert!(matches!(
            result,
            Err(ExtractError::SeriesLengthMismatch { time_len: 2, series_len: 1, .. })
        ));
    }

    #[test]
    fn test_get_nearest_within_tolerance() {
        let set = sample_set();
        let tol = Tolerance::Da(0.005);

        assert_eq!(set.get(100.0004, tol).unwrap().mz, 100.0);
        assert_eq!(set.get(100.0016, tol).unwrap().mz, 100.002);
        assert!(set.get(120.0, tol).is_none());
        assert!(FeatureSet::default().get(100.0, tol).is_none());
    }

    #[test]
    fn test_get_tie_prefers_lower_mz() {
        let set = FeatureSet::new(
            "run",
            vec![0.0],
            vec![Feature::new(100.5, 1.0, vec![1.0]), Feature::new(100.0, 2.0, vec![2.0])],
        )
        .unwrap();

        assert_eq!(set.get(100.25, Tolerance::Da(0.5)).unwrap().mz, 100.0);
    }

    #[test]
    fn test_duplicate_mz_is_rejected() {
        let result = FeatureSet::new(
            "dup",
            vec![0.0],
            vec![
                Feature::new(120.0, 1.0, vec![1.0]),
                Feature::new(100.0, 1.0, vec![1.0]),
                Feature::new(120.0, 2.0, vec![2.0]),
            ],
        );
        assert!(matches!(result, Err(ExtractError::DuplicateMz { mz }) if mz == 120.0));
    }

    #[test]
    fn test_resample_interpolates_and_clamps() {
        let set = FeatureSet::new(
            "run",
            vec![0.0, 2.0],
            vec![Feature::new(100.0, 7.0, vec![4.0, 2.0])],
        )
        .unwrap();

        let resampled = set.resample(&[1.0, 2.0, 3.0, 10.0]);
        assert_eq!(resampled.time(), &[1.0, 2.0, 3.0, 10.0]);
        assert_eq!(resampled.features()[0].intensity, vec![3.0, 2.0, 1.0, 0.0]);
        assert_eq!(resampled.features()[0].total_intensity, 7.0);
    }

    #[test]
    fn test_time_union() {
        let a = FeatureSet::empty("a", vec![0.0, 2.0, 4.0]);
        let b = FeatureSet::empty("b", vec![1.0, 2.0, 5.0]);
        assert_eq!(time_union(&[a, b]), vec![0.0, 1.0, 2.0, 4.0, 5.0]);
        assert!(time_union(&[]).is_empty());
    }
}
