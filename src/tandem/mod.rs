//! # Tandem Spectrum Retrieval
//!
//! Selects the MS/MS scans of a run whose precursor m/z matches a row of a
//! feature set or aligned sample, and reads/writes them as MGF.

use crate::feature::MzTable;
use crate::scan::RawScan;
use crate::tolerance::Tolerance;

pub mod mgf;

pub use mgf::{parse_mgf, read_mgf, read_mgf_file, to_mgf_string, write_mgf, write_mgf_file, MgfError};

/// One fragment spectrum keyed by its precursor
#[derive(Debug, Clone, PartialEq)]
pub struct TandemSpectrum {
    /// Precursor m/z
    pub precursor_mz: f64,
    /// MS level (2 for MS/MS)
    pub ms_level: u8,
    /// `(fragment m/z, intensity)` pairs in acquisition order
    pub peaks: Vec<(f64, f64)>,
    /// Free-text title
    pub title: Option<String>,
    /// Scan time in seconds
    pub retention_time: Option<f64>,
}

impl TandemSpectrum {
    /// Create a spectrum without title or time
    pub fn new(precursor_mz: f64, ms_level: u8, peaks: Vec<(f64, f64)>) -> Self {
        Self {
            precursor_mz,
            ms_level,
            peaks,
            title: None,
            retention_time: None,
        }
    }
}

/// Configuration for tandem retrieval and MGF output
#[derive(Debug, Clone)]
pub struct TandemConfig {
    /// Precursor matching window
    pub tolerance: Tolerance,
    /// Fragments at or below this intensity are not written to MGF
    pub min_fragment_intensity: f64,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Da(0.01),
            min_fragment_intensity: 0.001,
        }
    }
}

/// Matches tandem scans to a feature collection by precursor m/z
#[derive(Debug, Clone)]
pub struct TandemRetriever {
    tolerance: Tolerance,
}

impl Default for TandemRetriever {
    fn default() -> Self {
        Self::new(TandemConfig::default().tolerance)
    }
}

impl TandemRetriever {
    /// Create a retriever with the given precursor window
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    /// Tandem scans whose precursor lies within tolerance of a collection m/z
    ///
    /// Input order is preserved and several scans may match one row. Scans
    /// at MS level 1 are ignored; tandem scans without a precursor are
    /// skipped with a warning.
    pub fn retrieve(&self, scans: &[RawScan], collection: &impl MzTable) -> Vec<TandemSpectrum> {
        let mut targets = collection.mz_values();
        if targets.is_empty() {
            log::debug!("Empty collection, no tandem spectra retrieved");
            return Vec::new();
        }
        targets.sort_by(f64::total_cmp);

        let mut spectra = Vec::new();
        let mut missing_precursor = 0usize;
        for (index, scan) in scans.iter().enumerate() {
            if scan.ms_level < 2 {
                continue;
            }
            let Some(precursor) = scan.precursor_mz else {
                missing_precursor += 1;
                log::warn!("Tandem scan {} has no precursor m/z, skipped", index);
                continue;
            };
            if !self.matches_any(&targets, precursor) {
                continue;
            }

            spectra.push(TandemSpectrum {
                precursor_mz: precursor,
                ms_level: scan.ms_level,
                peaks: scan.mz.iter().copied().zip(scan.intensity.iter().copied()).collect(),
                title: Some(format!("scan={} precursor={:.4}", index, precursor)),
                retention_time: Some(scan.scan_time),
            });
        }

        log::info!(
            "Retrieved {} tandem spectra for {} targets ({} without precursor)",
            spectra.len(),
            targets.len(),
            missing_precursor
        );
        spectra
    }

    fn matches_any(&self, sorted_targets: &[f64], precursor: f64) -> bool {
        let upper = sorted_targets.partition_point(|&m| m < precursor);
        let below = upper.checked_sub(1).map(|i| sorted_targets[i]);
        let above = sorted_targets.get(upper).copied();
        below
            .into_iter()
            .chain(above)
            .any(|target| self.tolerance.matches(target, precursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, FeatureSet};

    fn collection(mz: &[f64]) -> FeatureSet {
        FeatureSet::new(
            "run",
            vec![0.0],
            mz.iter().map(|&m| Feature::new(m, 1.0, vec![1.0])).collect(),
        )
        .unwrap()
    }

    fn scans() -> Vec<RawScan> {
        vec![
            RawScan::ms1(0.5, vec![100.0], vec![10.0]),
            RawScan::ms2(1.0, 100.004, vec![40.0, 60.0], vec![1.0, 2.0]),
            RawScan::ms2(2.0, 130.0, vec![50.0], vec![1.0]),
            RawScan {
                scan_time: 2.5,
                ms_level: 2,
                ..Default::default()
            },
            RawScan::ms2(3.0, 99.995, vec![45.0], vec![3.0]),
        ]
    }

    #[test]
    fn test_retrieve_in_input_order() {
        let retriever = TandemRetriever::new(Tolerance::Da(0.01));
        let spectra = retriever.retrieve(&scans(), &collection(&[100.0, 200.0]));

        assert_eq!(spectra.len(), 2);
        assert_eq!(spectra[0].precursor_mz, 100.004);
        assert_eq!(spectra[0].peaks, vec![(40.0, 1.0), (60.0, 2.0)]);
        assert_eq!(spectra[0].retention_time, Some(1.0));
        assert_eq!(spectra[1].precursor_mz, 99.995);
    }

    #[test]
    fn test_tight_tolerance_excludes() {
        let retriever = TandemRetriever::new(Tolerance::Da(0.001));
        assert!(retriever.retrieve(&scans(), &collection(&[100.0])).is_empty());
    }

    #[test]
    fn test_empty_collection() {
        let retriever = TandemRetriever::default();
        assert!(retriever.retrieve(&scans(), &FeatureSet::default()).is_empty());
    }
}
