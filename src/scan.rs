//! Raw scan records consumed by the extraction core.
//!
//! A [`RawScan`] is the single, format-independent view of one spectrum. The
//! loaders in [`crate::formats`] produce them; everything downstream of the
//! loaders only reads them.

use crate::feature::ExtractError;

/// One acquired spectrum
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawScan {
    /// Scan start time in seconds
    pub scan_time: f64,

    /// MS level (1 for survey scans, 2+ for tandem scans)
    pub ms_level: u8,

    /// m/z array
    pub mz: Vec<f64>,

    /// Intensity array, parallel to `mz`
    pub intensity: Vec<f64>,

    /// Selected precursor m/z (tandem scans only)
    pub precursor_mz: Option<f64>,

    /// Total ion current as reported by the instrument
    pub total_ion_current: Option<f64>,
}

impl RawScan {
    /// Create an MS1 scan
    pub fn ms1(scan_time: f64, mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self {
            scan_time,
            ms_level: 1,
            mz,
            intensity,
            precursor_mz: None,
            total_ion_current: None,
        }
    }

    /// Create an MS2 scan with its precursor
    pub fn ms2(scan_time: f64, precursor_mz: f64, mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self {
            scan_time,
            ms_level: 2,
            mz,
            intensity,
            precursor_mz: Some(precursor_mz),
            total_ion_current: None,
        }
    }

    /// Number of (m/z, intensity) points
    pub fn len(&self) -> usize {
        self.mz.len()
    }

    /// Whether the scan has no points
    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// Summed intensity, preferring the instrument-reported TIC
    pub fn tic(&self) -> f64 {
        self.total_ion_current
            .unwrap_or_else(|| self.intensity.iter().sum())
    }

    /// Check the fields the extraction core relies on
    pub fn validate(&self, scan_index: usize) -> Result<(), ExtractError> {
        let malformed = |reason: String| ExtractError::MalformedInput { scan_index, reason };

        if !self.scan_time.is_finite() {
            return Err(malformed(format!(
                "scan time must be finite, got {}",
                self.scan_time
            )));
        }
        if self.ms_level == 0 {
            return Err(malformed("ms level must be >= 1".to_string()));
        }
        if self.mz.len() != self.intensity.len() {
            return Err(malformed(format!(
                "m/z array has {} values but intensity array has {}",
                self.mz.len(),
                self.intensity.len()
            )));
        }
        if let Some(bad) = self.mz.iter().find(|mz| !mz.is_finite()) {
            return Err(malformed(format!("non-finite m/z value {}", bad)));
        }
        if let Some(bad) = self
            .intensity
            .iter()
            .find(|value| !value.is_finite() || **value < 0.0)
        {
            return Err(malformed(format!("invalid intensity value {}", bad)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_well_formed_scan() {
        let scan = RawScan::ms1(1.5, vec![70.0, 80.0], vec![10.0, 0.0]);
        assert!(scan.validate(0).is_ok());
        assert_eq!(scan.tic(), 10.0);
    }

    #[test]
    fn test_validate_rejects_length_mismatch() {
        let scan = RawScan::ms1(1.5, vec![70.0, 80.0], vec![10.0]);
        match scan.validate(7) {
            Err(ExtractError::MalformedInput { scan_index, .. }) => assert_eq!(scan_index, 7),
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_nan_time_and_negative_intensity() {
        assert!(RawScan::ms1(f64::NAN, vec![], vec![]).validate(0).is_err());
        assert!(RawScan::ms1(0.0, vec![1.0], vec![-1.0]).validate(0).is_err());
    }

    #[test]
    fn test_reported_tic_wins() {
        let mut scan = RawScan::ms1(0.0, vec![1.0], vec![5.0]);
        scan.total_ion_current = Some(42.0);
        assert_eq!(scan.tic(), 42.0);
    }
}
