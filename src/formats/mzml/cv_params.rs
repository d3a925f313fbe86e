//! Controlled Vocabulary (CV) parameters read by the mzML loader
//!
//! Only the handful of PSI-MS terms needed to build a [`RawScan`] are mapped;
//! everything else in the document is skipped.
//!
//! [`RawScan`]: crate::scan::RawScan

/// A controlled vocabulary parameter from mzML
#[derive(Debug, Clone, Default)]
pub struct CvParam {
    /// Accession number (e.g., "MS:1000511")
    pub accession: String,

    /// Optional value
    pub value: Option<String>,

    /// Unit accession
    pub unit_accession: Option<String>,
}

impl CvParam {
    /// Get the value as f64 if possible
    pub fn value_as_f64(&self) -> Option<f64> {
        self.value.as_ref()?.trim().parse().ok()
    }

    /// Get the value as u8 if possible
    pub fn value_as_u8(&self) -> Option<u8> {
        self.value.as_ref()?.trim().parse().ok()
    }
}

/// PSI-MS and unit ontology accessions used by the loader
#[allow(non_snake_case)]
pub mod MS_CV_ACCESSIONS {
    /// MS level
    pub const MS_LEVEL: &str = "MS:1000511";

    /// Scan start time
    pub const SCAN_START_TIME: &str = "MS:1000016";

    /// Total ion current
    pub const TOTAL_ION_CURRENT: &str = "MS:1000285";

    /// Selected ion m/z
    pub const SELECTED_ION_MZ: &str = "MS:1000744";

    /// Isolation window target m/z (fallback precursor)
    pub const ISOLATION_WINDOW_TARGET_MZ: &str = "MS:1000827";

    /// 32-bit float
    pub const FLOAT_32_BIT: &str = "MS:1000521";

    /// 64-bit float
    pub const FLOAT_64_BIT: &str = "MS:1000523";

    /// zlib compression
    pub const ZLIB_COMPRESSION: &str = "MS:1000574";

    /// No compression
    pub const NO_COMPRESSION: &str = "MS:1000576";

    /// m/z array
    pub const MZ_ARRAY: &str = "MS:1000514";

    /// Intensity array
    pub const INTENSITY_ARRAY: &str = "MS:1000515";

    /// Second
    pub const UNIT_SECOND: &str = "UO:0000010";

    /// Minute
    pub const UNIT_MINUTE: &str = "UO:0000031";

    /// Millisecond
    pub const UNIT_MILLISECOND: &str = "UO:0000028";
}

/// Convert a scan start time to seconds using its unit accession
pub fn normalize_retention_time(value: f64, unit_accession: Option<&str>) -> f64 {
    match unit_accession {
        Some(MS_CV_ACCESSIONS::UNIT_MINUTE) => value * 60.0,
        Some(MS_CV_ACCESSIONS::UNIT_MILLISECOND) => value / 1000.0,
        _ => value, // Default to seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cv_param_value_parsing() {
        let param = CvParam {
            accession: MS_CV_ACCESSIONS::MS_LEVEL.to_string(),
            value: Some("2".to_string()),
            ..Default::default()
        };

        assert_eq!(param.value_as_u8(), Some(2));
        assert_eq!(param.value_as_f64(), Some(2.0));
    }

    #[test]
    fn test_normalize_retention_time() {
        assert_eq!(normalize_retention_time(1.5, Some(MS_CV_ACCESSIONS::UNIT_MINUTE)), 90.0);
        assert_eq!(normalize_retention_time(1500.0, Some(MS_CV_ACCESSIONS::UNIT_MILLISECOND)), 1.5);
        assert_eq!(normalize_retention_time(12.0, Some(MS_CV_ACCESSIONS::UNIT_SECOND)), 12.0);
        assert_eq!(normalize_retention_time(12.0, None), 12.0);
    }
}
