//! TOML configuration file support.
//!
//! Any command accepting `--config` reads its defaults from a file; flags
//! given on the command line win over the file, and the file wins over the
//! library defaults.
//!
//! ```toml
//! # breathx.toml
//! [extraction]
//! method = "topological"
//! quality = 0.5
//! line_spectrum = false
//! mz_tolerance = "0.001"
//! normalize_by_breath_time = true
//!
//! [quality]
//! rsd_threshold = 0.5
//!
//! [alignment]
//! tolerance = "5ppm"
//!
//! [annotation]
//! adduct = true
//! isotope = true
//!
//! [tandem]
//! tolerance = 0.01
//! min_fragment_intensity = 0.001
//! ```

use anyhow::{Context, Result};
use breathxplorer::peak::PeakMethod;
use breathxplorer::tolerance::Tolerance;
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure for breathx.toml files.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Feature extraction settings.
    #[serde(default)]
    pub extraction: ExtractionSection,

    /// RSD filter settings.
    #[serde(default)]
    pub quality: QualitySection,

    /// Cross-sample alignment settings.
    #[serde(default)]
    pub alignment: AlignmentSection,

    /// Adduct / isotope annotation settings.
    #[serde(default)]
    pub annotation: AnnotationSection,

    /// Tandem retrieval settings.
    #[serde(default)]
    pub tandem: TandemSection,
}

/// `[extraction]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionSection {
    /// Peak detection method.
    pub method: Option<PeakMethod>,

    /// Topological quality fraction in `[0, 1]`.
    pub quality: Option<f64>,

    /// Mixture component count.
    pub components: Option<usize>,

    /// Scans are already centroided.
    pub line_spectrum: Option<bool>,

    /// m/z bucketing window.
    pub mz_tolerance: Option<Tolerance>,

    /// Centroiding noise floor relative to the scan maximum.
    pub noise_ratio: Option<f64>,

    /// MS level used for extraction.
    pub ms_level: Option<u8>,

    /// Normalize intensities by the summed breath duration.
    pub normalize_by_breath_time: Option<bool>,
}

/// `[quality]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualitySection {
    /// Keep features with RSD at or below this value.
    pub rsd_threshold: Option<f64>,

    /// Derive the threshold from this quantile of the run's RSDs instead.
    pub rsd_quantile: Option<f64>,
}

/// `[alignment]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlignmentSection {
    /// m/z matching window.
    pub tolerance: Option<Tolerance>,
}

/// `[annotation]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotationSection {
    /// m/z matching window.
    pub tolerance: Option<Tolerance>,

    /// Detect adducts.
    pub adduct: Option<bool>,

    /// Detect isotopes.
    pub isotope: Option<bool>,
}

/// `[tandem]`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TandemSection {
    /// Precursor matching window.
    pub tolerance: Option<Tolerance>,

    /// Fragments at or below this intensity are not written.
    pub min_fragment_intensity: Option<f64>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Load the file when given, otherwise all defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [extraction]
            method = "gaussian"
            components = 3
            mz_tolerance = "5ppm"
            normalize_by_breath_time = true

            [quality]
            rsd_threshold = 0.4

            [alignment]
            tolerance = 0.0005

            [annotation]
            adduct = true

            [tandem]
            min_fragment_intensity = 0.01
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.extraction.method, Some(PeakMethod::Gaussian));
        assert_eq!(config.extraction.components, Some(3));
        assert_eq!(config.extraction.mz_tolerance, Some(Tolerance::Ppm(5.0)));
        assert_eq!(config.extraction.normalize_by_breath_time, Some(true));
        assert_eq!(config.quality.rsd_threshold, Some(0.4));
        assert_eq!(config.alignment.tolerance, Some(Tolerance::Da(0.0005)));
        assert_eq!(config.annotation.adduct, Some(true));
        assert_eq!(config.annotation.isotope, None);
        assert_eq!(config.tandem.min_fragment_intensity, Some(0.01));
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [extraction]
            quality = 0.3
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.extraction.quality, Some(0.3));
        assert_eq!(config.extraction.method, None);
        assert_eq!(config.alignment.tolerance, None);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.extraction.quality, None);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_str("[alignment]\ntolerance = -1.0\n").is_err());
        assert!(Config::from_str("[extraction]\nmethod = \"wavelet\"\n").is_err());
        assert!(Config::from_str("[extraction]\nunknown = 1\n").is_err());
    }
}
