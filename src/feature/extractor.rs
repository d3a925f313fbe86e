//! Feature extraction from raw scans
//!
//! Drives the [`ChromatogramBuilder`] and a [`PeakDetector`] over every m/z
//! bucket. Buckets with at least one accepted peak become [`Feature`]s whose
//! intensity is the trapezoidal integral over the union of their peak
//! intervals.

use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{ExtractError, Feature, FeatureSet};
use crate::chromatogram::{ChromatogramBuilder, ChromatogramConfig, IonTrace};
use crate::peak::{
    DetectionWarning, MixtureConfig, PeakAlgorithm, PeakDetector, PeakInterval, PeakMethod,
    TopologicalConfig,
};
use crate::scan::RawScan;

/// Configuration for the feature extractor
#[derive(Debug, Clone, Default)]
pub struct ExtractionConfig {
    /// m/z bucketing and centroiding
    pub chromatogram: ChromatogramConfig,

    /// Topological bound tuning (the quality comes from each call)
    pub topological: TopologicalConfig,

    /// Mixture fit tuning
    pub mixture: MixtureConfig,

    /// Divide integrated intensities by the summed breath duration found on the TIC
    pub normalize_by_breath_time: bool,
}

/// Non-fatal conditions raised during extraction
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionWarning {
    /// The run had no usable signal; the feature set is empty
    EmptySignal {
        /// Run name
        source: String,
    },

    /// A mixture fit or component in one bucket was discarded
    NonConvergentFit {
        /// Bucket m/z (`None` for the TIC trace)
        mz: Option<f64>,
        /// Detector message
        reason: String,
    },

    /// Breath-time normalization found no breath on the TIC and was skipped
    ZeroBreathTime,
}

impl fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionWarning::EmptySignal { source } => {
                write!(f, "{}: no signal, empty feature set", source)
            }
            ExtractionWarning::NonConvergentFit { mz: Some(mz), reason } => {
                write!(f, "m/z {:.4}: {}", mz, reason)
            }
            ExtractionWarning::NonConvergentFit { mz: None, reason } => {
                write!(f, "TIC: {}", reason)
            }
            ExtractionWarning::ZeroBreathTime => {
                write!(f, "no breath detected on the TIC, intensities not normalized")
            }
        }
    }
}

/// Output of one extraction
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Detected features
    pub feature_set: FeatureSet,
    /// Non-fatal conditions, in bucket order
    pub warnings: Vec<ExtractionWarning>,
}

/// Raw scans to [`FeatureSet`]
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: ExtractionConfig,
    builder: ChromatogramBuilder,
}

impl FeatureExtractor {
    /// Create an extractor with the given configuration
    pub fn new(config: ExtractionConfig) -> Self {
        let builder = ChromatogramBuilder::new(config.chromatogram.clone());
        Self { config, builder }
    }

    /// Access the configuration
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract the features of one run
    ///
    /// # Arguments
    /// * `source` - Run name stored on the feature set
    /// * `scans` - Every scan of the run; only the configured MS level is used
    /// * `is_line_spectrum` - Scans are already centroided
    /// * `quality` - Topological persistence fraction in `[0, 1]`
    /// * `method` - Peak detection method
    /// * `peak_count_hint` - Mixture component count (Gaussian only)
    ///
    /// # Errors
    /// `MalformedInput` for the first invalid scan, `InvalidParameter` for a
    /// quality outside `[0, 1]` or a zero component count.
    pub fn extract(
        &self,
        source: &str,
        scans: &[RawScan],
        is_line_spectrum: bool,
        quality: f64,
        method: PeakMethod,
        peak_count_hint: usize,
    ) -> Result<Extraction, ExtractError> {
        let algorithm = PeakAlgorithm::new(method, quality, peak_count_hint);
        match algorithm {
            PeakAlgorithm::Topological { quality } if !(0.0..=1.0).contains(&quality) => {
                return Err(ExtractError::InvalidParameter(format!(
                    "quality must be within [0, 1], got {}",
                    quality
                )));
            }
            PeakAlgorithm::Gaussian { components: 0 } => {
                return Err(ExtractError::InvalidParameter(
                    "gaussian detection needs at least one component".to_string(),
                ));
            }
            _ => {}
        }

        log::info!(
            "Extracting features from {} ({} scans, {} detection)",
            source,
            scans.len(),
            method
        );

        let chromatogram = self.builder.build(scans, is_line_spectrum)?;
        if chromatogram.is_empty() {
            log::warn!("{}: no signal at MS level {}", source, self.config.chromatogram.ms_level);
            return Ok(Extraction {
                feature_set: FeatureSet::empty(source, chromatogram.time),
                warnings: vec![ExtractionWarning::EmptySignal {
                    source: source.to_string(),
                }],
            });
        }

        let detector = algorithm.detector_with(self.config.topological, self.config.mixture);
        let time = chromatogram.time.as_slice();

        #[cfg(feature = "parallel")]
        let results: Vec<(Option<Feature>, Vec<ExtractionWarning>)> = chromatogram
            .traces
            .par_iter()
            .map(|trace| feature_from_trace(detector.as_ref(), time, trace))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let results: Vec<(Option<Feature>, Vec<ExtractionWarning>)> = chromatogram
            .traces
            .iter()
            .map(|trace| feature_from_trace(detector.as_ref(), time, trace))
            .collect();

        let mut features = Vec::new();
        let mut warnings = Vec::new();
        for (feature, bucket_warnings) in results {
            features.extend(feature);
            warnings.extend(bucket_warnings);
        }

        if self.config.normalize_by_breath_time {
            let tic = chromatogram.tic();
            let detection = detector.detect(time, &tic);
            warnings.extend(detection.warnings.iter().map(|w| tic_warning(w.clone())));

            let breath_time = detection.total_duration();
            if breath_time > 0.0 {
                log::debug!("{}: normalizing by {:.3} s of breath", source, breath_time);
                for feature in &mut features {
                    feature.total_intensity /= breath_time;
                }
            } else {
                log::warn!("{}: no breath found on the TIC, skipping normalization", source);
                warnings.push(ExtractionWarning::ZeroBreathTime);
            }
        }

        let fit_failures = warnings
            .iter()
            .filter(|w| matches!(w, ExtractionWarning::NonConvergentFit { .. }))
            .count();
        if fit_failures > 0 {
            log::warn!("{}: {} mixture fits or components discarded", source, fit_failures);
        }
        log::debug!(
            "{}: {} of {} buckets yielded features",
            source,
            features.len(),
            chromatogram.traces.len()
        );

        let feature_set = FeatureSet::new(source, chromatogram.time, features)?;
        Ok(Extraction {
            feature_set,
            warnings,
        })
    }
}

fn tic_warning(warning: DetectionWarning) -> ExtractionWarning {
    match warning {
        DetectionWarning::NonConvergentFit(reason) => {
            ExtractionWarning::NonConvergentFit { mz: None, reason }
        }
    }
}

fn feature_from_trace(
    detector: &dyn PeakDetector,
    time: &[f64],
    trace: &IonTrace,
) -> (Option<Feature>, Vec<ExtractionWarning>) {
    let detection = detector.detect(time, &trace.intensity);
    let warnings = detection
        .warnings
        .into_iter()
        .map(|w| match w {
            DetectionWarning::NonConvergentFit(reason) => ExtractionWarning::NonConvergentFit {
                mz: Some(trace.mz),
                reason,
            },
        })
        .collect();

    if detection.peaks.is_empty() {
        return (None, warnings);
    }

    let union = interval_union(&detection.peaks);
    let total_intensity: f64 = union
        .iter()
        .map(|&(start, end)| integrate(time, &trace.intensity, start, end))
        .sum();

    let (span_start, span_end) = (union[0].0, union[union.len() - 1].1);
    let intensity = time
        .iter()
        .zip(&trace.intensity)
        .map(|(&t, &y)| if t >= span_start && t <= span_end { y } else { 0.0 })
        .collect();

    (Some(Feature::new(trace.mz, total_intensity, intensity)), warnings)
}

/// Merge peak intervals into disjoint `(start, end)` spans
fn interval_union(peaks: &[PeakInterval]) -> Vec<(f64, f64)> {
    let mut spans: Vec<(f64, f64)> = peaks.iter().map(|p| (p.start_time, p.end_time)).collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Trapezoidal area of `(time, y)` between `start` and `end`
///
/// The curve is linearly interpolated at both bounds.
pub fn integrate(time: &[f64], y: &[f64], start: f64, end: f64) -> f64 {
    if time.is_empty() || end <= start {
        return 0.0;
    }
    let start = start.max(time[0]);
    let end = end.min(time[time.len() - 1]);
    if end <= start {
        return 0.0;
    }

    let mut prev_t = start;
    let mut prev_y = super::interpolate(time, y, start);
    let mut area = 0.0;

    let first = time.partition_point(|&t| t <= start);
    for (&t, &v) in time[first..].iter().zip(&y[first..]) {
        if t >= end {
            break;
        }
        area += 0.5 * (prev_y + v) * (t - prev_t);
        prev_t = t;
        prev_y = v;
    }
    let end_y = super::interpolate(time, y, end);
    area += 0.5 * (prev_y + end_y) * (end - prev_t);

    area
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breath_scans() -> Vec<RawScan> {
        // m/z 100 breathes at t = 3, m/z 200 is flat, m/z 300 breathes twice
        let y100 = [0.0, 0.0, 2.0, 10.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let y300 = [0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 8.0, 0.0, 0.0];
        (0..10)
            .map(|i| {
                let mut mz = Vec::new();
                let mut intensity = Vec::new();
                if y100[i] > 0.0 {
                    mz.push(100.0);
                    intensity.push(y100[i]);
                }
                mz.push(200.0);
                intensity.push(4.0);
                if y300[i] > 0.0 {
                    mz.push(300.0);
                    intensity.push(y300[i]);
                }
                RawScan::ms1(i as f64, mz, intensity)
            })
            .collect()
    }

    #[test]
    fn test_extract_topological() {
        let extractor = FeatureExtractor::default();
        let extraction = extractor
            .extract("breath", &breath_scans(), true, 0.5, PeakMethod::Topological, 1)
            .unwrap();

        let set = &extraction.feature_set;
        assert!(extraction.warnings.is_empty());
        assert_eq!(set.source(), "breath");
        assert_eq!(set.time().len(), 10);
        assert_eq!(set.len(), 2);

        let f100 = &set.features()[0];
        assert_eq!(f100.mz, 100.0);
        // peak spans t = 1..5: trapezoids 1 + 6 + 6 + 1
        assert!((f100.total_intensity - 14.0).abs() < 1e-9);
        assert_eq!(f100.intensity, vec![0.0, 0.0, 2.0, 10.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let f300 = &set.features()[1];
        assert_eq!(f300.mz, 300.0);
        assert!((f300.total_intensity - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_warns() {
        let extraction = FeatureExtractor::default()
            .extract("nothing", &[], true, 0.5, PeakMethod::Topological, 1)
            .unwrap();

        assert!(extraction.feature_set.is_empty());
        assert_eq!(
            extraction.warnings,
            vec![ExtractionWarning::EmptySignal {
                source: "nothing".to_string()
            }]
        );
    }

    #[test]
    fn test_invalid_parameters() {
        let extractor = FeatureExtractor::default();
        let scans = breath_scans();
        assert!(matches!(
            extractor.extract("x", &scans, true, 1.5, PeakMethod::Topological, 1),
            Err(ExtractError::InvalidParameter(_))
        ));
        assert!(matches!(
            extractor.extract("x", &scans, true, 0.5, PeakMethod::Gaussian, 0),
            Err(ExtractError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_malformed_scan_aborts() {
        let mut scans = breath_scans();
        scans[4].intensity[0] = -1.0;
        let result =
            FeatureExtractor::default().extract("x", &scans, true, 0.5, PeakMethod::Topological, 1);
        assert!(matches!(result, Err(ExtractError::MalformedInput { scan_index: 4, .. })));
    }

    #[test]
    fn test_breath_time_normalization() {
        let config = ExtractionConfig {
            normalize_by_breath_time: true,
            ..Default::default()
        };
        let plain = FeatureExtractor::default()
            .extract("b", &breath_scans(), true, 0.5, PeakMethod::Topological, 1)
            .unwrap();
        let normalized = FeatureExtractor::new(config)
            .extract("b", &breath_scans(), true, 0.5, PeakMethod::Topological, 1)
            .unwrap();

        let ratio = plain.feature_set.features()[0].total_intensity
            / normalized.feature_set.features()[0].total_intensity;
        assert!(ratio > 0.0);
        let ratio_300 = plain.feature_set.features()[1].total_intensity
            / normalized.feature_set.features()[1].total_intensity;
        assert!((ratio - ratio_300).abs() < 1e-9);
    }

    #[test]
    fn test_integrate_interpolates_bounds() {
        let time = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 2.0, 2.0, 0.0];

        assert!((integrate(&time, &y, 0.0, 3.0) - 4.0).abs() < 1e-12);
        // from 0.5 (y = 1) to 1.0 (y = 2): 0.75
        assert!((integrate(&time, &y, 0.5, 1.0) - 0.75).abs() < 1e-12);
        assert_eq!(integrate(&time, &y, 2.0, 2.0), 0.0);
        assert!((integrate(&time, &y, -5.0, 10.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_interval_union() {
        let peak = |s: f64, e: f64| PeakInterval {
            start_time: s,
            apex_time: s,
            end_time: e,
            apex_intensity: 1.0,
        };
        let union = interval_union(&[peak(5.0, 7.0), peak(0.0, 2.0), peak(2.0, 3.0)]);
        assert_eq!(union, vec![(0.0, 3.0), (5.0, 7.0)]);
    }
}
