use anyhow::{Context, Result};
use breathxplorer::chromatogram::ChromatogramConfig;
use breathxplorer::feature::{
    rsd_quantile, ExtractionConfig, ExtractionWarning, FeatureExtractor, FeatureSet, QualityFilter,
};
use breathxplorer::formats::load_scans;
use breathxplorer::peak::PeakMethod;
use breathxplorer::report::{RunEntry, RunRecord, RunReport, RunSummary};
use breathxplorer::table::write_feature_set;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::{run_name, Config, DetectionArgs};

/// RSD filter resolved from flags and config
#[derive(Debug, Clone, Copy)]
pub(crate) enum RsdCutoff {
    Threshold(f64),
    Quantile(f64),
}

impl RsdCutoff {
    pub(crate) fn resolve(
        rsd: Option<f64>,
        rsd_quantile: Option<f64>,
        config: &Config,
    ) -> Option<Self> {
        match (rsd, rsd_quantile) {
            (Some(t), _) => Some(RsdCutoff::Threshold(t)),
            (None, Some(q)) => Some(RsdCutoff::Quantile(q)),
            (None, None) => match (config.quality.rsd_threshold, config.quality.rsd_quantile) {
                (Some(t), _) => Some(RsdCutoff::Threshold(t)),
                (None, Some(q)) => Some(RsdCutoff::Quantile(q)),
                (None, None) => None,
            },
        }
    }

    pub(crate) fn apply(&self, feature_set: &FeatureSet) -> FeatureSet {
        let threshold = match *self {
            RsdCutoff::Threshold(t) => t,
            RsdCutoff::Quantile(q) => match rsd_quantile(feature_set, q) {
                Some(t) => t,
                None => return feature_set.clone(),
            },
        };
        QualityFilter::new().filter(feature_set, threshold)
    }
}

/// Everything needed to turn one raw file into a filtered feature set
#[derive(Debug, Clone)]
pub(crate) struct ExtractSettings {
    pub extractor: FeatureExtractor,
    pub line_spectrum: bool,
    pub quality: f64,
    pub method: PeakMethod,
    pub components: usize,
    pub rsd: Option<RsdCutoff>,
}

/// Result of processing one raw file
pub(crate) struct RunOutcome {
    pub name: String,
    pub input: PathBuf,
    pub result: Result<(FeatureSet, Vec<ExtractionWarning>)>,
}

impl RunOutcome {
    pub(crate) fn entry(&self) -> RunEntry {
        match &self.result {
            Ok((set, warnings)) => RunEntry::finished(&self.name, set.len(), warnings),
            Err(e) => RunEntry::failed(&self.name, format!("{:#}", e)),
        }
    }

    pub(crate) fn record(&self) -> RunRecord {
        let (feature_count, warnings, error) = match &self.result {
            Ok((set, warnings)) => (set.len(), warnings.iter().map(|w| w.to_string()).collect(), None),
            Err(e) => (0, Vec::new(), Some(format!("{:#}", e))),
        };
        RunRecord {
            name: self.name.clone(),
            input: self.input.display().to_string(),
            feature_count,
            warnings,
            error,
        }
    }
}

impl ExtractSettings {
    pub(crate) fn resolve(args: &DetectionArgs, config: &Config) -> Self {
        let section = &config.extraction;
        let defaults = ChromatogramConfig::default();
        let chromatogram = ChromatogramConfig {
            mz_tolerance: args
                .mz_tolerance
                .or(section.mz_tolerance)
                .unwrap_or(defaults.mz_tolerance),
            centroid_noise_ratio: section.noise_ratio.unwrap_or(defaults.centroid_noise_ratio),
            ms_level: section.ms_level.unwrap_or(defaults.ms_level),
        };
        let extraction = ExtractionConfig {
            chromatogram,
            normalize_by_breath_time: args.normalize
                || section.normalize_by_breath_time.unwrap_or(false),
            ..Default::default()
        };

        Self {
            extractor: FeatureExtractor::new(extraction),
            line_spectrum: args.line || section.line_spectrum.unwrap_or(false),
            quality: args.quality.or(section.quality).unwrap_or(0.5),
            method: args.method.or(section.method).unwrap_or_default(),
            components: args.components.or(section.components).unwrap_or(1),
            rsd: RsdCutoff::resolve(args.rsd, args.rsd_quantile, config),
        }
    }

    pub(crate) fn parameters(&self) -> serde_json::Value {
        let chromatogram = &self.extractor.config().chromatogram;
        serde_json::json!({
            "method": self.method,
            "quality": self.quality,
            "components": self.components,
            "line_spectrum": self.line_spectrum,
            "mz_tolerance": chromatogram.mz_tolerance,
            "ms_level": chromatogram.ms_level,
            "normalize_by_breath_time": self.extractor.config().normalize_by_breath_time,
            "rsd": match self.rsd {
                Some(RsdCutoff::Threshold(t)) => serde_json::json!({ "threshold": t }),
                Some(RsdCutoff::Quantile(q)) => serde_json::json!({ "quantile": q }),
                None => serde_json::Value::Null,
            },
        })
    }

    fn extract_file(&self, name: &str, input: &Path) -> Result<(FeatureSet, Vec<ExtractionWarning>)> {
        let scans = load_scans(input).with_context(|| format!("Failed to load {}", input.display()))?;
        info!("{}: {} scans loaded", name, scans.len());

        let extraction = self
            .extractor
            .extract(
                name,
                &scans,
                self.line_spectrum,
                self.quality,
                self.method,
                self.components,
            )
            .with_context(|| format!("Feature extraction failed for {}", input.display()))?;

        let feature_set = match &self.rsd {
            Some(cutoff) => cutoff.apply(&extraction.feature_set),
            None => extraction.feature_set,
        };
        info!("{}: {} features kept", name, feature_set.len());
        Ok((feature_set, extraction.warnings))
    }

    pub(crate) fn run(&self, input: &Path) -> RunOutcome {
        let name = run_name(input);
        let result = self.extract_file(&name, input);
        RunOutcome {
            name,
            input: input.to_path_buf(),
            result,
        }
    }
}

pub(crate) fn write_features(path: &Path, feature_set: &FeatureSet) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_feature_set(BufWriter::new(file), feature_set)
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub(crate) fn features_path(dir: Option<&Path>, input: &Path, name: &str) -> PathBuf {
    let file_name = format!("{}.features.csv", name);
    match dir {
        Some(dir) => dir.join(file_name),
        None => input.with_file_name(file_name),
    }
}

pub(crate) fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    summary
        .write_json(BufWriter::new(file))
        .with_context(|| format!("Failed to write summary {}", path.display()))?;
    info!("Summary written to {}", path.display());
    Ok(())
}

pub(crate) fn print_report(report: &RunReport) {
    #[cfg(feature = "colorized_output")]
    {
        println!("{}", report.format_colored());
    }

    #[cfg(not(feature = "colorized_output"))]
    {
        println!("{}", report);
    }
}

/// Extract a feature table from each raw file
pub fn run(
    inputs: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    detection: DetectionArgs,
    config: Option<PathBuf>,
    summary_path: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load(config.as_deref())?;
    let settings = ExtractSettings::resolve(&detection, &config);

    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    info!("breathXplorer - feature extraction");
    info!("==================================");
    info!("Inputs: {}", inputs.len());
    info!("Method: {}", settings.method);

    let mut report = RunReport::new();
    let mut summary = RunSummary::new("extract", settings.parameters());

    for input in &inputs {
        let mut outcome = settings.run(input);
        let path = features_path(output_dir.as_deref(), input, &outcome.name);
        let written = match &outcome.result {
            Ok((set, _)) => Some(write_features(&path, set)),
            Err(_) => None,
        };
        match written {
            Some(Ok(())) => info!("{}: wrote {}", outcome.name, path.display()),
            Some(Err(e)) => outcome.result = Err(e),
            None => {}
        }
        report.add(outcome.entry());
        summary.add_run(outcome.record());
    }

    print_report(&report);
    if let Some(path) = summary_path {
        write_summary(&path, &summary)?;
    }

    if report.has_failures() {
        anyhow::bail!("{} of {} runs failed", report.failure_count(), inputs.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use breathxplorer::feature::Feature;
    use breathxplorer::tolerance::Tolerance;

    #[test]
    fn test_flags_override_config() {
        let config = Config::from_str(
            "[extraction]\nquality = 0.2\nmethod = \"gaussian\"\ncomponents = 4\n[quality]\nrsd_threshold = 0.3\n",
        )
        .unwrap();
        let args = DetectionArgs {
            quality: Some(0.7),
            mz_tolerance: Some(Tolerance::Ppm(10.0)),
            ..Default::default()
        };

        let settings = ExtractSettings::resolve(&args, &config);
        assert_eq!(settings.quality, 0.7);
        assert_eq!(settings.method, PeakMethod::Gaussian);
        assert_eq!(settings.components, 4);
        assert_eq!(settings.extractor.config().chromatogram.mz_tolerance, Tolerance::Ppm(10.0));
        assert!(matches!(settings.rsd, Some(RsdCutoff::Threshold(t)) if t == 0.3));
    }

    #[test]
    fn test_defaults_without_config() {
        let settings = ExtractSettings::resolve(&DetectionArgs::default(), &Config::default());
        assert_eq!(settings.quality, 0.5);
        assert_eq!(settings.method, PeakMethod::Topological);
        assert!(settings.rsd.is_none());
        assert!(!settings.line_spectrum);
    }

    #[test]
    fn test_quantile_cutoff() {
        let set = FeatureSet::new(
            "run",
            vec![0.0, 1.0],
            vec![
                Feature::new(1.0, 1.0, vec![1.0, 1.0]),
                Feature::new(2.0, 1.0, vec![1.0, 3.0]),
            ],
        )
        .unwrap();
        // RSDs are 0 and 0.5; the median is 0.25
        assert_eq!(RsdCutoff::Quantile(0.5).apply(&set).len(), 1);
        assert_eq!(RsdCutoff::Quantile(1.0).apply(&set).len(), 2);
    }

    #[test]
    fn test_features_path() {
        let input = Path::new("/data/run.mzML");
        assert_eq!(features_path(None, input, "run"), PathBuf::from("/data/run.features.csv"));
        assert_eq!(
            features_path(Some(Path::new("/out")), input, "run"),
            PathBuf::from("/out/run.features.csv")
        );
    }
}
