use anyhow::{Context, Result};
use breathxplorer::alignment::{AlignmentConfig, AlignmentEngine, AlignmentError, Sample};
use breathxplorer::annotation::{AnnotationConfig, AnnotationEngine};
use breathxplorer::feature::FeatureSet;
use breathxplorer::table::{read_feature_set, write_annotated_sample, write_sample};
use breathxplorer::tolerance::Tolerance;
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::{run_name, Config};

/// Annotation switches resolved from flags and config
#[derive(Debug, Clone, Copy)]
pub(crate) struct AnnotationSettings {
    pub tolerance: Tolerance,
    pub adduct: bool,
    pub isotope: bool,
}

impl AnnotationSettings {
    pub(crate) fn resolve(adduct: bool, isotope: bool, config: &Config) -> Self {
        let section = &config.annotation;
        Self {
            tolerance: section
                .tolerance
                .unwrap_or(AnnotationConfig::default().tolerance),
            adduct: adduct || section.adduct.unwrap_or(false),
            isotope: isotope || section.isotope.unwrap_or(false),
        }
    }
}

pub(crate) fn alignment_tolerance(flag: Option<Tolerance>, config: &Config) -> Tolerance {
    flag.or(config.alignment.tolerance)
        .unwrap_or(AlignmentConfig::default().tolerance)
}

/// Align feature sets and write the table, annotated when requested
pub(crate) fn align_and_write(
    feature_sets: &[FeatureSet],
    names: &[String],
    tolerance: Tolerance,
    annotation: AnnotationSettings,
    output: &Path,
) -> Result<Sample> {
    let sample = AlignmentEngine::new(AlignmentConfig { tolerance })
        .align_default(feature_sets, names)
        .context("Alignment failed")?;
    info!("Aligned {} samples into {} rows (tolerance {})", names.len(), sample.len(), tolerance);

    let file = File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let writer = BufWriter::new(file);
    let written = if annotation.adduct || annotation.isotope {
        let annotated = AnnotationEngine::new(AnnotationConfig {
            tolerance: annotation.tolerance,
        })
        .annotate(&sample, annotation.adduct, annotation.isotope);
        info!("{} adduct/isotope relations found", annotated.relations().len());
        write_annotated_sample(writer, &annotated)
    } else {
        write_sample(writer, &sample)
    };
    written.with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(sample)
}

/// Align feature tables into one table with a column per sample
pub fn run(
    inputs: Vec<PathBuf>,
    output: PathBuf,
    names: Option<Vec<String>>,
    tolerance: Option<Tolerance>,
    adduct: bool,
    isotope: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load(config.as_deref())?;
    let names = names.unwrap_or_else(|| inputs.iter().map(|p| run_name(p)).collect());
    if names.len() != inputs.len() {
        return Err(AlignmentError::DimensionMismatch {
            feature_sets: inputs.len(),
            sample_names: names.len(),
        })
        .context("--names must give one name per input");
    }

    let feature_sets = inputs
        .iter()
        .zip(&names)
        .map(|(path, name)| {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            read_feature_set(BufReader::new(file), name)
                .with_context(|| format!("Failed to read feature table {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let sample = align_and_write(
        &feature_sets,
        &names,
        alignment_tolerance(tolerance, &config),
        AnnotationSettings::resolve(adduct, isotope, &config),
        &output,
    )?;

    println!("{} -> {} ({})", names.join(", "), output.display(), sample);
    Ok(())
}
