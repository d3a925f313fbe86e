use anyhow::{Context, Result};
use breathxplorer::report::{RunReport, RunSummary};
use breathxplorer::tolerance::Tolerance;
use log::{info, warn};
use std::path::PathBuf;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::align::{align_and_write, alignment_tolerance, AnnotationSettings};
use super::extract::{features_path, print_report, write_features, write_summary, ExtractSettings, RunOutcome};
use super::{Config, DetectionArgs};

pub struct ProcessArgs {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub detection: DetectionArgs,
    pub tolerance: Option<Tolerance>,
    pub adduct: bool,
    pub isotope: bool,
    pub features_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

/// Extract every run, then align the successful ones
pub fn run(args: ProcessArgs) -> Result<()> {
    let config = Config::load(args.config.as_deref())?;
    let settings = ExtractSettings::resolve(&args.detection, &config);
    let tolerance = alignment_tolerance(args.tolerance, &config);
    let annotation = AnnotationSettings::resolve(args.adduct, args.isotope, &config);

    if let Some(dir) = &args.features_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    info!("breathXplorer - process");
    info!("=======================");
    info!("Inputs: {}", args.inputs.len());
    info!("Method: {}", settings.method);
    info!("Alignment tolerance: {}", tolerance);

    #[cfg(feature = "parallel")]
    let outcomes: Vec<RunOutcome> = args.inputs.par_iter().map(|input| settings.run(input)).collect();

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<RunOutcome> = args.inputs.iter().map(|input| settings.run(input)).collect();

    let mut report = RunReport::new();
    let mut parameters = settings.parameters();
    parameters["alignment_tolerance"] = serde_json::json!(tolerance);
    parameters["adduct"] = serde_json::json!(annotation.adduct);
    parameters["isotope"] = serde_json::json!(annotation.isotope);
    let mut summary = RunSummary::new("process", parameters);

    let mut names = Vec::new();
    let mut feature_sets = Vec::new();
    for outcome in outcomes {
        report.add(outcome.entry());
        summary.add_run(outcome.record());
        if let Ok((set, _)) = outcome.result {
            if let Some(dir) = &args.features_dir {
                write_features(&features_path(Some(dir), &outcome.input, &outcome.name), &set)?;
            }
            names.push(outcome.name);
            feature_sets.push(set);
        }
    }

    print_report(&report);
    if report.has_failures() {
        warn!(
            "{} of {} runs failed and are left out of the alignment",
            report.failure_count(),
            args.inputs.len()
        );
    }
    if feature_sets.is_empty() {
        if let Some(path) = &args.summary {
            write_summary(path, &summary)?;
        }
        anyhow::bail!("No run could be processed");
    }

    let sample = align_and_write(&feature_sets, &names, tolerance, annotation, &args.output)?;
    summary.aligned_rows = Some(sample.len());
    println!("{} -> {} ({})", names.join(", "), args.output.display(), sample);

    if let Some(path) = &args.summary {
        write_summary(path, &summary)?;
    }
    Ok(())
}
