use anyhow::{Context, Result};
use breathxplorer::feature::MzTable;
use breathxplorer::formats::load_scans;
use breathxplorer::table::{read_feature_set, read_sample};
use breathxplorer::tandem::{write_mgf_file, TandemConfig, TandemRetriever};
use breathxplorer::tolerance::Tolerance;
use log::info;
use std::path::{Path, PathBuf};

use super::{run_name, Config};

/// Target m/z values from a feature table, or an aligned table as fallback
fn read_targets(path: &Path) -> Result<Box<dyn MzTable>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match read_feature_set(text.as_bytes(), &run_name(path)) {
        Ok(set) => Ok(Box::new(set)),
        Err(feature_err) => {
            let sample = read_sample(text.as_bytes()).with_context(|| {
                format!(
                    "{} is neither a feature table ({}) nor an aligned table",
                    path.display(),
                    feature_err
                )
            })?;
            Ok(Box::new(sample))
        }
    }
}

/// Write the MS/MS spectra matching a table as MGF
pub fn run(
    raw: PathBuf,
    table: PathBuf,
    output: PathBuf,
    tolerance: Option<Tolerance>,
    min_intensity: Option<f64>,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load(config.as_deref())?;
    let defaults = TandemConfig::default();
    let tolerance = tolerance
        .or(config.tandem.tolerance)
        .unwrap_or(defaults.tolerance);
    let min_intensity = min_intensity
        .or(config.tandem.min_fragment_intensity)
        .unwrap_or(defaults.min_fragment_intensity);

    let targets = read_targets(&table)?;
    info!("{} target m/z values from {}", targets.row_count(), table.display());

    let scans = load_scans(&raw).with_context(|| format!("Failed to load {}", raw.display()))?;
    let spectra = TandemRetriever::new(tolerance).retrieve(&scans, &targets);

    write_mgf_file(&output, &spectra, min_intensity)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{} -> {} ({} spectra)", raw.display(), output.display(), spectra.len());
    Ok(())
}
