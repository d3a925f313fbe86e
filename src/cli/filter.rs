use anyhow::{Context, Result};
use breathxplorer::table::read_feature_set;
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use super::extract::{write_features, RsdCutoff};
use super::{run_name, Config};

/// Apply an RSD filter to a feature table
pub fn run(
    input: PathBuf,
    output: PathBuf,
    rsd: Option<f64>,
    rsd_quantile: Option<f64>,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load(config.as_deref())?;
    let Some(cutoff) = RsdCutoff::resolve(rsd, rsd_quantile, &config) else {
        anyhow::bail!("No RSD threshold given; pass --rsd, --rsd-quantile or set [quality] in the config");
    };

    let file = File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?;
    let feature_set = read_feature_set(BufReader::new(file), &run_name(&input))
        .with_context(|| format!("Failed to read feature table {}", input.display()))?;

    let filtered = cutoff.apply(&feature_set);
    info!(
        "{}: kept {} of {} features ({:?})",
        feature_set.source(),
        filtered.len(),
        feature_set.len(),
        cutoff
    );

    write_features(&output, &filtered)?;
    println!("{} -> {} ({} features)", input.display(), output.display(), filtered.len());
    Ok(())
}
