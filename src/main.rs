//! # breathx
//!
//! Command-line front end for breathXplorer.
//!
//! ## Usage
//!
//! ```bash
//! # One feature table per run
//! breathx extract breath_01.mzML breath_02.mzML -o features/ --rsd 0.5
//!
//! # Align existing feature tables
//! breathx align features/*.features.csv -o aligned.csv --adduct --isotope
//!
//! # Extract, filter and align in one go
//! breathx process raw/*.mzML -o aligned.csv --config breathx.toml --summary run.json
//!
//! # MS/MS spectra of the aligned features
//! breathx tandem breath_01.mzML aligned.csv -o breath_01.mgf
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
