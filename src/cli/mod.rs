use anyhow::Result;
use breathxplorer::peak::PeakMethod;
use breathxplorer::tolerance::Tolerance;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

mod align;
mod config;
mod extract;
mod filter;
mod process;
mod tandem;

pub use config::Config;

/// breathXplorer - feature extraction and alignment for breath MS runs
#[derive(Parser)]
#[command(name = "breathx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Peak detection and filtering flags shared by `extract` and `process`
#[derive(Args, Debug, Default, Clone)]
pub struct DetectionArgs {
    /// Peak detection method (topological, gaussian)
    #[arg(short = 'm', long, value_name = "METHOD")]
    pub method: Option<PeakMethod>,

    /// Topological quality fraction in [0, 1]
    #[arg(short = 'q', long)]
    pub quality: Option<f64>,

    /// Gaussian mixture component count
    #[arg(short = 'k', long)]
    pub components: Option<usize>,

    /// Scans are already centroided (line spectra)
    #[arg(long)]
    pub line: bool,

    /// m/z bucketing tolerance, e.g. 0.001 or 5ppm
    #[arg(long, value_name = "TOL")]
    pub mz_tolerance: Option<Tolerance>,

    /// Divide intensities by the summed breath duration on the TIC
    #[arg(long)]
    pub normalize: bool,

    /// Keep features with RSD at or below this threshold
    #[arg(long, value_name = "RSD", conflicts_with = "rsd_quantile")]
    pub rsd: Option<f64>,

    /// Derive the RSD threshold from this quantile of each run
    #[arg(long, value_name = "Q")]
    pub rsd_quantile: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a feature table from each raw file
    Extract {
        /// Input .mzML / .mzXML files
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for <stem>.features.csv (defaults to each input's directory)
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        detection: DetectionArgs,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write a JSON run summary
        #[arg(long, value_name = "FILE")]
        summary: Option<PathBuf>,
    },

    /// Apply an RSD filter to a feature table
    Filter {
        /// Input feature table CSV
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output feature table CSV
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Keep features with RSD at or below this threshold
        #[arg(long, value_name = "RSD", conflicts_with = "rsd_quantile")]
        rsd: Option<f64>,

        /// Derive the threshold from this quantile of the table's RSDs
        #[arg(long, value_name = "Q")]
        rsd_quantile: Option<f64>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Align feature tables into one table with a column per sample
    Align {
        /// Input feature table CSVs
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output aligned table CSV
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,

        /// Sample names, in input order (defaults to file stems)
        #[arg(long, value_delimiter = ',')]
        names: Option<Vec<String>>,

        /// m/z alignment tolerance, e.g. 0.0005 or 5ppm
        #[arg(short = 't', long, value_name = "TOL")]
        tolerance: Option<Tolerance>,

        /// Add an adduct annotation column
        #[arg(long)]
        adduct: bool,

        /// Add an isotope annotation column
        #[arg(long)]
        isotope: bool,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Extract, filter and align several raw files in one go
    Process {
        /// Input .mzML / .mzXML files
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Output aligned table CSV
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,

        #[command(flatten)]
        detection: DetectionArgs,

        /// m/z alignment tolerance, e.g. 0.0005 or 5ppm
        #[arg(short = 't', long, value_name = "TOL")]
        tolerance: Option<Tolerance>,

        /// Add an adduct annotation column
        #[arg(long)]
        adduct: bool,

        /// Add an isotope annotation column
        #[arg(long)]
        isotope: bool,

        /// Also write each run's feature table into this directory
        #[arg(long, value_name = "DIR")]
        features_dir: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write a JSON run summary
        #[arg(long, value_name = "FILE")]
        summary: Option<PathBuf>,
    },

    /// Write the MS/MS spectra matching a feature or aligned table as MGF
    Tandem {
        /// Raw .mzML / .mzXML file with tandem scans
        #[arg(value_name = "RAW")]
        raw: PathBuf,

        /// Feature or aligned table CSV providing the target m/z values
        #[arg(value_name = "TABLE")]
        table: PathBuf,

        /// Output MGF file
        #[arg(short = 'o', long, value_name = "FILE")]
        output: PathBuf,

        /// Precursor matching tolerance, e.g. 0.01 or 10ppm
        #[arg(short = 't', long, value_name = "TOL")]
        tolerance: Option<Tolerance>,

        /// Drop fragments at or below this intensity
        #[arg(long, value_name = "INTENSITY")]
        min_intensity: Option<f64>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract {
            inputs,
            output_dir,
            detection,
            config,
            summary,
        } => extract::run(inputs, output_dir, detection, config, summary),
        Commands::Filter {
            input,
            output,
            rsd,
            rsd_quantile,
            config,
        } => filter::run(input, output, rsd, rsd_quantile, config),
        Commands::Align {
            inputs,
            output,
            names,
            tolerance,
            adduct,
            isotope,
            config,
        } => align::run(inputs, output, names, tolerance, adduct, isotope, config),
        Commands::Process {
            inputs,
            output,
            detection,
            tolerance,
            adduct,
            isotope,
            features_dir,
            config,
            summary,
        } => process::run(process::ProcessArgs {
            inputs,
            output,
            detection,
            tolerance,
            adduct,
            isotope,
            features_dir,
            config,
            summary,
        }),
        Commands::Tandem {
            raw,
            table,
            output,
            tolerance,
            min_intensity,
            config,
        } => tandem::run(raw, table, output, tolerance, min_intensity, config),
    }
}

/// Run name for a file: its stem without any `.features` suffix
pub(crate) fn run_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    stem.trim_end_matches(".features").to_string()
}
