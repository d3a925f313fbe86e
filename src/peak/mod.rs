//! # Peak Detection
//!
//! Two interchangeable detectors locate breath peaks in an ion trace:
//!
//! - [`TopologicalDetector`]: 0-dimensional persistence; keeps maxima whose
//!   prominence is at least a quality fraction of the signal range.
//! - [`GaussianMixtureDetector`]: fits a fixed number of Gaussian components
//!   with weighted EM and reports `μ ± kσ` windows.
//!
//! Both implement [`PeakDetector`] and return time-ordered, non-overlapping
//! [`PeakInterval`]s.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod gaussian;
mod topological;

pub use gaussian::{GaussianMixtureDetector, MixtureConfig};
pub use topological::{TopologicalConfig, TopologicalDetector};

/// One detected peak on the time axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakInterval {
    /// Left bound in seconds
    pub start_time: f64,
    /// Time of the apex
    pub apex_time: f64,
    /// Right bound in seconds
    pub end_time: f64,
    /// Observed intensity at the apex
    pub apex_intensity: f64,
}

impl PeakInterval {
    /// Width of the interval
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether `time` lies inside the closed interval
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }
}

/// Non-fatal conditions raised during detection
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionWarning {
    /// A mixture fit (or one of its components) was discarded
    NonConvergentFit(String),
}

impl fmt::Display for DetectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionWarning::NonConvergentFit(reason) => write!(f, "non-convergent fit: {}", reason),
        }
    }
}

/// Result of one detector call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Accepted peaks, ascending by time
    pub peaks: Vec<PeakInterval>,
    /// Warnings raised while detecting
    pub warnings: Vec<DetectionWarning>,
}

impl Detection {
    /// Detection with peaks and no warnings
    pub fn from_peaks(peaks: Vec<PeakInterval>) -> Self {
        Self {
            peaks,
            warnings: Vec::new(),
        }
    }

    /// Summed duration of all peaks
    pub fn total_duration(&self) -> f64 {
        self.peaks.iter().map(PeakInterval::duration).sum()
    }
}

/// Peak detection over one ion trace
pub trait PeakDetector: Send + Sync {
    /// Short name used in logs and run summaries
    fn name(&self) -> &'static str;

    /// Detect peaks in `intensity` sampled at the ascending `time` axis
    fn detect(&self, time: &[f64], intensity: &[f64]) -> Detection;
}

/// Available detection methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakMethod {
    /// Persistence-based detection
    #[default]
    Topological,
    /// Gaussian mixture model
    Gaussian,
}

impl fmt::Display for PeakMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeakMethod::Topological => write!(f, "topological"),
            PeakMethod::Gaussian => write!(f, "gaussian"),
        }
    }
}

impl FromStr for PeakMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "topological" | "topo" => Ok(PeakMethod::Topological),
            "gaussian" | "gmm" => Ok(PeakMethod::Gaussian),
            _ => Err(format!(
                "Invalid peak method '{}'. Use 'topological' or 'gaussian'",
                s
            )),
        }
    }
}

/// A method together with its parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakAlgorithm {
    /// Topological detection with a quality fraction in `[0, 1]`
    Topological {
        /// Minimum persistence as a fraction of the signal range
        quality: f64,
    },
    /// Mixture fit with a fixed component count
    Gaussian {
        /// Number of mixture components
        components: usize,
    },
}

impl PeakAlgorithm {
    /// Pair a method with the parameter it uses
    pub fn new(method: PeakMethod, quality: f64, peak_count_hint: usize) -> Self {
        match method {
            PeakMethod::Topological => PeakAlgorithm::Topological { quality },
            PeakMethod::Gaussian => PeakAlgorithm::Gaussian {
                components: peak_count_hint,
            },
        }
    }

    /// The method this algorithm runs
    pub fn method(&self) -> PeakMethod {
        match self {
            PeakAlgorithm::Topological { .. } => PeakMethod::Topological,
            PeakAlgorithm::Gaussian { .. } => PeakMethod::Gaussian,
        }
    }

    /// Build the detector with default tuning
    pub fn detector(&self) -> Box<dyn PeakDetector> {
        self.detector_with(TopologicalConfig::default(), MixtureConfig::default())
    }

    /// Build the detector with explicit tuning
    pub fn detector_with(
        &self,
        topological: TopologicalConfig,
        mixture: MixtureConfig,
    ) -> Box<dyn PeakDetector> {
        match *self {
            PeakAlgorithm::Topological { quality } => Box::new(TopologicalDetector::with_config(
                TopologicalConfig {
                    quality,
                    ..topological
                },
            )),
            PeakAlgorithm::Gaussian { components } => {
                Box::new(GaussianMixtureDetector::with_config(components, mixture))
            }
        }
    }
}
