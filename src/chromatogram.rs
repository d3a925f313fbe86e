//! # Chromatogram Builder
//!
//! Turns the MS1 scans of one run into per-m/z ion traces on a shared time
//! axis.
//!
//! ## Algorithm
//!
//! 1. Validate every scan and keep the ones at the configured MS level,
//!    stable-sorted by scan time. Their times form the axis.
//! 2. Profile spectra are centroided: strict local maxima above
//!    `centroid_noise_ratio × max` survive. Line spectra only lose
//!    zero-intensity points.
//! 3. All `(m/z, scan, intensity)` observations are pooled and sorted by m/z.
//!    Consecutive values whose gap fits the tolerance window share a bucket;
//!    the bucket m/z is the mean of its observations.
//! 4. Each bucket gets one intensity per scan: the observation closest to the
//!    bucket m/z, or 0 when the scan has none.

use crate::feature::ExtractError;
use crate::scan::RawScan;
use crate::tolerance::Tolerance;

/// Configuration for the chromatogram builder
#[derive(Debug, Clone)]
pub struct ChromatogramConfig {
    /// Window within which consecutive m/z observations share a bucket
    pub mz_tolerance: Tolerance,

    /// Profile apexes below this fraction of the scan maximum are noise
    pub centroid_noise_ratio: f64,

    /// MS level that contributes to the chromatogram
    pub ms_level: u8,
}

impl Default for ChromatogramConfig {
    fn default() -> Self {
        Self {
            mz_tolerance: Tolerance::Da(0.001),
            centroid_noise_ratio: 0.001,
            ms_level: 1,
        }
    }
}

/// Intensity over time for one m/z bucket
#[derive(Debug, Clone, PartialEq)]
pub struct IonTrace {
    /// Bucket m/z (mean of the grouped observations)
    pub mz: f64,
    /// One value per scan of the parent chromatogram
    pub intensity: Vec<f64>,
}

/// Per-bucket ion traces sharing one time axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chromatogram {
    /// Ascending scan times in seconds
    pub time: Vec<f64>,
    /// Traces ascending by m/z
    pub traces: Vec<IonTrace>,
}

impl Chromatogram {
    /// Number of scans on the time axis
    pub fn n_scans(&self) -> usize {
        self.time.len()
    }

    /// Number of m/z buckets
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether no bucket was formed
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Summed intensity of all traces at every scan
    pub fn tic(&self) -> Vec<f64> {
        let mut tic = vec![0.0; self.time.len()];
        for trace in &self.traces {
            for (total, value) in tic.iter_mut().zip(&trace.intensity) {
                *total += value;
            }
        }
        tic
    }
}

#[derive(Debug, Clone, Copy)]
struct Observation {
    mz: f64,
    scan: usize,
    intensity: f64,
}

/// Builds [`Chromatogram`]s from raw scans
#[derive(Debug, Clone, Default)]
pub struct ChromatogramBuilder {
    config: ChromatogramConfig,
}

impl ChromatogramBuilder {
    /// Create a builder with the given configuration
    pub fn new(config: ChromatogramConfig) -> Self {
        Self { config }
    }

    /// Access the configuration
    pub fn config(&self) -> &ChromatogramConfig {
        &self.config
    }

    /// Bin the scans of one run into ion traces
    ///
    /// Returns an empty chromatogram when no scan is at the configured MS
    /// level. Fails on the first malformed scan.
    pub fn build(
        &self,
        scans: &[RawScan],
        is_line_spectrum: bool,
    ) -> Result<Chromatogram, ExtractError> {
        for (index, scan) in scans.iter().enumerate() {
            scan.validate(index)?;
        }

        let mut selected: Vec<&RawScan> = scans
            .iter()
            .filter(|s| s.ms_level == self.config.ms_level)
            .collect();
        // Vec::sort_by is stable, so equal times keep acquisition order
        selected.sort_by(|a, b| a.scan_time.total_cmp(&b.scan_time));

        let time: Vec<f64> = selected.iter().map(|s| s.scan_time).collect();

        let mut observations = Vec::new();
        for (scan_index, scan) in selected.iter().enumerate() {
            let points = if is_line_spectrum {
                scan.mz
                    .iter()
                    .zip(&scan.intensity)
                    .filter(|(_, &y)| y > 0.0)
                    .map(|(&x, &y)| (x, y))
                    .collect()
            } else {
                centroid(&scan.mz, &scan.intensity, self.config.centroid_noise_ratio)
            };
            observations.extend(points.into_iter().map(|(mz, intensity)| Observation {
                mz,
                scan: scan_index,
                intensity,
            }));
        }

        let traces = self.bucket(observations, time.len());

        log::debug!(
            "Built chromatogram: {} buckets over {} scans",
            traces.len(),
            time.len()
        );

        Ok(Chromatogram { time, traces })
    }

    fn bucket(&self, mut observations: Vec<Observation>, n_scans: usize) -> Vec<IonTrace> {
        observations.sort_by(|a, b| a.mz.total_cmp(&b.mz));

        let mut traces = Vec::new();
        let mut start = 0;
        for i in 1..=observations.len() {
            let boundary = i == observations.len() || {
                let prev = observations[i - 1].mz;
                observations[i].mz - prev > self.config.mz_tolerance.window(prev)
            };
            if boundary {
                traces.push(Self::trace(&observations[start..i], n_scans));
                start = i;
            }
        }
        traces
    }

    fn trace(group: &[Observation], n_scans: usize) -> IonTrace {
        let mz = group.iter().map(|o| o.mz).sum::<f64>() / group.len() as f64;

        let mut intensity = vec![0.0; n_scans];
        let mut best_distance = vec![f64::INFINITY; n_scans];
        for obs in group {
            let distance = (obs.mz - mz).abs();
            if distance < best_distance[obs.scan] {
                best_distance[obs.scan] = distance;
                intensity[obs.scan] = obs.intensity;
            }
        }

        IonTrace { mz, intensity }
    }
}

/// Reduce a profile spectrum to its apexes
///
/// Keeps strict local maxima whose intensity exceeds `noise_ratio` times the
/// spectrum maximum.
pub fn centroid(mz: &[f64], intensity: &[f64], noise_ratio: f64) -> Vec<(f64, f64)> {
    let max = intensity.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 || intensity.len() < 3 {
        return Vec::new();
    }
    let floor = max * noise_ratio;

    (1..intensity.len() - 1)
        .filter(|&i| {
            intensity[i - 1] < intensity[i]
                && intensity[i] > intensity[i + 1]
                && intensity[i] > floor
        })
        .map(|i| (mz[i], intensity[i]))
        .collect()
}
