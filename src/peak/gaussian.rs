//! Gaussian mixture peak detection
//!
//! The baseline-subtracted trace is treated as a weighted sample of time
//! points and fitted with a fixed number of 1-D Gaussians by expectation
//! maximisation. Each surviving component becomes the window `μ ± kσ`.
//!
//! Initialisation is deterministic (means at weighted quantiles, common σ),
//! so the same trace always yields the same peaks.

use std::f64::consts::PI;

use super::{Detection, DetectionWarning, PeakDetector, PeakInterval};

/// Tuning for [`GaussianMixtureDetector`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureConfig {
    /// Half-width of a reported interval in standard deviations
    pub bound_sigmas: f64,

    /// EM iteration cap; a fit that has not converged by then is discarded
    pub max_iterations: usize,

    /// Relative log-likelihood change that counts as converged
    pub tolerance: f64,

    /// Components narrower than this fraction of the time span are degenerate
    pub min_sigma_fraction: f64,

    /// Components with a smaller mixing weight are dropped
    pub min_weight: f64,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            bound_sigmas: 2.0,
            max_iterations: 200,
            tolerance: 1e-6,
            min_sigma_fraction: 1e-4,
            min_weight: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Component {
    weight: f64,
    mean: f64,
    sigma: f64,
}

impl Component {
    fn log_density(&self, t: f64) -> f64 {
        let z = (t - self.mean) / self.sigma;
        self.weight.ln() - self.sigma.ln() - 0.5 * (2.0 * PI).ln() - 0.5 * z * z
    }
}

/// Peak detector fitting a Gaussian mixture to the trace
#[derive(Debug, Clone)]
pub struct GaussianMixtureDetector {
    components: usize,
    config: MixtureConfig,
}

impl GaussianMixtureDetector {
    /// Detector fitting `components` Gaussians with default tuning
    pub fn new(components: usize) -> Self {
        Self::with_config(components, MixtureConfig::default())
    }

    /// Detector with explicit tuning
    pub fn with_config(components: usize, config: MixtureConfig) -> Self {
        Self { components, config }
    }

    /// Number of components fitted
    pub fn components(&self) -> usize {
        self.components
    }

    fn initialise(&self, time: &[f64], weights: &[f64], total: f64, span: f64) -> Vec<Component> {
        let k = self.components;
        let sigma = span / (2.0 * k as f64);

        let mut cumulative = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        for w in weights {
            running += w;
            cumulative.push(running);
        }

        (0..k)
            .map(|j| {
                let target = (j as f64 + 0.5) / k as f64 * total;
                let index = cumulative
                    .iter()
                    .position(|&c| c >= target)
                    .unwrap_or(time.len() - 1);
                Component {
                    weight: 1.0 / k as f64,
                    mean: time[index],
                    sigma,
                }
            })
            .collect()
    }

    /// Run EM; `None` when the fit did not converge
    fn fit(
        &self,
        time: &[f64],
        weights: &[f64],
        total: f64,
        span: f64,
        warnings: &mut Vec<DetectionWarning>,
    ) -> Option<Vec<Component>> {
        let min_sigma = self.config.min_sigma_fraction * span;
        let mut components = self.initialise(time, weights, total, span);
        let mut previous: Option<f64> = None;
        let mut log_resp = vec![0.0; components.len()];

        for _ in 0..self.config.max_iterations {
            if components.is_empty() {
                return Some(components);
            }

            // E-step with accumulation of the M-step sums
            let mut mass = vec![0.0; components.len()];
            let mut first = vec![0.0; components.len()];
            let mut log_likelihood = 0.0;
            log_resp.resize(components.len(), 0.0);

            for (&t, &w) in time.iter().zip(weights) {
                if w <= 0.0 {
                    continue;
                }
                for (lr, c) in log_resp.iter_mut().zip(&components) {
                    *lr = c.log_density(t);
                }
                let norm = log_sum_exp(&log_resp);
                log_likelihood += w * norm;
                for (j, lr) in log_resp.iter().enumerate() {
                    let r = w * (lr - norm).exp();
                    mass[j] += r;
                    first[j] += r * t;
                }
            }

            let means: Vec<f64> = mass
                .iter()
                .zip(&first)
                .map(|(&m, &f)| if m > 0.0 { f / m } else { f64::NAN })
                .collect();

            let mut second = vec![0.0; components.len()];
            for (&t, &w) in time.iter().zip(weights) {
                if w <= 0.0 {
                    continue;
                }
                for (lr, c) in log_resp.iter_mut().zip(&components) {
                    *lr = c.log_density(t);
                }
                let norm = log_sum_exp(&log_resp);
                for (j, lr) in log_resp.iter().enumerate() {
                    let r = w * (lr - norm).exp();
                    second[j] += r * (t - means[j]).powi(2);
                }
            }

            // M-step; collapsed components leave the mixture
            let mut next = Vec::with_capacity(components.len());
            for j in 0..components.len() {
                let sigma = (second[j] / mass[j]).sqrt();
                if !(mass[j] > 0.0 && means[j].is_finite() && sigma.is_finite() && sigma >= min_sigma)
                {
                    warnings.push(DetectionWarning::NonConvergentFit(format!(
                        "component {} collapsed (sigma {:.3e})",
                        j, sigma
                    )));
                    continue;
                }
                next.push(Component {
                    weight: mass[j] / total,
                    mean: means[j],
                    sigma,
                });
            }
            let dropped = next.len() != components.len();
            components = next;

            if !log_likelihood.is_finite() {
                return None;
            }
            if let Some(prev) = previous {
                let change = (log_likelihood - prev).abs();
                if !dropped && change <= self.config.tolerance * log_likelihood.abs().max(f64::MIN_POSITIVE) {
                    return Some(components);
                }
            }
            previous = Some(log_likelihood);
        }

        None
    }
}

impl PeakDetector for GaussianMixtureDetector {
    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn detect(&self, time: &[f64], intensity: &[f64]) -> Detection {
        let n = intensity.len().min(time.len());
        if n < 2 || self.components == 0 {
            return Detection::default();
        }
        let (time, intensity) = (&time[..n], &intensity[..n]);

        let min = intensity.iter().copied().fold(f64::INFINITY, f64::min);
        let weights: Vec<f64> = intensity.iter().map(|&y| (y - min).max(0.0)).collect();
        let total: f64 = weights.iter().sum();
        let (t0, t1) = (time[0], time[n - 1]);
        let span = t1 - t0;
        if !(total > 0.0 && total.is_finite() && span > 0.0) {
            return Detection::default();
        }

        let mut warnings = Vec::new();
        let Some(fitted) = self.fit(time, weights.as_slice(), total, span, &mut warnings) else {
            warnings.push(DetectionWarning::NonConvergentFit(format!(
                "EM did not converge within {} iterations",
                self.config.max_iterations
            )));
            return Detection {
                peaks: Vec::new(),
                warnings,
            };
        };

        let mut intervals: Vec<PeakInterval> = Vec::with_capacity(fitted.len());
        for (j, c) in fitted.iter().enumerate() {
            if c.weight < self.config.min_weight {
                warnings.push(DetectionWarning::NonConvergentFit(format!(
                    "component {} has negligible weight {:.3e}",
                    j, c.weight
                )));
                continue;
            }
            let half = self.config.bound_sigmas * c.sigma;
            let apex_time = c.mean.clamp(t0, t1);
            let nearest = nearest_index(time, apex_time);
            intervals.push(PeakInterval {
                start_time: (c.mean - half).max(t0),
                apex_time,
                end_time: (c.mean + half).min(t1),
                apex_intensity: intensity[nearest],
            });
        }

        Detection {
            peaks: merge_overlapping(intervals),
            warnings,
        }
    }
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

fn nearest_index(time: &[f64], t: f64) -> usize {
    let upper = time.partition_point(|&x| x < t);
    if upper == 0 {
        0
    } else if upper == time.len() {
        time.len() - 1
    } else if t - time[upper - 1] <= time[upper] - t {
        upper - 1
    } else {
        upper
    }
}

/// Sort by start and fuse intervals that overlap; the higher apex is kept
fn merge_overlapping(mut intervals: Vec<PeakInterval>) -> Vec<PeakInterval> {
    intervals.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let mut merged: Vec<PeakInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start_time < last.end_time => {
                last.end_time = last.end_time.max(interval.end_time);
                if interval.apex_intensity > last.apex_intensity {
                    last.apex_time = interval.apex_time;
                    last.apex_intensity = interval.apex_intensity;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peak::test_signals::{axis, bumps};

    #[test]
    fn test_single_component_recovers_center() {
        let time = axis(0.0, 40.0, 0.25);
        let y = bumps(&time, &[(20.0, 2.0, 100.0)]);

        let detection = GaussianMixtureDetector::new(1).detect(&time, &y);

        assert!(detection.warnings.is_empty());
        assert_eq!(detection.peaks.len(), 1);
        let peak = detection.peaks[0];
        assert!((peak.apex_time - 20.0).abs() < 0.05);
        // ±2σ with σ ≈ 2
        assert!((peak.start_time - 16.0).abs() < 0.2);
        assert!((peak.end_time - 24.0).abs() < 0.2);
        assert!((peak.apex_intensity - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_components_two_bumps() {
        let time = axis(0.0, 60.0, 0.5);
        let y = bumps(&time, &[(10.0, 2.0, 1.0), (50.0, 2.0, 1.0)]);

        let detection = GaussianMixtureDetector::new(2).detect(&time, &y);

        assert_eq!(detection.peaks.len(), 2);
        assert!((detection.peaks[0].apex_time - 10.0).abs() < 0.1);
        assert!((detection.peaks[1].apex_time - 50.0).abs() < 0.1);
        assert!(detection.peaks[0].end_time <= detection.peaks[1].start_time);
    }

    #[test]
    fn test_overlapping_components_are_merged() {
        let time = axis(0.0, 40.0, 0.25);
        let y = bumps(&time, &[(20.0, 3.0, 1.0)]);

        let detection = GaussianMixtureDetector::new(3).detect(&time, &y);

        assert!(detection.peaks.len() <= 3);
        for pair in detection.peaks.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
        }
    }

    #[test]
    fn test_non_convergence_drops_fit() {
        let time = axis(0.0, 60.0, 0.5);
        let y = bumps(&time, &[(10.0, 2.0, 1.0), (50.0, 2.0, 1.0)]);
        let config = MixtureConfig {
            max_iterations: 1,
            ..Default::default()
        };

        let detection = GaussianMixtureDetector::with_config(2, config).detect(&time, &y);

        assert!(detection.peaks.is_empty());
        assert!(matches!(
            detection.warnings.last(),
            Some(DetectionWarning::NonConvergentFit(_))
        ));
    }

    #[test]
    fn test_flat_signal_has_no_peaks() {
        let time = axis(0.0, 10.0, 1.0);
        let detection = GaussianMixtureDetector::new(2).detect(&time, &[5.0; 11]);
        assert!(detection.peaks.is_empty());
        assert!(detection.warnings.is_empty());
    }

    #[test]
    fn test_nearest_index() {
        let time = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(nearest_index(&time, -1.0), 0);
        assert_eq!(nearest_index(&time, 1.4), 1);
        assert_eq!(nearest_index(&time, 1.5), 1);
        assert_eq!(nearest_index(&time, 1.6), 2);
        assert_eq!(nearest_index(&time, 9.0), 3);
    }
}
