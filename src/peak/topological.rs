//! Persistence-based peak detection
//!
//! Samples are swept from the highest intensity down. Each local maximum
//! starts a component; when two components meet at a sample, the one with the
//! lower apex dies and its persistence is `apex - merge height`. A maximum is
//! a peak when its persistence reaches `quality × range`.
//!
//! Ties are broken by sample index: equal intensities are processed left to
//! right, and of two equally high apexes the later one dies. Persistence does
//! not depend on `quality`, so raising `quality` only ever removes peaks.

use super::{Detection, PeakDetector, PeakInterval};

/// Tuning for [`TopologicalDetector`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologicalConfig {
    /// Minimum persistence as a fraction of the signal range, in `[0, 1]`
    pub quality: f64,

    /// A bound is the first sample at or below
    /// `valley + valley_fraction × (apex - valley)`, then followed downhill
    pub valley_fraction: f64,
}

impl Default for TopologicalConfig {
    fn default() -> Self {
        Self {
            quality: 0.5,
            valley_fraction: 0.05,
        }
    }
}

/// Peak detector based on 0-dimensional persistent homology
#[derive(Debug, Clone, Default)]
pub struct TopologicalDetector {
    config: TopologicalConfig,
}

impl TopologicalDetector {
    /// Detector with the given quality and default bounds
    pub fn new(quality: f64) -> Self {
        Self::with_config(TopologicalConfig {
            quality,
            ..Default::default()
        })
    }

    /// Detector with explicit tuning
    pub fn with_config(config: TopologicalConfig) -> Self {
        Self { config }
    }

    /// Access the configuration
    pub fn config(&self) -> &TopologicalConfig {
        &self.config
    }

    /// Persistence of every local maximum as `(index, persistence)`
    ///
    /// The global maximum is reported with the full signal range.
    pub fn persistence(intensity: &[f64]) -> Vec<(usize, f64)> {
        let n = intensity.len();
        if n == 0 {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| intensity[b].total_cmp(&intensity[a]).then(a.cmp(&b)));

        let mut components = UnionFind::new(n);
        let mut pairs = Vec::new();

        for &i in &order {
            let left = (i > 0 && components.contains(i - 1)).then(|| components.find(i - 1));
            let right = (i + 1 < n && components.contains(i + 1)).then(|| components.find(i + 1));

            match (left, right) {
                (None, None) => components.make(i),
                (Some(root), None) | (None, Some(root)) => components.attach(i, root),
                (Some(a), Some(b)) => {
                    let (apex_a, apex_b) = (components.apex(a), components.apex(b));
                    // Lower apex dies; on equal height the later one does
                    let a_survives = intensity[apex_a] > intensity[apex_b]
                        || (intensity[apex_a] == intensity[apex_b] && apex_a < apex_b);
                    let (survivor, dying) = if a_survives { (a, b) } else { (b, a) };
                    let dying_apex = components.apex(dying);
                    pairs.push((dying_apex, intensity[dying_apex] - intensity[i]));
                    components.union(dying, survivor);
                    components.attach(i, survivor);
                }
            }
        }

        let global = order[0];
        let min = intensity[order[n - 1]];
        pairs.push((global, intensity[global] - min));
        pairs.sort_by_key(|&(index, _)| index);
        pairs
    }

    fn bounds(&self, intensity: &[f64], apex: usize, lo: usize, hi: usize) -> (usize, usize) {
        let top = intensity[apex];

        let left_valley = intensity[lo..=apex].iter().copied().fold(f64::INFINITY, f64::min);
        let left_cut = left_valley + self.config.valley_fraction * (top - left_valley);
        let mut start = (lo..apex)
            .rev()
            .find(|&j| intensity[j] <= left_cut)
            .unwrap_or(lo);
        while start > lo && intensity[start - 1] < intensity[start] {
            start -= 1;
        }

        let right_valley = intensity[apex..=hi].iter().copied().fold(f64::INFINITY, f64::min);
        let right_cut = right_valley + self.config.valley_fraction * (top - right_valley);
        let mut end = (apex + 1..=hi)
            .find(|&j| intensity[j] <= right_cut)
            .unwrap_or(hi);
        while end < hi && intensity[end + 1] < intensity[end] {
            end += 1;
        }

        (start, end)
    }
}

impl PeakDetector for TopologicalDetector {
    fn name(&self) -> &'static str {
        "topological"
    }

    fn detect(&self, time: &[f64], intensity: &[f64]) -> Detection {
        let n = intensity.len().min(time.len());
        if n < 3 {
            return Detection::default();
        }
        let intensity = &intensity[..n];

        let (min, max) = intensity
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &y| (lo.min(y), hi.max(y)));
        let range = max - min;
        if range <= 0.0 || !range.is_finite() {
            return Detection::default();
        }

        let threshold = self.config.quality * range;
        let apexes: Vec<usize> = Self::persistence(intensity)
            .into_iter()
            .filter(|&(index, p)| p > 0.0 && p >= threshold && index > 0 && index < n - 1)
            .map(|(index, _)| index)
            .collect();

        let peaks = apexes
            .iter()
            .enumerate()
            .map(|(k, &apex)| {
                let lo = if k == 0 { 0 } else { apexes[k - 1] };
                let hi = apexes.get(k + 1).copied().unwrap_or(n - 1);
                let (start, end) = self.bounds(intensity, apex, lo, hi);
                PeakInterval {
                    start_time: time[start],
                    apex_time: time[apex],
                    end_time: time[end],
                    apex_intensity: intensity[apex],
                }
            })
            .collect();

        Detection::from_peaks(peaks)
    }
}

/// Union-find over sample indexes, tracking each component's apex
struct UnionFind {
    parent: Vec<usize>,
    apex: Vec<usize>,
    active: Vec<bool>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            apex: (0..n).collect(),
            active: vec![false; n],
        }
    }

    fn contains(&self, i: usize) -> bool {
        self.active[i]
    }

    fn make(&mut self, i: usize) {
        self.active[i] = true;
        self.parent[i] = i;
        self.apex[i] = i;
    }

    fn attach(&mut self, i: usize, root: usize) {
        self.active[i] = true;
        self.parent[i] = root;
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn apex(&self, root: usize) -> usize {
        self.apex[root]
    }

    fn union(&mut self, child: usize, root: usize) {
        self.parent[child] = root;
    }
}
