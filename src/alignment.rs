//! # Cross-sample Alignment
//!
//! Matches the features of independently extracted runs by m/z and produces
//! a [`Sample`]: one row per matched m/z cluster, one column per run.
//!
//! ## Clustering
//!
//! 1. Pool `(sample, m/z, total intensity)` from every feature set and sort by
//!    `(m/z, sample name)`. Sorting on the name makes the result independent
//!    of the order the sets are passed in.
//! 2. Greedy pass: a value joins the open cluster when it lies within the
//!    tolerance window of the cluster's running centroid and its sample has no
//!    member there yet; otherwise it opens a new cluster.
//! 3. Boundary pass: the edge members of adjacent clusters move to the
//!    neighbour whose centroid is nearer (within tolerance, one member per
//!    sample). Exact ties resolve to the lower-m/z cluster. A member does not
//!    move when that would push a member of either cluster, within tolerance
//!    before the move, outside the window of its new centroid.
//!
//! Greedy membership is checked against the centroid at the time a value
//! joins. Later members shift the mean, so a row can hold a value slightly
//! farther than the tolerance from its reported m/z.
//!
//! Every cell is either the sample's intensity in the cluster or an explicit 0.

use std::collections::HashSet;
use std::fmt;

use crate::feature::{FeatureSet, MzTable};
use crate::tolerance::Tolerance;

/// Errors raised by alignment
#[derive(Debug, thiserror::Error)]
pub enum AlignmentError {
    /// Feature sets and names differ in count
    #[error("Dimension mismatch: {feature_sets} feature sets but {sample_names} sample names")]
    DimensionMismatch {
        /// Number of feature sets
        feature_sets: usize,
        /// Number of sample names
        sample_names: usize,
    },

    /// A sample name appears twice
    #[error("Duplicate sample name: {0}")]
    DuplicateSampleName(String),

    /// A row does not have one cell per sample
    #[error("Row at m/z {mz} has {actual} cells, expected {expected}")]
    RowLengthMismatch {
        /// Row m/z
        mz: f64,
        /// Number of samples
        expected: usize,
        /// Number of cells
        actual: usize,
    },

    /// The tolerance is not a finite, positive window
    #[error("Invalid tolerance: {0}")]
    InvalidTolerance(Tolerance),
}

/// Configuration for the alignment engine
#[derive(Debug, Clone)]
pub struct AlignmentConfig {
    /// Matching window used by [`AlignmentEngine::align_default`]
    pub tolerance: Tolerance,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Da(0.0005),
        }
    }
}

/// One aligned m/z row
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    /// Representative (mean) m/z of the cluster
    pub mz: f64,
    /// One cell per sample, in the sample's column order
    pub intensities: Vec<f64>,
}

/// Aligned feature table across samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    names: Vec<String>,
    rows: Vec<AlignedRow>,
}

impl Sample {
    /// Build a table, sorting rows by m/z
    pub fn new(names: Vec<String>, mut rows: Vec<AlignedRow>) -> Result<Self, AlignmentError> {
        check_unique(&names)?;
        if let Some(bad) = rows.iter().find(|r| r.intensities.len() != names.len()) {
            return Err(AlignmentError::RowLengthMismatch {
                mz: bad.mz,
                expected: names.len(),
                actual: bad.intensities.len(),
            });
        }
        rows.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Ok(Self { names, rows })
    }

    /// Sample names in column order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Rows ascending by m/z
    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column index of a sample
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// All cells of one sample, in row order
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.intensities[index]).collect())
    }

    /// Nearest row within `tolerance` of `mz` (lower m/z wins ties)
    pub fn get(&self, mz: f64, tolerance: Tolerance) -> Option<&AlignedRow> {
        let upper = self.rows.partition_point(|r| r.mz < mz);
        let candidate = match (upper.checked_sub(1).map(|i| &self.rows[i]), self.rows.get(upper)) {
            (Some(b), Some(a)) if (mz - b.mz).abs() <= (a.mz - mz).abs() => b,
            (_, Some(a)) => a,
            (Some(b), None) => b,
            (None, None) => return None,
        };
        tolerance.matches(mz, candidate.mz).then_some(candidate)
    }

    /// Cell of `name` in the row matching `mz`
    pub fn value(&self, mz: f64, name: &str, tolerance: Tolerance) -> Option<f64> {
        let index = self.column_index(name)?;
        self.get(mz, tolerance).map(|row| row.intensities[index])
    }
}

impl MzTable for Sample {
    fn mz_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.mz).collect()
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows x {} samples", self.rows.len(), self.names.len())
    }
}

#[derive(Debug, Clone, Copy)]
struct Member {
    sample: usize,
    mz: f64,
    intensity: f64,
}

#[derive(Debug, Default)]
struct Cluster {
    members: Vec<Member>,
}

impl Cluster {
    fn centroid(&self) -> f64 {
        mean_mz(&self.members)
    }

    fn has_sample(&self, sample: usize) -> bool {
        self.members.iter().any(|m| m.sample == sample)
    }

    fn accepts(&self, member: &Member, tolerance: Tolerance) -> bool {
        !self.has_sample(member.sample) && tolerance.matches(self.centroid(), member.mz)
    }
}

/// Aligns feature sets into a [`Sample`]
#[derive(Debug, Clone, Default)]
pub struct AlignmentEngine {
    config: AlignmentConfig,
}

impl AlignmentEngine {
    /// Create an engine with the given configuration
    pub fn new(config: AlignmentConfig) -> Self {
        Self { config }
    }

    /// Access the configuration
    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Align with the configured tolerance
    pub fn align_default<S: AsRef<str>>(
        &self,
        feature_sets: &[FeatureSet],
        sample_names: &[S],
    ) -> Result<Sample, AlignmentError> {
        self.align(feature_sets, sample_names, self.config.tolerance)
    }

    /// Align `feature_sets[i]` under `sample_names[i]`
    ///
    /// # Errors
    /// `DimensionMismatch` when the slices differ in length (checked first),
    /// `DuplicateSampleName` for repeated names, `InvalidTolerance` for a
    /// non-positive window.
    pub fn align<S: AsRef<str>>(
        &self,
        feature_sets: &[FeatureSet],
        sample_names: &[S],
        tolerance: Tolerance,
    ) -> Result<Sample, AlignmentError> {
        if feature_sets.len() != sample_names.len() {
            return Err(AlignmentError::DimensionMismatch {
                feature_sets: feature_sets.len(),
                sample_names: sample_names.len(),
            });
        }
        let names: Vec<String> = sample_names.iter().map(|n| n.as_ref().to_string()).collect();
        check_unique(&names)?;
        if !tolerance.is_valid() {
            return Err(AlignmentError::InvalidTolerance(tolerance));
        }

        let mut pooled: Vec<Member> = feature_sets
            .iter()
            .enumerate()
            .flat_map(|(sample, set)| {
                set.iter().map(move |f| Member {
                    sample,
                    mz: f.mz,
                    intensity: f.total_intensity,
                })
            })
            .collect();
        pooled.sort_by(|a, b| {
            a.mz
                .total_cmp(&b.mz)
                .then_with(|| names[a.sample].cmp(&names[b.sample]))
        });

        let mut clusters = greedy_clusters(pooled, tolerance);
        refine_boundaries(&mut clusters, tolerance);

        let rows: Vec<AlignedRow> = clusters
            .iter()
            .filter(|c| !c.members.is_empty())
            .map(|c| {
                let mut intensities = vec![0.0; names.len()];
                for m in &c.members {
                    intensities[m.sample] += m.intensity;
                }
                AlignedRow {
                    mz: c.centroid(),
                    intensities,
                }
            })
            .collect();

        log::info!(
            "Aligned {} feature sets into {} rows at {}",
            feature_sets.len(),
            rows.len(),
            tolerance
        );

        Sample::new(names, rows)
    }
}

fn check_unique(names: &[String]) -> Result<(), AlignmentError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(AlignmentError::DuplicateSampleName(name.clone()));
        }
    }
    Ok(())
}

fn greedy_clusters(pooled: Vec<Member>, tolerance: Tolerance) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for member in pooled {
        match clusters.last_mut() {
            Some(open) if open.accepts(&member, tolerance) => open.members.push(member),
            _ => clusters.push(Cluster {
                members: vec![member],
            }),
        }
    }
    clusters
}

fn refine_boundaries(clusters: &mut [Cluster], tolerance: Tolerance) {
    for i in 1..clusters.len() {
        let (head, tail) = clusters.split_at_mut(i);
        let (lower, upper) = (&mut head[i - 1], &mut tail[0]);
        if lower.members.is_empty() || upper.members.is_empty() {
            continue;
        }

        // First member of the upper cluster; ties go down
        let first = upper.members[0];
        let (own, other) = (upper.centroid(), lower.centroid());
        if upper.members.len() > 1
            && (first.mz - other).abs() <= (first.mz - own).abs()
            && lower.accepts(&first, tolerance)
            && keeps_within(&upper.members, &upper.members[1..], tolerance)
            && keeps_within(&lower.members, &joined(&lower.members, first), tolerance)
        {
            upper.members.remove(0);
            lower.members.push(first);
            continue;
        }

        // Last member of the lower cluster; must be strictly closer above
        let Some(&last) = lower.members.last() else {
            continue;
        };
        let (own, other) = (lower.centroid(), upper.centroid());
        if lower.members.len() > 1
            && (last.mz - other).abs() < (last.mz - own).abs()
            && upper.accepts(&last, tolerance)
            && keeps_within(&lower.members, &lower.members[..lower.members.len() - 1], tolerance)
            && keeps_within(&upper.members, &joined(&upper.members, last), tolerance)
        {
            lower.members.pop();
            upper.members.insert(0, last);
        }
    }
}

fn mean_mz(members: &[Member]) -> f64 {
    members.iter().map(|m| m.mz).sum::<f64>() / members.len() as f64
}

fn joined(members: &[Member], extra: Member) -> Vec<Member> {
    let mut out = members.to_vec();
    out.push(extra);
    out
}

/// No member of `after` that matched the `before` centroid loses its match
fn keeps_within(before: &[Member], after: &[Member], tolerance: Tolerance) -> bool {
    if before.is_empty() || after.is_empty() {
        return true;
    }
    let (old, new) = (mean_mz(before), mean_mz(after));
    after
        .iter()
        .all(|m| !tolerance.matches(old, m.mz) || tolerance.matches(new, m.mz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Feature;

    fn set(name: &str, features: &[(f64, f64)]) -> FeatureSet {
        FeatureSet::new(
            name,
            vec![0.0],
            features
                .iter()
                .map(|&(mz, total)| Feature::new(mz, total, vec![total]))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_three_row_scenario() {
        let a = set("a", &[(70.001, 1.0), (71.002, 2.0)]);
        let b = set("b", &[(70.003, 3.0), (72.500, 4.0)]);

        let sample = AlignmentEngine::default()
            .align(&[a, b], &["a", "b"], Tolerance::Da(0.01))
            .unwrap();

        assert_eq!(sample.len(), 3);
        assert!((sample.rows()[0].mz - 70.002).abs() < 1e-9);
        assert_eq!(sample.rows()[0].intensities, vec![1.0, 3.0]);
        assert_eq!(sample.rows()[1].mz, 71.002);
        assert_eq!(sample.rows()[1].intensities, vec![2.0, 0.0]);
        assert_eq!(sample.rows()[2].mz, 72.5);
        assert_eq!(sample.rows()[2].intensities, vec![0.0, 4.0]);
    }

    #[test]
    fn test_single_set_identity() {
        let a = set("a", &[(50.0, 1.5), (50.0003, 2.5), (99.9, 7.0)]);

        let sample = AlignmentEngine::default()
            .align(&[a.clone()], &["s"], Tolerance::Da(0.001))
            .unwrap();

        assert_eq!(sample.len(), a.len());
        for (row, feature) in sample.rows().iter().zip(a.iter()) {
            assert_eq!(row.mz, feature.mz);
            assert_eq!(row.intensities, vec![feature.total_intensity]);
        }
    }

    #[test]
    fn test_permutation_invariance() {
        let a = set("a", &[(100.0, 1.0), (100.0008, 5.0)]);
        let b = set("b", &[(100.0004, 2.0)]);
        let c = set("c", &[(100.0002, 3.0), (200.0, 9.0)]);
        let engine = AlignmentEngine::default();
        let tol = Tolerance::Da(0.0005);

        let forward = engine
            .align(&[a.clone(), b.clone(), c.clone()], &["a", "b", "c"], tol)
            .unwrap();
        let reversed = engine.align(&[c, b, a], &["c", "b", "a"], tol).unwrap();

        assert_eq!(forward.len(), reversed.len());
        for (f, r) in forward.rows().iter().zip(reversed.rows()) {
            assert_eq!(f.mz, r.mz);
            for name in ["a", "b", "c"] {
                assert_eq!(
                    f.intensities[forward.column_index(name).unwrap()],
                    r.intensities[reversed.column_index(name).unwrap()]
                );
            }
        }
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let err = AlignmentEngine::default()
            .align(&[set("a", &[])], &["a", "b"], Tolerance::Da(0.01))
            .unwrap_err();
        assert!(matches!(
            err,
            AlignmentError::DimensionMismatch {
                feature_sets: 1,
                sample_names: 2
            }
        ));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let err = AlignmentEngine::default()
            .align(&[set("a", &[]), set("b", &[])], &["x", "x"], Tolerance::Da(0.01))
            .unwrap_err();
        assert!(matches!(err, AlignmentError::DuplicateSampleName(name) if name == "x"));
    }

    #[test]
    fn test_boundary_member_moves_to_nearer_cluster() {
        // greedy pass puts 10.35 (b) with 10.0 (a); 10.5 (a) opens its own
        // cluster, and 10.35 is nearer to it than to 10.175
        let a = set("a", &[(10.0, 1.0), (10.5, 2.0)]);
        let b = set("b", &[(10.35, 3.0)]);

        let sample = AlignmentEngine::default()
            .align(&[a, b], &["a", "b"], Tolerance::Da(0.5))
            .unwrap();

        assert_eq!(sample.len(), 2);
        assert_eq!(sample.rows()[0].mz, 10.0);
        assert_eq!(sample.rows()[0].intensities, vec![1.0, 0.0]);
        assert!((sample.rows()[1].mz - 10.425).abs() < 1e-9);
        assert_eq!(sample.rows()[1].intensities, vec![2.0, 3.0]);
    }

    #[test]
    fn test_greedy_drift_is_kept_in_one_row() {
        // each value is within 0.5 of the running mean when it joins
        let sets = [
            set("a", &[(0.0, 1.0)]),
            set("b", &[(0.5, 1.0)]),
            set("c", &[(0.75, 1.0)]),
            set("d", &[(0.9, 1.0)]),
        ];
        let sample = AlignmentEngine::default()
            .align(&sets, &["a", "b", "c", "d"], Tolerance::Da(0.5))
            .unwrap();

        assert_eq!(sample.len(), 1);
        assert!((sample.rows()[0].mz - 0.5375).abs() < 1e-12);
        assert_eq!(sample.rows()[0].intensities, vec![1.0; 4]);
    }

    #[test]
    fn test_refinement_keeps_members_within_tolerance() {
        let tolerance = Tolerance::Da(0.5);
        let mut seed: u64 = 0x5eed;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            seed >> 33
        };

        for _ in 0..500 {
            let mut pooled: Vec<Member> = (0..next() % 10 + 2)
                .map(|_| Member {
                    sample: (next() % 5) as usize,
                    mz: 10.0 + (next() % 3000) as f64 / 1000.0,
                    intensity: 1.0,
                })
                .collect();
            pooled.sort_by(|a, b| a.mz.total_cmp(&b.mz).then(a.sample.cmp(&b.sample)));
            pooled.dedup_by(|a, b| a.sample == b.sample && a.mz == b.mz);

            let greedy = greedy_clusters(pooled.clone(), tolerance);
            let mut refined = greedy_clusters(pooled, tolerance);
            refine_boundaries(&mut refined, tolerance);

            let within = |clusters: &[Cluster], m: &Member| {
                clusters
                    .iter()
                    .find(|c| c.members.iter().any(|x| x.mz == m.mz && x.sample == m.sample))
                    .map(|c| tolerance.matches(c.centroid(), m.mz))
            };
            for cluster in &greedy {
                for m in &cluster.members {
                    if within(&greedy, m) == Some(true) {
                        assert_eq!(within(&refined, m), Some(true), "{:?}", m);
                    }
                }
            }
        }
    }

    #[test]
    fn test_lookups() {
        let a = set("a", &[(70.001, 1.0)]);
        let b = set("b", &[(70.003, 3.0), (80.0, 4.0)]);
        let sample = AlignmentEngine::default()
            .align(&[a, b], &["a", "b"], Tolerance::Da(0.01))
            .unwrap();

        assert_eq!(sample.value(70.002, "b", Tolerance::Da(0.001)), Some(3.0));
        assert_eq!(sample.value(80.0, "a", Tolerance::Da(0.001)), Some(0.0));
        assert_eq!(sample.value(90.0, "a", Tolerance::Da(0.001)), None);
        assert_eq!(sample.column("b"), Some(vec![3.0, 4.0]));
        assert_eq!(sample.column("z"), None);
        assert_eq!(sample.mz_values().len(), 2);
    }

    #[test]
    fn test_row_length_is_checked() {
        let err = Sample::new(
            vec!["a".to_string()],
            vec![AlignedRow {
                mz: 1.0,
                intensities: vec![1.0, 2.0],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, AlignmentError::RowLengthMismatch { expected: 1, actual: 2, .. }));
    }
}
