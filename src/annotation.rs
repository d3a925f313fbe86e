//! # Adduct and Isotope Annotation
//!
//! Finds pairs of rows whose m/z difference matches a known mass shift and
//! records the relationship on the derived ion. A positive shift means the
//! derived ion is the heavier one (`M+Na` sits 23.98922 above `M`); a
//! negative shift means it is the lighter one (`M+H-H2O`).
//!
//! Annotation never changes intensities; every match is kept.

use std::fmt;

use crate::feature::MzTable;
use crate::tolerance::Tolerance;

/// A named m/z shift
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassRule {
    /// Label written into tables, e.g. `M+Na`
    pub label: &'static str,
    /// Derived m/z minus parent m/z
    pub shift: f64,
}

/// Adduct mass differences relative to the parent ion
pub static ADDUCT_RULES: &[MassRule] = &[
    MassRule {
        label: "M+H",
        shift: 1.007276,
    },
    MassRule {
        label: "M+H-H2O",
        shift: -17.00384,
    },
    MassRule {
        label: "M+H+H2O",
        shift: 19.01839,
    },
    MassRule {
        label: "M+Na",
        shift: 23.98922,
    },
];

/// ¹³C isotope spacings
pub static ISOTOPE_RULES: &[MassRule] = &[
    MassRule {
        label: "M+1",
        shift: 1.003355,
    },
    MassRule {
        label: "M+2",
        shift: 2.00671,
    },
];

/// Kind of relationship between two rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Adduct of the partner
    Adduct,
    /// Isotope peak of the partner
    Isotope,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Adduct => write!(f, "adduct"),
            RelationKind::Isotope => write!(f, "isotope"),
        }
    }
}

/// A matched pair; `index` is the derived row, `partner` its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Relation {
    /// Derived row
    pub index: usize,
    /// Parent row
    pub partner: usize,
    /// Adduct or isotope
    pub kind: RelationKind,
    /// Rule label
    pub label: &'static str,
    /// Rule shift
    pub shift: f64,
}

/// Configuration for the annotation engine
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Window around `parent + shift` that counts as a match
    pub tolerance: Tolerance,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::Da(0.001),
        }
    }
}

/// A table together with its relationships
#[derive(Debug, Clone)]
pub struct Annotated<T> {
    table: T,
    mz: Vec<f64>,
    kinds: Vec<RelationKind>,
    relations: Vec<Relation>,
}

impl<T: MzTable> Annotated<T> {
    /// The unchanged table
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Take the table back
    pub fn into_inner(self) -> T {
        self.table
    }

    /// All relations, ordered by derived row
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relation kinds that were searched for, adducts first
    pub fn kinds(&self) -> &[RelationKind] {
        &self.kinds
    }

    /// Relations where `index` is the derived row
    pub fn relations_of(&self, index: usize) -> impl Iterator<Item = &Relation> {
        self.relations.iter().filter(move |r| r.index == index)
    }

    /// Table cell text for one row, e.g. `M+Na of m/z:123.4567`
    ///
    /// Several matches are joined with `; `; rows without one read
    /// `unknown adduct` / `unknown isotope`.
    pub fn describe(&self, index: usize, kind: RelationKind) -> String {
        let labels: Vec<String> = self
            .relations_of(index)
            .filter(|r| r.kind == kind)
            .map(|r| format!("{} of m/z:{:.4}", r.label, self.mz[r.partner]))
            .collect();
        if labels.is_empty() {
            format!("unknown {}", kind)
        } else {
            labels.join("; ")
        }
    }
}

/// Pairwise mass-difference annotation
#[derive(Debug, Clone, Default)]
pub struct AnnotationEngine {
    config: AnnotationConfig,
}

impl AnnotationEngine {
    /// Create an engine with the given configuration
    pub fn new(config: AnnotationConfig) -> Self {
        Self { config }
    }

    /// Annotate a feature set or aligned sample
    pub fn annotate<T: MzTable + Clone>(
        &self,
        table: &T,
        detect_adduct: bool,
        detect_isotope: bool,
    ) -> Annotated<T> {
        let mz = table.mz_values();
        let mut relations = Vec::new();
        let mut kinds = Vec::new();
        if detect_adduct {
            self.match_rules(&mz, ADDUCT_RULES, RelationKind::Adduct, &mut relations);
            kinds.push(RelationKind::Adduct);
        }
        if detect_isotope {
            self.match_rules(&mz, ISOTOPE_RULES, RelationKind::Isotope, &mut relations);
            kinds.push(RelationKind::Isotope);
        }
        relations.sort_by_key(|r| r.index);

        log::debug!("Annotated {} rows with {} relations", mz.len(), relations.len());

        Annotated {
            table: table.clone(),
            mz,
            kinds,
            relations,
        }
    }

    fn match_rules(
        &self,
        mz: &[f64],
        rules: &[MassRule],
        kind: RelationKind,
        relations: &mut Vec<Relation>,
    ) {
        for (partner, &parent_mz) in mz.iter().enumerate() {
            for rule in rules {
                let target = parent_mz + rule.shift;
                let window = self.config.tolerance.window(target);
                let first = mz.partition_point(|&m| m < target - window);
                for (index, &candidate) in mz.iter().enumerate().skip(first) {
                    if candidate > target + window {
                        break;
                    }
                    if index != partner && self.config.tolerance.matches(target, candidate) {
                        relations.push(Relation {
                            index,
                            partner,
                            kind,
                            label: rule.label,
                            shift: rule.shift,
                        });
                    }
                }
            }
        }
    }
}
