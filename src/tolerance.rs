//! m/z matching tolerances.
//!
//! Every component that compares m/z values (bucketing, alignment, annotation,
//! tandem retrieval) takes a [`Tolerance`], either an absolute window in
//! Daltons or a relative window in parts-per-million.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An m/z matching window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ToleranceRepr", into = "String")]
pub enum Tolerance {
    /// Absolute half-width in Daltons (Th)
    Da(f64),
    /// Relative half-width in parts-per-million of the reference m/z
    Ppm(f64),
}

impl Tolerance {
    /// Absolute half-width of the window around `mz`
    pub fn window(&self, mz: f64) -> f64 {
        match *self {
            Tolerance::Da(da) => da,
            Tolerance::Ppm(ppm) => mz.abs() * ppm * 1e-6,
        }
    }

    /// Whether `query` lies within the window centred on `reference`
    pub fn matches(&self, reference: f64, query: f64) -> bool {
        (query - reference).abs() <= self.window(reference)
    }

    /// Whether the tolerance is a usable (finite, positive) window
    pub fn is_valid(&self) -> bool {
        let value = match *self {
            Tolerance::Da(v) | Tolerance::Ppm(v) => v,
        };
        value.is_finite() && value > 0.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Da(0.001)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tolerance::Da(v) => write!(f, "{}da", v),
            Tolerance::Ppm(v) => write!(f, "{}ppm", v),
        }
    }
}

impl FromStr for Tolerance {
    type Err = String;

    /// Parse `0.001`, `0.001da`, `0.001 Da` or `5ppm`. A bare number is in Daltons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let (number, ppm) = if let Some(stripped) = lowered.strip_suffix("ppm") {
            (stripped, true)
        } else if let Some(stripped) = lowered.strip_suffix("da") {
            (stripped, false)
        } else if let Some(stripped) = lowered.strip_suffix("th") {
            (stripped, false)
        } else {
            (lowered.as_str(), false)
        };

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| format!("Invalid tolerance '{}'. Expected e.g. 0.001, 0.001da or 5ppm", s))?;

        let tolerance = if ppm {
            Tolerance::Ppm(value)
        } else {
            Tolerance::Da(value)
        };

        if !tolerance.is_valid() {
            return Err(format!("Tolerance must be finite and positive, got '{}'", s));
        }
        Ok(tolerance)
    }
}

/// Config files may give a bare number (Daltons) or a suffixed string
#[derive(Deserialize)]
#[serde(untagged)]
enum ToleranceRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<ToleranceRepr> for Tolerance {
    type Error = String;

    fn try_from(value: ToleranceRepr) -> Result<Self, Self::Error> {
        match value {
            ToleranceRepr::Number(da) => {
                let tolerance = Tolerance::Da(da);
                if tolerance.is_valid() {
                    Ok(tolerance)
                } else {
                    Err(format!("Tolerance must be finite and positive, got {}", da))
                }
            }
            ToleranceRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Tolerance> for String {
    fn from(value: Tolerance) -> Self {
        value.to_string()
    }
}
