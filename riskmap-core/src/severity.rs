//! Severity buckets
//!
//! Global invariants enforced:
//! - Every score maps to exactly one bucket
//! - Buckets are totally ordered: faible < modere < fort < critique
//! - Lower bounds are inclusive

use serde::{Deserialize, Serialize};

/// Number of cells along each axis of the risk matrix
pub const AXIS_SIZE: u8 = 4;

/// Highest probability x impact product on a 4x4 grid
pub const MAX_SCORE: f64 = 16.0;

/// Severity bucket derived from a probability x impact score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Faible,   // < 3
    Modere,   // 3-6
    Fort,     // 6-12
    Critique, // >= 12
}

impl Severity {
    /// All buckets, lowest first
    pub const ALL: [Severity; 4] = [
        Severity::Faible,
        Severity::Modere,
        Severity::Fort,
        Severity::Critique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Faible => "faible",
            Severity::Modere => "modere",
            Severity::Fort => "fort",
            Severity::Critique => "critique",
        }
    }

    /// Display label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Faible => "Faible",
            Severity::Modere => "Modéré",
            Severity::Fort => "Fort",
            Severity::Critique => "Critique",
        }
    }

    /// Zero-based position in the ordering (faible = 0, critique = 3)
    pub fn index(&self) -> usize {
        match self {
            Severity::Faible => 0,
            Severity::Modere => 1,
            Severity::Fort => 2,
            Severity::Critique => 3,
        }
    }

    pub fn parse(value: &str) -> Option<Severity> {
        Severity::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive lower bounds of the upper three buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    pub modere: f64,
    pub fort: f64,
    pub critique: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        SeverityThresholds {
            modere: 3.0,
            fort: 6.0,
            critique: 12.0,
        }
    }
}

/// Assign a severity bucket to a score
///
/// Non-finite scores are treated as 0 so that NaN never lands in `critique`.
pub fn severity_from_score(score: f64, thresholds: &SeverityThresholds) -> Severity {
    let score = if score.is_finite() { score } else { 0.0 };
    if score < thresholds.modere {
        Severity::Faible
    } else if score < thresholds.fort {
        Severity::Modere
    } else if score < thresholds.critique {
        Severity::Fort
    } else {
        Severity::Critique
    }
}

/// Reference scores standing for each brut bucket when deriving the net impact
///
/// A reference score lives on the 1-16 product scale; the net impact is the
/// axis cell that score falls into once the scale is folded onto 4 columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetImpactReferences {
    pub faible: f64,
    pub modere: f64,
    pub fort: f64,
    pub critique: f64,
}

impl Default for NetImpactReferences {
    fn default() -> Self {
        NetImpactReferences {
            faible: 2.0,
            modere: 4.5,
            fort: 9.0,
            critique: 13.5,
        }
    }
}

impl NetImpactReferences {
    pub fn reference_for(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Faible => self.faible,
            Severity::Modere => self.modere,
            Severity::Fort => self.fort,
            Severity::Critique => self.critique,
        }
    }

    /// Residual impact (1..=4) for a brut severity bucket
    pub fn impact_for(&self, severity: Severity) -> u8 {
        let reference = self.reference_for(severity);
        let cell = (reference * f64::from(AXIS_SIZE) / MAX_SCORE).ceil();
        clamp_to_axis(cell)
    }
}

/// Clamp a value onto the 1..=4 axis
pub(crate) fn clamp_to_axis(value: f64) -> u8 {
    if !value.is_finite() || value < 1.0 {
        1
    } else if value > f64::from(AXIS_SIZE) {
        AXIS_SIZE
    } else {
        value as u8
    }
}
