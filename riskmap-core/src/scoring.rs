//! Brut and net scoring
//!
//! Global invariants enforced:
//! - All functions are pure; no input is mutated
//! - Scores are never negative (non-numeric inputs count as 0)
//! - The stored brut score is the raw probability x impact product;
//!   aggravation only moves the matrix placement
//!
//! Two net conventions coexist:
//! - `risk_net_score`: probNet x impactNet, the cell-based value behind the net matrix
//! - `risk_net_info().score`: brut x (1 - mitigation coefficient), used by the
//!   dashboard and exports

use crate::factors::AggravatingGroups;
use crate::mitigation::{MitigationLevel, MitigationScale};
use crate::model::Risk;
use crate::severity::{
    self, NetImpactReferences, Severity, SeverityThresholds, AXIS_SIZE,
};
use serde::{Deserialize, Serialize};

/// Everything the scoring functions read, expressed as data
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoringModel {
    pub thresholds: SeverityThresholds,
    pub aggravating: AggravatingGroups,
    pub mitigation: MitigationScale,
    pub net_impact: NetImpactReferences,
}

/// Net view of a risk as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetInfo {
    pub score: f64,
    pub brut_score: f64,
    /// Share of the brut score removed by mitigation (0..1)
    pub coefficient: f64,
    pub effectiveness: String,
    pub label: String,
    /// `coefficient` as a whole percentage
    pub reduction: u32,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Aggravating coefficient of a risk
///
/// Derived from the selected factors, but a stored coefficient acts as a
/// floor: a valid (finite, >= 1) stored value larger than the derived one wins.
pub fn risk_aggravating_coefficient(risk: &Risk, model: &ScoringModel) -> f64 {
    let derived = model
        .aggravating
        .coefficient_for(&risk.aggravating_factors.normalized())
        .max(1.0);
    match risk.aggravating_coefficient {
        Some(stored) if stored.is_finite() && stored >= 1.0 => derived.max(stored),
        _ => derived,
    }
}

/// Probability used to place a risk on the brut matrix, clamped to 1..=4
pub fn risk_effective_brut_probability(risk: &Risk, model: &ScoringModel) -> f64 {
    let raw = finite_or_zero(risk.prob_brut) * risk_aggravating_coefficient(risk, model);
    raw.clamp(1.0, f64::from(AXIS_SIZE))
}

/// Raw probability x impact, unclamped and without aggravation
pub fn risk_brut_score(risk: &Risk) -> f64 {
    (finite_or_zero(risk.prob_brut) * finite_or_zero(risk.impact_brut)).max(0.0)
}

pub fn risk_severity_from_score(score: f64, model: &ScoringModel) -> Severity {
    severity::severity_from_score(score, &model.thresholds)
}

pub fn risk_brut_severity(risk: &Risk, model: &ScoringModel) -> Severity {
    risk_severity_from_score(risk_brut_score(risk), model)
}

/// Residual impact (1..=4) for a brut severity bucket
pub fn net_impact_from_severity(severity: Severity, model: &ScoringModel) -> u8 {
    model.net_impact.impact_for(severity)
}

/// The risk's effectiveness level, or the default level when missing or invalid
pub fn risk_mitigation_effectiveness<'m>(risk: &Risk, model: &'m ScoringModel) -> &'m MitigationLevel {
    model
        .mitigation
        .resolve(risk.mitigation_effectiveness.as_deref())
}

/// Net-axis column of a mitigation level (1-based, unknown -> default level)
pub fn mitigation_column(level: &str, scale: &MitigationScale) -> u8 {
    scale.column(level)
}

/// probNet x impactNet from the stored (normalizer-derived) fields
///
/// Missing net fields count as 0; normalize before reading.
pub fn risk_net_score(risk: &Risk) -> f64 {
    let prob = risk.prob_net.map(f64::from).unwrap_or(0.0);
    let impact = risk.impact_net.map(f64::from).unwrap_or(0.0);
    prob * impact
}

/// Dashboard/export net figures: brut x (1 - coefficient)
pub fn risk_net_info(risk: &Risk, model: &ScoringModel) -> NetInfo {
    let level = risk_mitigation_effectiveness(risk, model);
    let brut_score = risk_brut_score(risk);
    let coefficient = level.coefficient.clamp(0.0, 1.0);
    NetInfo {
        score: brut_score * (1.0 - coefficient),
        brut_score,
        coefficient,
        effectiveness: level.value.clone(),
        label: level.label.clone(),
        reduction: (coefficient * 100.0).round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::AggravatingFactors;

    fn risk(prob: f64, impact: f64) -> Risk {
        Risk::new(1, prob, impact)
    }

    fn with_factors(mut r: Risk, g1: &[&str], g2: &[&str]) -> Risk {
        r.aggravating_factors = AggravatingFactors {
            group1: g1.iter().map(|s| s.to_string()).collect(),
            group2: g2.iter().map(|s| s.to_string()).collect(),
        };
        r
    }

    #[test]
    fn test_brut_score_ignores_aggravation() {
        let model = ScoringModel::default();
        let r = with_factors(risk(3.0, 4.0), &["agent-public"], &[]);
        assert_eq!(risk_brut_score(&r), 12.0);
        assert_eq!(risk_brut_severity(&r, &model), Severity::Critique);
        assert_eq!(risk_aggravating_coefficient(&r, &model), 1.4);
    }

    #[test]
    fn test_effective_probability_is_clamped() {
        let model = ScoringModel::default();
        let r = with_factors(risk(2.0, 1.0), &["agent-public"], &[]);
        assert!((risk_effective_brut_probability(&r, &model) - 2.8).abs() < 1e-9);

        let high = with_factors(risk(4.0, 1.0), &["agent-public"], &[]);
        assert_eq!(risk_effective_brut_probability(&high, &model), 4.0);

        let zero = risk(0.0, 1.0);
        assert_eq!(risk_effective_brut_probability(&zero, &model), 1.0);
    }

    #[test]
    fn test_stored_coefficient_is_a_floor() {
        let model = ScoringModel::default();
        let mut r = with_factors(risk(2.0, 2.0), &[], &["urgence"]);
        r.aggravating_coefficient = Some(1.4);
        assert_eq!(risk_aggravating_coefficient(&r, &model), 1.4);

        r.aggravating_coefficient = Some(1.1);
        assert_eq!(risk_aggravating_coefficient(&r, &model), 1.2);

        r.aggravating_coefficient = Some(0.5);
        assert_eq!(risk_aggravating_coefficient(&r, &model), 1.2);

        r.aggravating_coefficient = Some(f64::NAN);
        assert_eq!(risk_aggravating_coefficient(&r, &model), 1.2);
    }

    #[test]
    fn test_non_numeric_inputs_score_zero() {
        let r = risk(f64::NAN, 3.0);
        assert_eq!(risk_brut_score(&r), 0.0);
    }

    #[test]
    fn test_brut_score_is_not_clamped() {
        assert_eq!(risk_brut_score(&risk(5.0, 5.0)), 25.0);
    }

    #[test]
    fn test_net_info_reduction() {
        let model = ScoringModel::default();
        let mut r = risk(3.0, 4.0);
        r.mitigation_effectiveness = Some("efficace".to_string());
        let info = risk_net_info(&r, &model);
        assert_eq!(info.brut_score, 12.0);
        assert_eq!(info.coefficient, 0.75);
        assert_eq!(info.reduction, 75);
        assert_eq!(info.score, 3.0);
        assert_eq!(info.effectiveness, "efficace");
        assert_eq!(info.label, "Efficace");
    }

    #[test]
    fn test_net_info_defaults_to_insuffisant() {
        let model = ScoringModel::default();
        let info = risk_net_info(&risk(2.0, 4.0), &model);
        assert_eq!(info.effectiveness, "insuffisant");
        assert_eq!(info.score, 6.0);
        assert_eq!(info.reduction, 25);
    }

    #[test]
    fn test_net_info_inefficace_keeps_brut_score() {
        let model = ScoringModel::default();
        let mut r = risk(2.0, 3.0);
        r.mitigation_effectiveness = Some("inefficace".to_string());
        let info = risk_net_info(&r, &model);
        assert_eq!(info.score, 6.0);
        assert_eq!(info.reduction, 0);
    }

    #[test]
    fn test_net_score_uses_stored_fields() {
        let mut r = risk(3.0, 4.0);
        assert_eq!(risk_net_score(&r), 0.0);
        r.prob_net = Some(4);
        r.impact_net = Some(4);
        assert_eq!(risk_net_score(&r), 16.0);
    }

    #[test]
    fn test_net_impact_from_severity_default_table() {
        let model = ScoringModel::default();
        assert_eq!(net_impact_from_severity(Severity::Critique, &model), 4);
        assert_eq!(net_impact_from_severity(Severity::Faible, &model), 1);
    }

    #[test]
    fn test_mitigation_column() {
        let model = ScoringModel::default();
        assert_eq!(mitigation_column("efficace", &model.mitigation), 4);
        assert_eq!(mitigation_column("???", &model.mitigation), 2);
    }
}
