//! Risk normalization
//!
//! Derives the cached scoring fields of a risk from its raw inputs.
//!
//! Global invariants enforced:
//! - Normalization is idempotent: normalize(normalize(r)) == normalize(r)
//! - The aggravating coefficient never drops below a valid stored value
//! - probNet/impactNet are always re-derived, never trusted from input

use crate::model::Risk;
use crate::scoring::{self, ScoringModel};

/// Return a normalized copy of `raw`
///
/// Steps, in order:
/// 1. canonical aggravating factor sets
/// 2. aggravating coefficient (max of stored floor and derived value)
/// 3. mitigation level (default level when absent or invalid)
/// 4. probNet from the level's column
/// 5. impactNet from the brut severity bucket
pub fn normalize_risk(raw: &Risk, model: &ScoringModel) -> Risk {
    let mut risk = raw.clone();

    if !risk.prob_brut.is_finite() {
        risk.prob_brut = 0.0;
    }
    if !risk.impact_brut.is_finite() {
        risk.impact_brut = 0.0;
    }

    risk.aggravating_factors = raw.aggravating_factors.normalized();
    risk.aggravating_coefficient = Some(scoring::risk_aggravating_coefficient(&risk, model));

    let level = scoring::risk_mitigation_effectiveness(&risk, model);
    if risk.mitigation_effectiveness.as_deref() != Some(level.value.as_str()) {
        tracing::debug!(
            "risk {}: mitigation level {:?} resolved to '{}'",
            risk.id,
            raw.mitigation_effectiveness,
            level.value
        );
    }
    risk.prob_net = Some(model.mitigation.column(&level.value));
    risk.mitigation_effectiveness = Some(level.value.clone());

    let severity = scoring::risk_brut_severity(&risk, model);
    risk.impact_net = Some(scoring::net_impact_from_severity(severity, model));

    risk
}

/// Normalize a batch, preserving order
pub fn normalize_risks(raw: &[Risk], model: &ScoringModel) -> Vec<Risk> {
    raw.iter().map(|r| normalize_risk(r, model)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factors::AggravatingFactors;
    use serde_json::json;

    #[test]
    fn test_fills_derived_fields() {
        let model = ScoringModel::default();
        let raw = Risk::from_value(json!({
            "id": 1,
            "probBrut": 3,
            "impactBrut": 4,
            "aggravatingFactors": {"group1": [], "group2": []}
        }))
        .unwrap();
        let risk = normalize_risk(&raw, &model);
        assert_eq!(risk.aggravating_coefficient, Some(1.0));
        assert_eq!(risk.mitigation_effectiveness.as_deref(), Some("insuffisant"));
        assert_eq!(risk.prob_net, Some(2));
        assert_eq!(risk.impact_net, Some(4));
    }

    #[test]
    fn test_overrides_stale_net_fields() {
        let model = ScoringModel::default();
        let mut raw = Risk::new(1, 1.0, 2.0);
        raw.prob_net = Some(4);
        raw.impact_net = Some(4);
        raw.mitigation_effectiveness = Some("ameliorable".to_string());
        let risk = normalize_risk(&raw, &model);
        assert_eq!(risk.prob_net, Some(3));
        assert_eq!(risk.impact_net, Some(1));
    }

    #[test]
    fn test_does_not_mutate_input() {
        let model = ScoringModel::default();
        let raw = Risk::new(9, 2.0, 2.0);
        let before = raw.clone();
        let _ = normalize_risk(&raw, &model);
        assert_eq!(raw, before);
    }

    #[test]
    fn test_idempotent_with_floor_coefficient() {
        let model = ScoringModel::default();
        let mut raw = Risk::new(1, 2.0, 3.0);
        raw.aggravating_factors = AggravatingFactors {
            group1: Default::default(),
            group2: [" urgence ".to_string()].into_iter().collect(),
        };
        raw.aggravating_coefficient = Some(1.35);
        let once = normalize_risk(&raw, &model);
        let twice = normalize_risk(&once, &model);
        assert_eq!(once, twice);
        assert_eq!(once.aggravating_coefficient, Some(1.35));
        assert!(once.aggravating_factors.group2.contains("urgence"));
    }

    #[test]
    fn test_non_finite_inputs_become_zero() {
        let model = ScoringModel::default();
        let raw = Risk::new(1, f64::NAN, 3.0);
        let risk = normalize_risk(&raw, &model);
        assert_eq!(risk.prob_brut, 0.0);
        assert_eq!(risk.impact_net, Some(1));
    }

    #[test]
    fn test_batch_preserves_order() {
        let model = ScoringModel::default();
        let raw = vec![Risk::new(3, 1.0, 1.0), Risk::new(1, 4.0, 4.0)];
        let out = normalize_risks(&raw, &model);
        let ids: Vec<String> = out.iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }
}
