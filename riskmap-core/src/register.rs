//! Risk register: the in-memory state the host works against
//!
//! Global invariants enforced:
//! - Every risk held by a register is normalized (normalize-before-read)
//! - Ids are assigned sequentially (max + 1, minimum 1)
//! - Only `delete_risk` removes a record; unreadable entries are kept raw
//! - Register order is preserved; filtering never reorders

use crate::model::{self, ActionPlan, Control, Interview, Risk, RiskId};
use crate::normalize;
use crate::scoring::{self, ScoringModel};
use crate::severity::{Severity, AXIS_SIZE};
use crate::taxonomy::{Taxonomy, TaxonomyKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single-document form of a register (import/export and `--input`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterDocument {
    pub risks: Vec<Value>,
    pub controls: Vec<Value>,
    pub action_plans: Vec<Value>,
    pub interviews: Vec<Value>,
    pub config: Option<Taxonomy>,
}

impl RegisterDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("failed to parse register document")
    }
}

/// Filter applied before placement or listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskFilter {
    pub process: Option<String>,
    pub sub_process: Option<String>,
    pub status: Option<String>,
    pub severity: Option<Severity>,
    /// Case-insensitive match on description, corruption type and process
    pub query: Option<String>,
}

/// Diagnostic level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Warning,
    Error,
}

/// A non-fatal register diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Issue {
    pub level: IssueLevel,
    pub risk_id: Option<RiskId>,
    pub message: String,
}

/// Stored entries that could not be decoded, written back unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unreadable {
    pub risks: Vec<Value>,
    pub controls: Vec<Value>,
    pub action_plans: Vec<Value>,
    pub interviews: Vec<Value>,
}

impl Unreadable {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.risks.len() + self.controls.len() + self.action_plans.len() + self.interviews.len()
    }
}

#[derive(Debug, Clone)]
pub struct Register {
    risks: Vec<Risk>,
    pub controls: Vec<Control>,
    pub action_plans: Vec<ActionPlan>,
    pub interviews: Vec<Interview>,
    pub taxonomy: Taxonomy,
    pub unreadable: Unreadable,
    model: ScoringModel,
}

impl Register {
    /// Empty register with the given scoring model
    pub fn new(taxonomy: Taxonomy, model: ScoringModel) -> Self {
        Register {
            risks: Vec::new(),
            controls: Vec::new(),
            action_plans: Vec::new(),
            interviews: Vec::new(),
            taxonomy,
            unreadable: Unreadable::default(),
            model,
        }
    }

    /// Build from already decoded parts
    ///
    /// Records without a usable id get the next sequential one, and every
    /// risk is normalized.
    pub fn from_parts(
        mut risks: Vec<Risk>,
        mut controls: Vec<Control>,
        mut action_plans: Vec<ActionPlan>,
        mut interviews: Vec<Interview>,
        taxonomy: Taxonomy,
        model: ScoringModel,
    ) -> Self {
        model::assign_missing_ids(&mut risks, "risk");
        model::assign_missing_ids(&mut controls, "control");
        model::assign_missing_ids(&mut action_plans, "action plan");
        model::assign_missing_ids(&mut interviews, "interview");

        let risks = normalize::normalize_risks(&risks, &model);
        tracing::debug!("register loaded with {} risk(s)", risks.len());
        Register {
            risks,
            controls,
            action_plans,
            interviews,
            taxonomy,
            unreadable: Unreadable::default(),
            model,
        }
    }

    /// Build from a JSON document; entries that cannot be read are kept raw
    pub fn from_document(doc: RegisterDocument, model: ScoringModel) -> Self {
        let (risks, unreadable_risks): (Vec<Risk>, _) =
            model::decode_lenient_list(doc.risks, "risk", Risk::from_value);
        let (controls, unreadable_controls): (Vec<Control>, _) =
            model::decode_lenient_list(doc.controls, "control", serde_json::from_value);
        let (action_plans, unreadable_plans): (Vec<ActionPlan>, _) =
            model::decode_lenient_list(doc.action_plans, "action plan", serde_json::from_value);
        let (interviews, unreadable_interviews): (Vec<Interview>, _) =
            model::decode_lenient_list(doc.interviews, "interview", serde_json::from_value);

        let mut register = Register::from_parts(
            risks,
            controls,
            action_plans,
            interviews,
            doc.config.unwrap_or_default(),
            model,
        );
        register.unreadable = Unreadable {
            risks: unreadable_risks,
            controls: unreadable_controls,
            action_plans: unreadable_plans,
            interviews: unreadable_interviews,
        };
        register
    }

    /// Document form; unreadable entries follow the decoded ones
    pub fn to_document(&self) -> Result<RegisterDocument> {
        Ok(RegisterDocument {
            risks: with_unreadable(to_values(&self.risks)?, &self.unreadable.risks),
            controls: with_unreadable(to_values(&self.controls)?, &self.unreadable.controls),
            action_plans: with_unreadable(
                to_values(&self.action_plans)?,
                &self.unreadable.action_plans,
            ),
            interviews: with_unreadable(to_values(&self.interviews)?, &self.unreadable.interviews),
            config: Some(self.taxonomy.clone()),
        })
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    pub fn risks(&self) -> &[Risk] {
        &self.risks
    }

    pub fn risk(&self, id: &RiskId) -> Option<&Risk> {
        self.risks.iter().find(|r| r.id.matches(id))
    }

    fn position(&self, id: &RiskId) -> Result<usize> {
        self.risks
            .iter()
            .position(|r| r.id.matches(id))
            .with_context(|| format!("no risk with id {}", id))
    }

    /// Add a risk, assigning the next id and the initial status when missing
    pub fn add_risk(&mut self, mut raw: Risk) -> RiskId {
        let id = model::next_id(self.risks.iter().map(|r| &r.id));
        raw.id = id.clone();
        if raw.status.is_empty() {
            raw.status = self.taxonomy.initial_status().to_string();
        }
        self.risks.push(normalize::normalize_risk(&raw, &self.model));
        tracing::debug!("added risk {}", id);
        id
    }

    /// Apply an edit then renormalize
    pub fn update_risk<F>(&mut self, id: &RiskId, edit: F) -> Result<&Risk>
    where
        F: FnOnce(&mut Risk),
    {
        let index = self.position(id)?;
        let mut risk = self.risks[index].clone();
        let original_id = risk.id.clone();
        edit(&mut risk);
        risk.id = original_id;
        self.risks[index] = normalize::normalize_risk(&risk, &self.model);
        Ok(&self.risks[index])
    }

    /// Move a risk through the lifecycle
    pub fn set_status(&mut self, id: &RiskId, status: &str) -> Result<()> {
        if !self.taxonomy.contains(TaxonomyKind::Status, status) {
            anyhow::bail!("unknown status '{}'", status);
        }
        let status = status.to_string();
        self.update_risk(id, |r| r.status = status)?;
        Ok(())
    }

    /// Remove a risk and unlink it from action plans
    pub fn delete_risk(&mut self, id: &RiskId) -> Result<Risk> {
        let index = self.position(id)?;
        let removed = self.risks.remove(index);
        for plan in &mut self.action_plans {
            plan.risks.retain(|r| !r.matches(&removed.id));
        }
        tracing::debug!("deleted risk {}", removed.id);
        Ok(removed)
    }

    /// Risks counted by the dashboard
    pub fn validated_risks(&self) -> Vec<Risk> {
        self.risks
            .iter()
            .filter(|r| r.status == self.taxonomy.validated_status)
            .cloned()
            .collect()
    }

    /// Risks matching a filter, in register order
    pub fn filter(&self, filter: &RiskFilter) -> Vec<Risk> {
        let query = filter.query.as_ref().map(|q| q.to_lowercase());
        self.risks
            .iter()
            .filter(|r| filter.process.as_ref().map_or(true, |p| &r.process == p))
            .filter(|r| filter.sub_process.as_ref().map_or(true, |s| &r.sub_process == s))
            .filter(|r| filter.status.as_ref().map_or(true, |s| &r.status == s))
            .filter(|r| {
                filter
                    .severity
                    .map_or(true, |s| scoring::risk_brut_severity(r, &self.model) == s)
            })
            .filter(|r| {
                query.as_ref().map_or(true, |q| {
                    [&r.description, &r.corruption_type, &r.process]
                        .iter()
                        .any(|field| field.to_lowercase().contains(q.as_str()))
                })
            })
            .cloned()
            .collect()
    }

    /// Non-fatal diagnostics; scoring keeps working regardless
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        let axis = 1.0..=f64::from(AXIS_SIZE);

        if !self.unreadable.is_empty() {
            issues.push(Issue {
                level: IssueLevel::Warning,
                risk_id: None,
                message: format!(
                    "{} unreadable record(s) kept unchanged",
                    self.unreadable.len()
                ),
            });
        }

        for (i, risk) in self.risks.iter().enumerate() {
            let id = Some(risk.id.clone());
            if self.risks[..i].iter().any(|r| r.id.matches(&risk.id)) {
                issues.push(Issue {
                    level: IssueLevel::Error,
                    risk_id: id.clone(),
                    message: "duplicate id".to_string(),
                });
            }
            for (name, value) in [("probBrut", risk.prob_brut), ("impactBrut", risk.impact_brut)] {
                if !axis.contains(&value) {
                    issues.push(Issue {
                        level: IssueLevel::Error,
                        risk_id: id.clone(),
                        message: format!("{} {} is outside 1-{}", name, value, AXIS_SIZE),
                    });
                }
            }
            if !risk.process.is_empty()
                && !self.taxonomy.contains(TaxonomyKind::Process, &risk.process)
            {
                issues.push(Issue {
                    level: IssueLevel::Warning,
                    risk_id: id.clone(),
                    message: format!("unknown process '{}'", risk.process),
                });
            } else if !risk.sub_process.is_empty()
                && !self.taxonomy.has_sub_process(&risk.process, &risk.sub_process)
            {
                issues.push(Issue {
                    level: IssueLevel::Warning,
                    risk_id: id.clone(),
                    message: format!(
                        "sub-process '{}' does not belong to process '{}'",
                        risk.sub_process, risk.process
                    ),
                });
            }
            if !risk.status.is_empty() && !self.taxonomy.contains(TaxonomyKind::Status, &risk.status)
            {
                issues.push(Issue {
                    level: IssueLevel::Warning,
                    risk_id: id.clone(),
                    message: format!("unknown status '{}'", risk.status),
                });
            }
            for key in self.model.aggravating.unknown_keys(&risk.aggravating_factors) {
                issues.push(Issue {
                    level: IssueLevel::Warning,
                    risk_id: id.clone(),
                    message: format!("unknown aggravating factor '{}'", key),
                });
            }
            for control in &risk.controls {
                if !self.controls.iter().any(|c| c.id.matches(control)) {
                    issues.push(Issue {
                        level: IssueLevel::Warning,
                        risk_id: id.clone(),
                        message: format!("references missing control {}", control),
                    });
                }
            }
            for plan in &risk.action_plans {
                if !self.action_plans.iter().any(|p| p.id.matches(plan)) {
                    issues.push(Issue {
                        level: IssueLevel::Warning,
                        risk_id: id.clone(),
                        message: format!("references missing action plan {}", plan),
                    });
                }
            }
        }

        issues
    }
}

fn with_unreadable(mut values: Vec<Value>, unreadable: &[Value]) -> Vec<Value> {
    values.extend(unreadable.iter().cloned());
    values
}

fn to_values<T: Serialize>(items: &[T]) -> Result<Vec<Value>> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).context("failed to serialize register record"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn register() -> Register {
        let doc: RegisterDocument = serde_json::from_value(json!({
            "risks": [
                {"id": 1, "process": "achats", "subProcess": "passation-commandes",
                 "status": "valide", "probBrut": 3, "impactBrut": 4,
                 "description": "Rétrocommission sur commande"},
                {"id": "2", "process": "rh", "status": "brouillon", "probBrut": 1, "impactBrut": 2},
                {"id": 5, "process": "achats", "status": "valide", "probBrut": 2, "impactBrut": 2,
                 "controls": [10]}
            ],
            "controls": [{"id": 10, "name": "Double validation", "type": "preventif"}],
            "actionPlans": [{"id": 1, "title": "Former les acheteurs", "status": "en-cours", "risks": [1, 5]}]
        }))
        .unwrap();
        Register::from_document(doc, ScoringModel::default())
    }

    #[test]
    fn test_load_normalizes_everything() {
        let reg = register();
        assert!(reg.risks().iter().all(|r| r.prob_net.is_some() && r.impact_net.is_some()));
    }

    #[test]
    fn test_add_assigns_next_id_and_initial_status() {
        let mut reg = register();
        let id = reg.add_risk(Risk::new(0, 2.0, 3.0));
        assert_eq!(id, RiskId::Int(6));
        let risk = reg.risk(&id).unwrap();
        assert_eq!(risk.status, "brouillon");
        assert_eq!(risk.mitigation_effectiveness.as_deref(), Some("insuffisant"));
    }

    #[test]
    fn test_add_to_empty_register_starts_at_one() {
        let mut reg = Register::new(Taxonomy::default(), ScoringModel::default());
        assert_eq!(reg.add_risk(Risk::default()), RiskId::Int(1));
        assert_eq!(reg.add_risk(Risk::default()), RiskId::Int(2));
    }

    #[test]
    fn test_update_renormalizes_and_keeps_id() {
        let mut reg = register();
        let updated = reg
            .update_risk(&RiskId::Int(1), |r| {
                r.id = RiskId::Int(99);
                r.mitigation_effectiveness = Some("efficace".to_string());
            })
            .unwrap();
        assert_eq!(updated.id, RiskId::Int(1));
        assert_eq!(updated.prob_net, Some(4));
    }

    #[test]
    fn test_update_missing_risk_fails() {
        let mut reg = register();
        assert!(reg.update_risk(&RiskId::Int(42), |_| {}).is_err());
    }

    #[test]
    fn test_set_status_checks_taxonomy() {
        let mut reg = register();
        reg.set_status(&RiskId::Int(2), "valide").unwrap();
        assert_eq!(reg.validated_risks().len(), 3);
        assert!(reg.set_status(&RiskId::Int(2), "supprime").is_err());
    }

    #[test]
    fn test_delete_unlinks_action_plans() {
        let mut reg = register();
        let removed = reg.delete_risk(&RiskId::Text("1".into())).unwrap();
        assert_eq!(removed.id, RiskId::Int(1));
        assert_eq!(reg.action_plans[0].risks, vec![RiskId::Int(5)]);
        assert_eq!(reg.risks().len(), 2);
    }

    #[test]
    fn test_validated_subset() {
        let reg = register();
        let ids: Vec<String> = reg.validated_risks().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "5"]);
    }

    #[test]
    fn test_filter_preserves_order() {
        let reg = register();
        let filter = RiskFilter {
            process: Some("achats".to_string()),
            ..RiskFilter::default()
        };
        let ids: Vec<String> = reg.filter(&filter).iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "5"]);

        let critique = RiskFilter {
            severity: Some(Severity::Critique),
            ..RiskFilter::default()
        };
        assert_eq!(reg.filter(&critique).len(), 1);

        let query = RiskFilter {
            query: Some("RÉTRO".to_string()),
            ..RiskFilter::default()
        };
        assert_eq!(reg.filter(&query).len(), 1);
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut reg = register();
        reg.add_risk(Risk {
            process: "logistique".to_string(),
            controls: vec![RiskId::Int(77)],
            ..Risk::new(0, 6.0, 2.0)
        });
        let issues = reg.validate();
        assert!(issues
            .iter()
            .any(|i| i.level == IssueLevel::Error && i.message.contains("probBrut")));
        assert!(issues.iter().any(|i| i.message.contains("unknown process")));
        assert!(issues.iter().any(|i| i.message.contains("missing control 77")));
        // the clean records produce nothing
        assert!(issues.iter().all(|i| i.risk_id == Some(RiskId::Int(6))));
    }

    #[test]
    fn test_document_round_trip_keeps_records() {
        let reg = register();
        let doc = reg.to_document().unwrap();
        let again = Register::from_document(doc, ScoringModel::default());
        assert_eq!(again.risks(), reg.risks());
        assert_eq!(again.controls, reg.controls);
    }

    #[test]
    fn test_malformed_ids_survive_load_and_save() {
        let doc: RegisterDocument = serde_json::from_value(json!({
            "risks": [
                {"id": 1, "probBrut": 1, "impactBrut": 1},
                {"id": -4, "probBrut": 2, "impactBrut": 2},
                {"id": null, "probBrut": 3, "impactBrut": 3},
                {"id": 2.0, "probBrut": 4, "impactBrut": 4}
            ],
            "controls": [{"name": "Sans identifiant", "type": "preventif"}],
            "actionPlans": [{"id": 3, "title": "Plan", "risks": [-4, 2.0]}]
        }))
        .unwrap();
        let reg = Register::from_document(doc, ScoringModel::default());
        let ids: Vec<String> = reg.risks().iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "-4", "3", "2"]);
        assert_eq!(reg.controls[0].id, RiskId::Int(1));
        assert_eq!(
            reg.action_plans[0].risks,
            vec![RiskId::Text("-4".into()), RiskId::Int(2)]
        );

        let again = Register::from_document(reg.to_document().unwrap(), ScoringModel::default());
        assert_eq!(again.risks(), reg.risks());
        assert_eq!(again.controls.len(), 1);
    }

    #[test]
    fn test_unreadable_entries_are_written_back() {
        let doc: RegisterDocument = serde_json::from_value(json!({
            "risks": [{"id": 1, "probBrut": 2, "impactBrut": 2}, "risque illisible", 42],
            "interviews": [["pas", "un", "entretien"]]
        }))
        .unwrap();
        let reg = Register::from_document(doc, ScoringModel::default());
        assert_eq!(reg.risks().len(), 1);
        assert_eq!(reg.unreadable.len(), 3);
        assert!(reg
            .validate()
            .iter()
            .any(|i| i.risk_id.is_none() && i.message.contains("3 unreadable")));

        let out = reg.to_document().unwrap();
        assert_eq!(out.risks.len(), 3);
        assert_eq!(out.risks[1], json!("risque illisible"));
        assert_eq!(out.risks[2], json!(42));
        assert_eq!(out.interviews, vec![json!(["pas", "un", "entretien"])]);
    }

    #[test]
    fn test_add_after_max_id_does_not_overflow() {
        let doc: RegisterDocument = serde_json::from_value(json!({
            "risks": [{"id": "18446744073709551615", "probBrut": 1, "impactBrut": 1}]
        }))
        .unwrap();
        let mut reg = Register::from_document(doc, ScoringModel::default());
        assert_eq!(reg.add_risk(Risk::default()), RiskId::Int(1));
        assert_eq!(reg.add_risk(Risk::default()), RiskId::Int(2));
    }
}
