//! Configurable taxonomy
//!
//! Processes, risk classifications, lifecycle statuses and the vocabularies
//! used by controls and action plans. The scoring core only reads it as
//! id -> label lookup tables.

use serde::{Deserialize, Serialize};

/// A value with its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub value: String,
    pub label: String,
}

impl Entry {
    pub fn new(value: &str, label: &str) -> Self {
        Entry {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// A process and its ordered sub-processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub sub_processes: Vec<Entry>,
}

/// Lookup table families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyKind {
    Process,
    CorruptionType,
    Tier,
    Status,
    ControlType,
    ActionPlanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Taxonomy {
    pub processes: Vec<Process>,
    pub corruption_types: Vec<Entry>,
    pub tiers: Vec<Entry>,
    /// Lifecycle, in order
    pub statuses: Vec<Entry>,
    /// Status whose risks feed the dashboard
    pub validated_status: String,
    pub control_types: Vec<Entry>,
    pub action_plan_statuses: Vec<Entry>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Taxonomy {
            processes: vec![
                process(
                    "achats",
                    "Achats",
                    &[
                        ("selection-fournisseurs", "Sélection des fournisseurs"),
                        ("passation-commandes", "Passation des commandes"),
                        ("reception-paiement", "Réception et paiement"),
                    ],
                ),
                process(
                    "commercial",
                    "Commercial",
                    &[
                        ("appels-offres", "Réponse aux appels d'offres"),
                        ("intermediaires", "Gestion des intermédiaires"),
                    ],
                ),
                process(
                    "rh",
                    "Ressources humaines",
                    &[
                        ("recrutement", "Recrutement"),
                        ("remuneration", "Rémunération variable"),
                    ],
                ),
                process(
                    "finance",
                    "Finance",
                    &[
                        ("tresorerie", "Trésorerie"),
                        ("notes-de-frais", "Notes de frais"),
                    ],
                ),
                process(
                    "direction",
                    "Direction générale",
                    &[
                        ("mecenat", "Mécénat et sponsoring"),
                        ("cadeaux", "Cadeaux et invitations"),
                    ],
                ),
            ],
            corruption_types: entries(&[
                ("corruption-active", "Corruption active"),
                ("corruption-passive", "Corruption passive"),
                ("trafic-influence", "Trafic d'influence"),
                ("conflit-interets", "Conflit d'intérêts"),
                ("favoritisme", "Favoritisme"),
            ]),
            tiers: entries(&[
                ("fournisseurs", "Fournisseurs"),
                ("clients", "Clients"),
                ("intermediaires", "Intermédiaires"),
                ("agents-publics", "Agents publics"),
                ("partenaires", "Partenaires"),
            ]),
            statuses: entries(&[
                ("brouillon", "Brouillon"),
                ("a-valider", "À valider"),
                ("valide", "Validé"),
                ("archive", "Archivé"),
            ]),
            validated_status: "valide".to_string(),
            control_types: entries(&[
                ("preventif", "Préventif"),
                ("detectif", "Détectif"),
                ("correctif", "Correctif"),
                ("directif", "Directif"),
            ]),
            action_plan_statuses: entries(&[
                ("a-demarrer", "À démarrer"),
                ("en-cours", "En cours"),
                ("termine", "Terminé"),
                ("en-retard", "En retard"),
            ]),
        }
    }
}

fn entries(pairs: &[(&str, &str)]) -> Vec<Entry> {
    pairs.iter().map(|(v, l)| Entry::new(v, l)).collect()
}

fn process(value: &str, label: &str, subs: &[(&str, &str)]) -> Process {
    Process {
        value: value.to_string(),
        label: label.to_string(),
        sub_processes: entries(subs),
    }
}

impl Taxonomy {
    fn table(&self, kind: TaxonomyKind) -> Vec<&Entry> {
        match kind {
            TaxonomyKind::Process => Vec::new(),
            TaxonomyKind::CorruptionType => self.corruption_types.iter().collect(),
            TaxonomyKind::Tier => self.tiers.iter().collect(),
            TaxonomyKind::Status => self.statuses.iter().collect(),
            TaxonomyKind::ControlType => self.control_types.iter().collect(),
            TaxonomyKind::ActionPlanStatus => self.action_plan_statuses.iter().collect(),
        }
    }

    /// Ordered values of a table
    pub fn values(&self, kind: TaxonomyKind) -> Vec<&str> {
        match kind {
            TaxonomyKind::Process => self.processes.iter().map(|p| p.value.as_str()).collect(),
            _ => self.table(kind).into_iter().map(|e| e.value.as_str()).collect(),
        }
    }

    pub fn contains(&self, kind: TaxonomyKind, value: &str) -> bool {
        self.values(kind).contains(&value)
    }

    /// Label for a value, or the value itself when unknown
    pub fn label_of<'a>(&'a self, kind: TaxonomyKind, value: &'a str) -> &'a str {
        let found = match kind {
            TaxonomyKind::Process => self
                .processes
                .iter()
                .find(|p| p.value == value)
                .map(|p| p.label.as_str()),
            _ => self
                .table(kind)
                .into_iter()
                .find(|e| e.value == value)
                .map(|e| e.label.as_str()),
        };
        found.unwrap_or(value)
    }

    pub fn process(&self, value: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.value == value)
    }

    /// Whether `sub_process` belongs to `process`
    pub fn has_sub_process(&self, process: &str, sub_process: &str) -> bool {
        self.process(process)
            .map(|p| p.sub_processes.iter().any(|s| s.value == sub_process))
            .unwrap_or(false)
    }

    /// Initial lifecycle status for new risks
    pub fn initial_status(&self) -> &str {
        self.statuses
            .first()
            .map(|s| s.value.as_str())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_lookup_falls_back_to_value() {
        let t = Taxonomy::default();
        assert_eq!(t.label_of(TaxonomyKind::Status, "valide"), "Validé");
        assert_eq!(t.label_of(TaxonomyKind::Process, "achats"), "Achats");
        assert_eq!(t.label_of(TaxonomyKind::Tier, "inconnu"), "inconnu");
    }

    #[test]
    fn test_sub_process_membership() {
        let t = Taxonomy::default();
        assert!(t.has_sub_process("achats", "passation-commandes"));
        assert!(!t.has_sub_process("rh", "passation-commandes"));
        assert!(!t.has_sub_process("nope", "recrutement"));
    }

    #[test]
    fn test_lifecycle_order() {
        let t = Taxonomy::default();
        assert_eq!(
            t.values(TaxonomyKind::Status),
            vec!["brouillon", "a-valider", "valide", "archive"]
        );
        assert_eq!(t.initial_status(), "brouillon");
        assert!(t.contains(TaxonomyKind::Status, &t.validated_status));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let t: Taxonomy = serde_json::from_str(r#"{"validatedStatus": "approuve"}"#).unwrap();
        assert_eq!(t.validated_status, "approuve");
        assert_eq!(t.statuses.len(), 4);
    }
}
