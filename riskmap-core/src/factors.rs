//! Aggravating factors
//!
//! Two fixed groups of conditions that raise the effective probability of a
//! risk. Each group carries a coefficient; a risk takes the highest
//! coefficient among the groups it has at least one factor in.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Selected aggravating factor keys, by group
///
/// Sets keep entries unique and make ordering irrelevant. Unknown keys are
/// kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggravatingFactors {
    pub group1: BTreeSet<String>,
    pub group2: BTreeSet<String>,
}

impl AggravatingFactors {
    /// Build from arbitrary JSON
    ///
    /// Accepts `{"group1": [...], "group2": [...]}` where each group may also be
    /// a single string. Anything else, including non-string entries, is dropped.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => AggravatingFactors {
                group1: collect_keys(map.get("group1")),
                group2: collect_keys(map.get("group2")),
            },
            _ => AggravatingFactors::default(),
        }
    }

    /// Drop blank entries and trim whitespace
    pub fn normalized(&self) -> Self {
        AggravatingFactors {
            group1: clean_set(self.group1.iter().map(String::as_str)),
            group2: clean_set(self.group2.iter().map(String::as_str)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group1.is_empty() && self.group2.is_empty()
    }

    pub fn len(&self) -> usize {
        self.group1.len() + self.group2.len()
    }
}

impl<'de> Deserialize<'de> for AggravatingFactors {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(AggravatingFactors::from_value(&value))
    }
}

fn collect_keys(value: Option<&Value>) -> BTreeSet<String> {
    match value {
        Some(Value::Array(items)) => clean_set(items.iter().filter_map(Value::as_str)),
        Some(Value::String(single)) => clean_set(std::iter::once(single.as_str())),
        _ => BTreeSet::new(),
    }
}

fn clean_set<'a>(keys: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    keys.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// A selectable factor within a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactorDefinition {
    pub key: String,
    pub label: String,
}

/// One aggravating group: its coefficient and the factors it offers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorGroup {
    pub label: String,
    pub coefficient: f64,
    pub factors: Vec<FactorDefinition>,
}

impl FactorGroup {
    pub fn contains(&self, key: &str) -> bool {
        self.factors.iter().any(|f| f.key == key)
    }
}

/// Definitions of both groups
///
/// group1 is the critical group; its coefficient is expected to be at least
/// the group2 coefficient (checked by config validation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggravatingGroups {
    pub group1: FactorGroup,
    pub group2: FactorGroup,
}

impl Default for AggravatingGroups {
    fn default() -> Self {
        AggravatingGroups {
            group1: FactorGroup {
                label: "Facteurs critiques".to_string(),
                coefficient: 1.4,
                factors: vec![
                    factor("agent-public", "Implique un agent public"),
                    factor("pays-sensible", "Pays à risque élevé de corruption"),
                    factor("intermediaire", "Recours à un intermédiaire non identifié"),
                    factor("paiement-especes", "Paiement en espèces ou vers un compte tiers"),
                ],
            },
            group2: FactorGroup {
                label: "Facteurs majeurs".to_string(),
                coefficient: 1.2,
                factors: vec![
                    factor("montant-eleve", "Montant financier élevé"),
                    factor("urgence", "Contexte d'urgence ou de dérogation"),
                    factor("incident-passe", "Incident similaire déjà constaté"),
                    factor("faible-tracabilite", "Faible traçabilité des décisions"),
                ],
            },
        }
    }
}

fn factor(key: &str, label: &str) -> FactorDefinition {
    FactorDefinition {
        key: key.to_string(),
        label: label.to_string(),
    }
}

impl AggravatingGroups {
    /// Combined coefficient for a selection
    ///
    /// The highest coefficient among non-empty groups wins; coefficients are
    /// never multiplied or summed. No selection yields 1.
    pub fn coefficient_for(&self, selected: &AggravatingFactors) -> f64 {
        let mut coefficient: f64 = 1.0;
        if !selected.group1.is_empty() {
            coefficient = coefficient.max(self.group1.coefficient);
        }
        if !selected.group2.is_empty() {
            coefficient = coefficient.max(self.group2.coefficient);
        }
        coefficient
    }

    /// Label for a factor key, searching both groups
    pub fn label_of(&self, key: &str) -> Option<&str> {
        self.group1
            .factors
            .iter()
            .chain(self.group2.factors.iter())
            .find(|f| f.key == key)
            .map(|f| f.label.as_str())
    }

    /// Selected keys that neither group defines
    pub fn unknown_keys<'a>(&self, selected: &'a AggravatingFactors) -> Vec<&'a str> {
        selected
            .group1
            .iter()
            .filter(|k| !self.group1.contains(k))
            .chain(selected.group2.iter().filter(|k| !self.group2.contains(k)))
            .map(String::as_str)
            .collect()
    }
}
