//! Dashboard KPIs
//!
//! Computes derived indicators from the validated risks and the register's
//! controls and action plans.
//!
//! Global invariants enforced:
//! - KPIs are strictly derived (never stored, always computed)
//! - Distributions use largest-remainder rounding and sum to exactly 100
//! - Deterministic ordering (taxonomy order, then unknown keys ascending)

use crate::model::{ActionPlan, Control, Risk};
use crate::scoring::{self, ScoringModel};
use crate::severity::{Severity, MAX_SCORE};
use crate::taxonomy::{Entry, Taxonomy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count of risks per severity bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SeverityCounts {
    pub faible: usize,
    pub modere: usize,
    pub fort: usize,
    pub critique: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Faible => self.faible += 1,
            Severity::Modere => self.modere += 1,
            Severity::Fort => self.fort += 1,
            Severity::Critique => self.critique += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Faible => self.faible,
            Severity::Modere => self.modere,
            Severity::Fort => self.fort,
            Severity::Critique => self.critique,
        }
    }

    pub fn total(&self) -> usize {
        self.faible + self.modere + self.fort + self.critique
    }
}

/// One slice of a percentage distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DistributionEntry {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub percent: u32,
}

/// Dashboard summary over validated risks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DashboardSummary {
    pub risk_count: usize,
    /// Buckets of the brut score
    pub brut_severity: SeverityCounts,
    /// Buckets of the dashboard net score (brut x (1 - coefficient))
    pub net_severity: SeverityCounts,
    pub brut_total: f64,
    pub net_total: f64,
    /// 0-100, higher is better; 100 when there is nothing to mitigate
    pub global_score: u32,
    pub average_reduction: f64,
    pub mitigation_levels: Vec<DistributionEntry>,
    pub control_types: Vec<DistributionEntry>,
    pub action_plan_statuses: Vec<DistributionEntry>,
}

/// Integer percentages summing to exactly 100
///
/// Each share is floored, then the leftover points go to the largest
/// fractional remainders; ties go to the larger count, then to the earlier
/// entry. An all-zero input yields all zeros.
pub fn largest_remainder_percentages(counts: &[usize]) -> Vec<u32> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0; counts.len()];
    }

    let mut percents: Vec<u32> = Vec::with_capacity(counts.len());
    let mut remainders: Vec<(usize, usize, usize)> = Vec::with_capacity(counts.len());
    for (index, &count) in counts.iter().enumerate() {
        let scaled = count * 100;
        percents.push((scaled / total) as u32);
        remainders.push((scaled % total, count, index));
    }

    let assigned: u32 = percents.iter().sum();
    let leftover = 100u32.saturating_sub(assigned) as usize;

    remainders.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    for &(_, _, index) in remainders.iter().take(leftover) {
        percents[index] += 1;
    }

    percents
}

/// Group keys by count, ordered by the reference table then unknown keys
fn distribution<'a>(keys: impl Iterator<Item = &'a str>, reference: &[Entry]) -> Vec<DistributionEntry> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut ordered: Vec<(String, String, usize)> = Vec::new();
    for entry in reference {
        if let Some(count) = counts.remove(entry.value.as_str()) {
            ordered.push((entry.value.clone(), entry.label.clone(), count));
        }
    }
    for (key, count) in counts {
        let label = if key.is_empty() { "Non renseigné" } else { key };
        ordered.push((key.to_string(), label.to_string(), count));
    }

    let raw: Vec<usize> = ordered.iter().map(|(_, _, c)| *c).collect();
    let percents = largest_remainder_percentages(&raw);

    ordered
        .into_iter()
        .zip(percents)
        .map(|((key, label, count), percent)| DistributionEntry {
            key,
            label,
            count,
            percent,
        })
        .collect()
}

/// `100 * (1 - net / potential)`, clamped; no potential means 100
pub fn global_score(net_total: f64, risk_count: usize) -> u32 {
    let potential = risk_count as f64 * MAX_SCORE;
    let normalized = if potential > 0.0 {
        (1.0 - net_total / potential).clamp(0.0, 1.0)
    } else {
        1.0
    };
    (normalized * 100.0).round() as u32
}

/// Compute the dashboard from already-filtered (validated, normalized) risks
pub fn summarize(
    risks: &[Risk],
    controls: &[Control],
    action_plans: &[ActionPlan],
    taxonomy: &Taxonomy,
    model: &ScoringModel,
) -> DashboardSummary {
    let mut brut_severity = SeverityCounts::default();
    let mut net_severity = SeverityCounts::default();
    let mut brut_total = 0.0;
    let mut net_total = 0.0;

    for risk in risks {
        let info = scoring::risk_net_info(risk, model);
        brut_severity.add(scoring::risk_severity_from_score(info.brut_score, model));
        net_severity.add(scoring::risk_severity_from_score(info.score, model));
        brut_total += info.brut_score;
        net_total += info.score;
    }

    let risk_count = risks.len();
    let average_reduction = if risk_count > 0 {
        (brut_total - net_total) / risk_count as f64
    } else {
        0.0
    };

    let level_reference: Vec<Entry> = model
        .mitigation
        .levels()
        .iter()
        .map(|l| Entry::new(&l.value, &l.label))
        .collect();
    let mitigation_levels = distribution(
        risks
            .iter()
            .map(|r| scoring::risk_mitigation_effectiveness(r, model).value.as_str()),
        &level_reference,
    );

    DashboardSummary {
        risk_count,
        brut_severity,
        net_severity,
        brut_total,
        net_total,
        global_score: global_score(net_total, risk_count),
        average_reduction,
        mitigation_levels,
        control_types: distribution(
            controls.iter().map(|c| c.control_type.as_str()),
            &taxonomy.control_types,
        ),
        action_plan_statuses: distribution(
            action_plans.iter().map(|a| a.status.as_str()),
            &taxonomy.action_plan_statuses,
        ),
    }
}
