//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::dashboard::{DashboardSummary, DistributionEntry};
use crate::matrix::{self, MatrixView, Placement};
use crate::model::{Risk, RiskId};
use crate::register::{Issue, IssueLevel};
use crate::scoring::{self, ScoringModel};
use crate::severity::{Severity, AXIS_SIZE};
use serde::{Deserialize, Serialize};

/// Score line for one risk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ScoreRow {
    pub id: RiskId,
    pub process: String,
    pub brut_score: f64,
    pub severity: Severity,
    pub aggravating_coefficient: f64,
    pub effective_probability: f64,
    pub effectiveness: String,
    pub net_score: f64,
    pub net_severity: Severity,
    pub reduction: u32,
    pub cell_net_score: f64,
}

impl ScoreRow {
    pub fn new(risk: &Risk, model: &ScoringModel) -> Self {
        let info = scoring::risk_net_info(risk, model);
        ScoreRow {
            id: risk.id.clone(),
            process: risk.process.clone(),
            brut_score: info.brut_score,
            severity: scoring::risk_severity_from_score(info.brut_score, model),
            aggravating_coefficient: scoring::risk_aggravating_coefficient(risk, model),
            effective_probability: scoring::risk_effective_brut_probability(risk, model),
            effectiveness: info.effectiveness,
            net_score: info.score,
            net_severity: scoring::risk_severity_from_score(info.score, model),
            reduction: info.reduction,
            cell_net_score: scoring::risk_net_score(risk),
        }
    }
}

pub fn score_rows(risks: &[Risk], model: &ScoringModel) -> Vec<ScoreRow> {
    risks.iter().map(|r| ScoreRow::new(r, model)).collect()
}

/// Sort rows deterministically
pub fn sort_rows(mut rows: Vec<ScoreRow>) -> Vec<ScoreRow> {
    rows.sort_by(|a, b| {
        // 1. Net score descending
        b.net_score
            .partial_cmp(&a.net_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            // 2. Brut score descending
            .then_with(|| {
                b.brut_score
                    .partial_cmp(&a.brut_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            // 3. Id ascending
            .then_with(|| a.id.cmp(&b.id))
    });
    rows
}

/// Render score rows as text output
pub fn render_scores_text(rows: &[ScoreRow]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<8} {:<16} {:<6} {:<9} {:<6} {:<12} {:<6} {:<9} {}\n",
        "ID", "PROCESS", "BRUT", "SEVERITY", "COEF", "MITIGATION", "NET", "NET SEV", "REDUCTION"
    ));
    for row in rows {
        output.push_str(&format!(
            "{:<8} {:<16} {:<6} {:<9} {:<6} {:<12} {:<6} {:<9} {}%\n",
            truncate_or_pad(&row.id.to_string(), 8),
            truncate_or_pad(&row.process, 16),
            format!("{:.2}", row.brut_score),
            row.severity.as_str(),
            format!("{:.2}", row.aggravating_coefficient),
            truncate_or_pad(&row.effectiveness, 12),
            format!("{:.2}", row.net_score),
            row.net_severity.as_str(),
            row.reduction,
        ));
    }
    output
}

/// Render any serializable report as pretty JSON
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Render the occupied grid followed by one line per marker
pub fn render_matrix_text(placements: &[Placement], view: MatrixView) -> String {
    let counts = matrix::cell_counts(placements);
    let mut output = String::new();
    output.push_str(&format!(
        "{} matrix ({} risk(s))\n",
        view.as_str(),
        placements.len()
    ));

    let (column_axis, row_axis) = match view {
        MatrixView::Brut => ("probability", "impact"),
        MatrixView::Net => ("effectiveness", "severity"),
    };
    output.push_str(&format!("rows: {}, columns: {}\n", row_axis, column_axis));

    // Highest row first in both views
    for row in (1..=AXIS_SIZE).rev() {
        output.push_str(&format!("{:>2} |", row));
        for column in 1..=AXIS_SIZE {
            let count = counts
                .get(&matrix::CellKey { column, row })
                .copied()
                .unwrap_or(0);
            if count == 0 {
                output.push_str("   .");
            } else {
                output.push_str(&format!("{:>4}", count));
            }
        }
        output.push('\n');
    }
    output.push_str("    ");
    for column in 1..=AXIS_SIZE {
        output.push_str(&format!("{:>4}", column));
    }
    output.push('\n');

    if !placements.is_empty() {
        output.push('\n');
        output.push_str(&format!(
            "{:<8} {:<6} {:<8} {:<8} {}\n",
            "ID", "CELL", "X%", "Y%", "OFFSET"
        ));
        for p in placements {
            output.push_str(&format!(
                "{:<8} {:<6} {:<8} {:<8} ({:+.1}, {:+.1})\n",
                truncate_or_pad(&p.risk_id.to_string(), 8),
                p.cell.to_string(),
                format!("{:.1}", p.x_percent),
                format!("{:.1}", p.y_percent),
                p.offset_x,
                p.offset_y,
            ));
        }
    }

    output
}

fn render_distribution(title: &str, entries: &[DistributionEntry], output: &mut String) {
    output.push_str(&format!("{}:\n", title));
    if entries.is_empty() {
        output.push_str("  (none)\n");
        return;
    }
    for e in entries {
        output.push_str(&format!(
            "  {:<24} {:>4} {:>4}%\n",
            truncate_or_pad(&e.label, 24),
            e.count,
            e.percent
        ));
    }
}

/// Render the dashboard summary as text
pub fn render_dashboard_text(summary: &DashboardSummary) -> String {
    let mut output = String::new();
    output.push_str(&format!("Validated risks:    {}\n", summary.risk_count));
    output.push_str(&format!("Global score:       {}/100\n", summary.global_score));
    output.push_str(&format!(
        "Brut total:         {:.2}\nNet total:          {:.2}\n",
        summary.brut_total, summary.net_total
    ));
    output.push_str(&format!(
        "Average reduction:  {:.2}\n\n",
        summary.average_reduction
    ));

    output.push_str(&format!("{:<10} {:>6} {:>6}\n", "SEVERITY", "BRUT", "NET"));
    for severity in Severity::ALL.iter().rev() {
        output.push_str(&format!(
            "{:<10} {:>6} {:>6}\n",
            severity.label(),
            summary.brut_severity.get(*severity),
            summary.net_severity.get(*severity)
        ));
    }
    output.push('\n');

    render_distribution("Mitigation levels", &summary.mitigation_levels, &mut output);
    render_distribution("Control types", &summary.control_types, &mut output);
    render_distribution(
        "Action plan statuses",
        &summary.action_plan_statuses,
        &mut output,
    );
    output
}

/// Render register diagnostics as text
pub fn render_issues_text(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "No issues found\n".to_string();
    }
    let mut output = String::new();
    for issue in issues {
        let level = match issue.level {
            IssueLevel::Error => "error",
            IssueLevel::Warning => "warning",
        };
        let subject = issue
            .risk_id
            .as_ref()
            .map(|id| format!("risk {}", id))
            .unwrap_or_else(|| "register".to_string());
        output.push_str(&format!("{}: {}: {}\n", level, subject, issue.message));
    }
    output
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
