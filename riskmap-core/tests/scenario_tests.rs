//! End-to-end scenarios over the sample register

use riskmap_core::factors::AggravatingFactors;
use riskmap_core::matrix::CellKey;
use riskmap_core::scoring::{self, ScoringModel};
use riskmap_core::{
    dashboard, matrix, normalize_risk, MatrixGeometry, MatrixView, Register, RegisterDocument,
    Risk, RiskFilter, RiskId, Severity,
};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join("registers")
        .join(name)
}

fn sample_register() -> Register {
    let json = std::fs::read_to_string(fixture_path("sample.json")).unwrap();
    let doc = RegisterDocument::from_json(&json).unwrap();
    Register::from_document(doc, ScoringModel::default())
}

#[test]
fn test_unaggravated_critical_risk() {
    let model = ScoringModel::default();
    let raw = Risk {
        aggravating_factors: AggravatingFactors::default(),
        ..Risk::new(1, 3.0, 4.0)
    };
    let risk = normalize_risk(&raw, &model);
    assert_eq!(risk.aggravating_coefficient, Some(1.0));
    assert_eq!(scoring::risk_brut_score(&risk), 12.0);
    assert_eq!(scoring::risk_brut_severity(&risk, &model), Severity::Critique);
}

#[test]
fn test_efficace_mitigation() {
    let model = ScoringModel::default();
    let raw = Risk {
        mitigation_effectiveness: Some("efficace".to_string()),
        ..Risk::new(1, 3.0, 4.0)
    };
    let risk = normalize_risk(&raw, &model);
    assert_eq!(risk.prob_net, Some(4));
    let info = scoring::risk_net_info(&risk, &model);
    assert_eq!(info.coefficient, 0.75);
    assert_eq!(info.score, 3.0);
}

#[test]
fn test_both_groups_take_the_max() {
    let model = ScoringModel::default();
    let mut raw = Risk::new(1, 2.0, 2.0);
    raw.aggravating_factors.group1.insert("agent-public".to_string());
    raw.aggravating_factors.group2.insert("montant-eleve".to_string());
    let risk = normalize_risk(&raw, &model);
    assert_eq!(risk.aggravating_coefficient, Some(1.4));
}

#[test]
fn test_same_cell_risks_spread_by_arrival() {
    let model = ScoringModel::default();
    let geometry = MatrixGeometry::default();
    let spacing = geometry.spacing();

    let one = riskmap_core::place_risks(
        &[Risk::new(1, 3.0, 4.0)],
        MatrixView::Brut,
        &model,
        &geometry,
    );
    assert_eq!(one[0].cell, CellKey { column: 3, row: 4 });
    assert_eq!((one[0].offset_x, one[0].offset_y), (0.0, 0.0));

    let three: Vec<Risk> = (1..=3).map(|id| Risk::new(id, 3.0, 4.0)).collect();
    let placed = riskmap_core::place_risks(&three, MatrixView::Brut, &model, &geometry);
    let half = spacing / 2.0;
    assert_eq!((placed[0].offset_x, placed[0].offset_y), (-half, -half));
    assert_eq!((placed[1].offset_x, placed[1].offset_y), (half, -half));
    assert_eq!((placed[2].offset_x, placed[2].offset_y), (-half, half));
    assert!(placed.iter().all(|p| p.x_percent == 62.5 && p.y_percent == 87.5));
}

#[test]
fn test_empty_register_dashboard_is_100() {
    let register = Register::from_document(RegisterDocument::default(), ScoringModel::default());
    let summary = dashboard(&register);
    assert_eq!(summary.global_score, 100);
    assert_eq!(summary.risk_count, 0);
}

#[test]
fn test_sample_register_normalization() {
    let register = sample_register();
    assert_eq!(register.risks().len(), 5);

    let aggravated = register.risk(&RiskId::Int(2)).unwrap();
    assert_eq!(aggravated.prob_brut, 2.0);
    assert_eq!(aggravated.aggravating_coefficient, Some(1.4));
    assert_eq!(aggravated.prob_net, Some(2));
    assert_eq!(aggravated.impact_net, Some(3));

    let unknown_level = register.risk(&RiskId::Int(4)).unwrap();
    assert_eq!(
        unknown_level.mitigation_effectiveness.as_deref(),
        Some("insuffisant")
    );

    // stored coefficient survives although no factor is selected
    let floored = register.risk(&RiskId::Int(5)).unwrap();
    assert_eq!(floored.aggravating_coefficient, Some(1.3));
    assert_eq!(
        floored.extra.get("responsable").and_then(|v| v.as_str()),
        Some("Direction achats")
    );
}

#[test]
fn test_sample_register_dashboard() {
    let summary = dashboard(&sample_register());
    assert_eq!(summary.risk_count, 4);
    assert_eq!(summary.brut_total, 34.0);
    assert_eq!(summary.net_total, 22.5);
    assert_eq!(summary.average_reduction, 2.875);
    assert_eq!(summary.global_score, 65);

    assert_eq!(summary.brut_severity.critique, 2);
    assert_eq!(summary.brut_severity.fort, 1);
    assert_eq!(summary.brut_severity.faible, 1);
    assert_eq!(summary.net_severity.total(), 4);
    assert_eq!(summary.net_severity.critique, 1);

    let controls: Vec<(&str, u32)> = summary
        .control_types
        .iter()
        .map(|e| (e.key.as_str(), e.percent))
        .collect();
    assert_eq!(
        controls,
        vec![("preventif", 50), ("detectif", 25), ("directif", 25)]
    );

    let plans: Vec<u32> = summary.action_plan_statuses.iter().map(|e| e.percent).collect();
    assert_eq!(plans, vec![34, 33, 33]);

    let levels: Vec<(&str, usize)> = summary
        .mitigation_levels
        .iter()
        .map(|e| (e.key.as_str(), e.count))
        .collect();
    assert_eq!(
        levels,
        vec![("inefficace", 1), ("insuffisant", 2), ("efficace", 1)]
    );
}

#[test]
fn test_sample_register_brut_matrix() {
    let register = sample_register();
    let placements = matrix(
        &register,
        &RiskFilter::default(),
        MatrixView::Brut,
        &MatrixGeometry::default(),
    );
    let cells: Vec<String> = placements.iter().map(|p| p.cell.to_string()).collect();
    assert_eq!(cells, vec!["3-4", "3-4", "2-2", "1-2", "4-4"]);
    assert_eq!((placements[0].offset_x, placements[0].offset_y), (-15.0, -15.0));
    assert_eq!((placements[1].offset_x, placements[1].offset_y), (15.0, -15.0));
    assert_eq!((placements[4].offset_x, placements[4].offset_y), (0.0, 0.0));
}

#[test]
fn test_sample_register_net_matrix_filtered() {
    let register = sample_register();
    let filter = RiskFilter {
        process: Some("achats".to_string()),
        ..RiskFilter::default()
    };
    let placements = matrix(&register, &filter, MatrixView::Net, &MatrixGeometry::default());
    assert_eq!(placements.len(), 2);
    assert_eq!(placements[0].cell, CellKey { column: 4, row: 4 });
    assert_eq!(placements[1].cell, CellKey { column: 1, row: 4 });
    assert_eq!(placements[1].x_percent, 12.5);
    assert_eq!(placements[1].y_percent, 12.5);
}

#[test]
fn test_two_net_conventions_stay_distinct() {
    let register = sample_register();
    let model = register.model();
    let risk = register.risk(&RiskId::Int(1)).unwrap();
    // cell convention: probNet 4 x impactNet 4
    assert_eq!(scoring::risk_net_score(risk), 16.0);
    // dashboard convention: 12 x (1 - 0.75)
    assert_eq!(scoring::risk_net_info(risk, model).score, 3.0);
}
