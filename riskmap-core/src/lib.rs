//! Riskmap core library - corruption-risk scoring, normalization and matrix placement

// Global invariants enforced in this crate:
// - Scoring, normalization, placement and aggregation are pure
// - No global mutable state; the register is passed explicitly
// - No randomness, clocks, threads, or async
// - Deterministic traversal order must be explicit
// - Malformed input degrades to documented defaults instead of failing
// - Identical input yields byte-for-byte identical output

pub mod config;
pub mod dashboard;
pub mod factors;
pub mod matrix;
pub mod mitigation;
pub mod model;
pub mod normalize;
pub mod register;
pub mod report;
pub mod scoring;
pub mod severity;
pub mod store;
pub mod taxonomy;

pub use config::ResolvedConfig;
pub use dashboard::{summarize, DashboardSummary};
pub use matrix::{place_risks, MatrixGeometry, MatrixView, Placement};
pub use model::{Risk, RiskId};
pub use normalize::{normalize_risk, normalize_risks};
pub use register::{Register, RegisterDocument, RiskFilter};
pub use scoring::{NetInfo, ScoringModel};
pub use severity::Severity;
pub use store::Store;

/// Dashboard over a register's validated risks
pub fn dashboard(register: &Register) -> DashboardSummary {
    summarize(
        &register.validated_risks(),
        &register.controls,
        &register.action_plans,
        &register.taxonomy,
        register.model(),
    )
}

/// Placements for the risks matching `filter`, in register order
pub fn matrix(
    register: &Register,
    filter: &RiskFilter,
    view: MatrixView,
    geometry: &MatrixGeometry,
) -> Vec<Placement> {
    let risks = register.filter(filter);
    place_risks(&risks, view, register.model(), geometry)
}
