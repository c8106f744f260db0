//! Risk matrix placement
//!
//! Buckets risks into a 4x4 grid and spreads markers that share a cell.
//!
//! Global invariants enforced:
//! - Placement is a pure function of the input order
//! - Markers sharing a cell never get identical offsets
//! - Cells are 25% of each axis; markers sit around the cell centre

use crate::model::{Risk, RiskId};
use crate::scoring::{self, ScoringModel};
use crate::severity::{clamp_to_axis, AXIS_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Which grid to place risks on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixView {
    /// Effective probability x brut impact
    Brut,
    /// Brut severity x mitigation effectiveness
    Net,
}

impl MatrixView {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixView::Brut => "brut",
            MatrixView::Net => "net",
        }
    }

    /// Edge `y_percent` is measured from
    ///
    /// The brut grid grows upward (impact 4 at the top), the net grid lists
    /// severities from the top down (critique first).
    pub fn vertical_origin(&self) -> &'static str {
        match self {
            MatrixView::Brut => "bottom",
            MatrixView::Net => "top",
        }
    }
}

/// Marker size used to spread same-cell risks, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixGeometry {
    pub marker_diameter: f64,
    pub margin: f64,
}

impl Default for MatrixGeometry {
    fn default() -> Self {
        MatrixGeometry {
            marker_diameter: 26.0,
            margin: 4.0,
        }
    }
}

impl MatrixGeometry {
    pub fn spacing(&self) -> f64 {
        self.marker_diameter + self.margin
    }
}

/// Grid cell, both coordinates 1..=4
///
/// Brut view: column = probability bucket, row = impact bucket.
/// Net view: column = effectiveness position, row = severity position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub column: u8,
    pub row: u8,
}

impl std::fmt::Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.column, self.row)
    }
}

/// Position of one risk marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Placement {
    pub risk_id: RiskId,
    pub cell: CellKey,
    pub x_percent: f64,
    pub y_percent: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

/// Cell a risk falls into for the given view
pub fn cell_for(risk: &Risk, view: MatrixView, model: &ScoringModel) -> CellKey {
    match view {
        MatrixView::Brut => {
            let prob = scoring::risk_effective_brut_probability(risk, model);
            CellKey {
                column: clamp_to_axis(prob.round()),
                row: clamp_to_axis(risk.impact_brut.round()),
            }
        }
        MatrixView::Net => {
            let severity = scoring::risk_brut_severity(risk, model);
            let level = scoring::risk_mitigation_effectiveness(risk, model);
            let effectiveness = model.mitigation.index_of(&level.value);
            CellKey {
                column: clamp_to_axis((effectiveness + 1) as f64),
                row: clamp_to_axis((severity.index() + 1) as f64),
            }
        }
    }
}

/// Centre of a cell in percent of the grid
fn cell_centre(cell: CellKey, view: MatrixView) -> (f64, f64) {
    let axis = f64::from(AXIS_SIZE);
    let column = f64::from(cell.column);
    let row = f64::from(cell.row);
    match view {
        MatrixView::Brut => (
            ((column - 0.5) / axis) * 100.0,
            ((row - 0.5) / axis) * 100.0,
        ),
        MatrixView::Net => {
            let effectiveness_index = column - 1.0;
            let severity_index = row - 1.0;
            (
                ((effectiveness_index + 0.5) / axis) * 100.0,
                ((axis - severity_index - 0.5) / axis) * 100.0,
            )
        }
    }
}

/// Side of the square arrangement holding `count` markers
pub fn grid_size(count: usize) -> usize {
    let mut size = 1;
    while size * size < count {
        size += 1;
    }
    size
}

/// Pixel offset of the `index`-th marker in a square of side `size`
fn spread_offset(index: usize, size: usize, spacing: f64) -> (f64, f64) {
    let row = (index / size) as f64;
    let col = (index % size) as f64;
    let centre = (size as f64 - 1.0) / 2.0;
    ((col - centre) * spacing, (row - centre) * spacing)
}

/// Place risks on the grid
///
/// Risks are processed in input order. Each cell's arrangement is sized by
/// the number of risks that land in it, so every marker in a cell shares
/// the same square and gets a distinct slot by arrival index.
pub fn place_risks(
    risks: &[Risk],
    view: MatrixView,
    model: &ScoringModel,
    geometry: &MatrixGeometry,
) -> Vec<Placement> {
    let cells: Vec<CellKey> = risks.iter().map(|r| cell_for(r, view, model)).collect();

    let mut totals: HashMap<CellKey, usize> = HashMap::new();
    for cell in &cells {
        *totals.entry(*cell).or_insert(0) += 1;
    }

    let mut arrivals: HashMap<CellKey, usize> = HashMap::new();
    let placements: Vec<Placement> = risks
        .iter()
        .zip(cells)
        .map(|(risk, cell)| {
            let index = arrivals.entry(cell).or_insert(0);
            let size = grid_size(totals.get(&cell).copied().unwrap_or(1));
            let (offset_x, offset_y) = spread_offset(*index, size, geometry.spacing());
            *index += 1;

            let (x_percent, y_percent) = cell_centre(cell, view);
            Placement {
                risk_id: risk.id.clone(),
                cell,
                x_percent,
                y_percent,
                offset_x,
                offset_y,
            }
        })
        .collect();

    tracing::debug!(
        "placed {} risk(s) on the {} matrix across {} cell(s)",
        placements.len(),
        view.as_str(),
        totals.len()
    );

    placements
}

/// Number of risks per occupied cell, in cell order
pub fn cell_counts(placements: &[Placement]) -> BTreeMap<CellKey, usize> {
    let mut counts = BTreeMap::new();
    for p in placements {
        *counts.entry(p.cell).or_insert(0) += 1;
    }
    counts
}
