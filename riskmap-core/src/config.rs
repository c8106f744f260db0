//! Configuration file support for riskmap
//!
//! Loads scoring overrides from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.riskmaprc.json` in the working root
//! 3. `riskmap.config.json` in the working root
//!
//! All fields are optional. Anything left out keeps the built-in scale.

use crate::factors::{AggravatingGroups, FactorDefinition, FactorGroup};
use crate::matrix::MatrixGeometry;
use crate::mitigation::{MitigationLevel, MitigationScale, DEFAULT_MITIGATION_LEVEL};
use crate::scoring::ScoringModel;
use crate::severity::{NetImpactReferences, SeverityThresholds, AXIS_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level keys accepted in a config file
const CONFIG_SECTIONS: [&str; 5] = ["thresholds", "aggravating", "mitigation", "net_impact", "matrix"];

/// Riskmap configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskmapConfig {
    /// Severity bucket lower bounds
    #[serde(default)]
    pub thresholds: Option<ThresholdConfig>,

    /// Aggravating factor groups
    #[serde(default)]
    pub aggravating: Option<AggravatingConfig>,

    /// Mitigation effectiveness scale
    #[serde(default)]
    pub mitigation: Option<MitigationConfig>,

    /// Reference scores used to derive the net impact
    #[serde(default)]
    pub net_impact: Option<NetImpactConfig>,

    /// Marker geometry for matrix placement
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,
}

/// Custom severity thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Lower bound of `modere` (default: 3.0)
    pub modere: Option<f64>,
    /// Lower bound of `fort` (default: 6.0)
    pub fort: Option<f64>,
    /// Lower bound of `critique` (default: 12.0)
    pub critique: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggravatingConfig {
    pub group1: Option<GroupConfig>,
    pub group2: Option<GroupConfig>,
}

/// Overrides for one aggravating group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub label: Option<String>,
    pub coefficient: Option<f64>,
    pub factors: Option<Vec<FactorDefinition>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MitigationConfig {
    /// Ordered levels, weakest first (exactly four)
    pub levels: Option<Vec<MitigationLevel>>,
    /// Level assumed for risks without a valid one (default: "insuffisant")
    pub default_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetImpactConfig {
    pub faible: Option<f64>,
    pub modere: Option<f64>,
    pub fort: Option<f64>,
    pub critique: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// Marker diameter in pixels (default: 26)
    pub marker_diameter: Option<f64>,
    /// Gap between markers in pixels (default: 4)
    pub margin: Option<f64>,
}

/// Resolved configuration ready for scoring
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub scoring: ScoringModel,
    pub geometry: MatrixGeometry,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

fn merge_group(base: &FactorGroup, overrides: Option<&GroupConfig>) -> FactorGroup {
    match overrides {
        Some(o) => FactorGroup {
            label: o.label.clone().unwrap_or_else(|| base.label.clone()),
            coefficient: o.coefficient.unwrap_or(base.coefficient),
            factors: o.factors.clone().unwrap_or_else(|| base.factors.clone()),
        },
        None => base.clone(),
    }
}

impl RiskmapConfig {
    fn thresholds(&self) -> SeverityThresholds {
        let d = SeverityThresholds::default();
        match &self.thresholds {
            Some(t) => SeverityThresholds {
                modere: t.modere.unwrap_or(d.modere),
                fort: t.fort.unwrap_or(d.fort),
                critique: t.critique.unwrap_or(d.critique),
            },
            None => d,
        }
    }

    fn aggravating_groups(&self) -> AggravatingGroups {
        let d = AggravatingGroups::default();
        match &self.aggravating {
            Some(a) => AggravatingGroups {
                group1: merge_group(&d.group1, a.group1.as_ref()),
                group2: merge_group(&d.group2, a.group2.as_ref()),
            },
            None => d,
        }
    }

    fn mitigation_parts(&self) -> (Vec<MitigationLevel>, String) {
        let levels = self
            .mitigation
            .as_ref()
            .and_then(|m| m.levels.clone())
            .unwrap_or_else(|| MitigationScale::default().levels().to_vec());
        let default_level = self
            .mitigation
            .as_ref()
            .and_then(|m| m.default_level.clone())
            .unwrap_or_else(|| DEFAULT_MITIGATION_LEVEL.to_string());
        (levels, default_level)
    }

    fn net_impact(&self) -> NetImpactReferences {
        let d = NetImpactReferences::default();
        match &self.net_impact {
            Some(n) => NetImpactReferences {
                faible: n.faible.unwrap_or(d.faible),
                modere: n.modere.unwrap_or(d.modere),
                fort: n.fort.unwrap_or(d.fort),
                critique: n.critique.unwrap_or(d.critique),
            },
            None => d,
        }
    }

    fn geometry(&self) -> MatrixGeometry {
        let d = MatrixGeometry::default();
        match &self.matrix {
            Some(m) => MatrixGeometry {
                marker_diameter: m.marker_diameter.unwrap_or(d.marker_diameter),
                margin: m.margin.unwrap_or(d.margin),
            },
            None => d,
        }
    }

    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        // Thresholds positive and ordered
        let t = self.thresholds();
        for (name, v) in [("modere", t.modere), ("fort", t.fort), ("critique", t.critique)] {
            if !(v.is_finite() && v > 0.0) {
                anyhow::bail!("thresholds.{} must be positive (got {})", name, v);
            }
        }
        if t.modere >= t.fort {
            anyhow::bail!(
                "thresholds.modere ({}) must be less than thresholds.fort ({})",
                t.modere,
                t.fort
            );
        }
        if t.fort >= t.critique {
            anyhow::bail!(
                "thresholds.fort ({}) must be less than thresholds.critique ({})",
                t.fort,
                t.critique
            );
        }

        // Group coefficients >= 1, critical group dominates
        let groups = self.aggravating_groups();
        for (name, group) in [("group1", &groups.group1), ("group2", &groups.group2)] {
            let c = group.coefficient;
            if !(c.is_finite() && c >= 1.0) {
                anyhow::bail!("aggravating.{}.coefficient must be at least 1 (got {})", name, c);
            }
            let mut seen = std::collections::HashSet::new();
            for f in &group.factors {
                if f.key.trim().is_empty() {
                    anyhow::bail!("aggravating.{} has a factor with an empty key", name);
                }
                if !seen.insert(f.key.as_str()) {
                    anyhow::bail!("aggravating.{} lists factor '{}' twice", name, f.key);
                }
            }
        }
        if groups.group1.coefficient < groups.group2.coefficient {
            anyhow::bail!(
                "aggravating.group1.coefficient ({}) must be at least aggravating.group2.coefficient ({})",
                groups.group1.coefficient,
                groups.group2.coefficient
            );
        }

        // Mitigation scale: four unique levels, coefficients in [0, 1), non-decreasing
        let (levels, default_level) = self.mitigation_parts();
        if levels.len() != usize::from(AXIS_SIZE) {
            anyhow::bail!(
                "mitigation.levels must list exactly {} levels (got {})",
                AXIS_SIZE,
                levels.len()
            );
        }
        let mut previous = f64::NEG_INFINITY;
        for (i, level) in levels.iter().enumerate() {
            if level.value.trim().is_empty() {
                anyhow::bail!("mitigation.levels[{}] has an empty value", i);
            }
            if levels[..i].iter().any(|l| l.value == level.value) {
                anyhow::bail!("mitigation level '{}' is listed twice", level.value);
            }
            let c = level.coefficient;
            if !(c.is_finite() && (0.0..1.0).contains(&c)) {
                anyhow::bail!(
                    "mitigation level '{}' coefficient must be in [0, 1) (got {})",
                    level.value,
                    c
                );
            }
            if c < previous {
                anyhow::bail!(
                    "mitigation levels must be ordered by coefficient ('{}' has {} after {})",
                    level.value,
                    c,
                    previous
                );
            }
            previous = c;
        }
        if !levels.iter().any(|l| l.value == default_level) {
            anyhow::bail!(
                "mitigation.default_level '{}' is not one of the configured levels",
                default_level
            );
        }

        // Net impact references positive
        let n = self.net_impact();
        for (name, v) in [
            ("faible", n.faible),
            ("modere", n.modere),
            ("fort", n.fort),
            ("critique", n.critique),
        ] {
            if !(v.is_finite() && v > 0.0) {
                anyhow::bail!("net_impact.{} must be positive (got {})", name, v);
            }
        }

        // Marker geometry
        let g = self.geometry();
        if !(g.marker_diameter.is_finite() && g.marker_diameter > 0.0) {
            anyhow::bail!(
                "matrix.marker_diameter must be positive (got {})",
                g.marker_diameter
            );
        }
        if !(g.margin.is_finite() && g.margin >= 0.0) {
            anyhow::bail!("matrix.margin must be non-negative (got {})", g.margin);
        }

        Ok(())
    }

    /// Resolve config into the form the scoring functions read
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let (levels, default_level) = self.mitigation_parts();
        let mitigation = MitigationScale::new(levels, &default_level)?;

        Ok(ResolvedConfig {
            scoring: ScoringModel {
                thresholds: self.thresholds(),
                aggravating: self.aggravating_groups(),
                mitigation,
                net_impact: self.net_impact(),
            },
            geometry: self.geometry(),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        RiskmapConfig::default().resolve()
    }
}

/// Discover and load a config file from the working root
///
/// Search order:
/// 1. `.riskmaprc.json`
/// 2. `riskmap.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(root: &Path) -> Result<Option<(RiskmapConfig, PathBuf)>> {
    for name in [".riskmaprc.json", "riskmap.config.json"] {
        let path = root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
///
/// An empty file is rejected rather than read as defaults; `{}` is the
/// explicit "defaults" config.
pub fn load_config_file(path: &Path) -> Result<RiskmapConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read riskmap config {}", path.display()))?;
    if content.trim().is_empty() {
        anyhow::bail!(
            "riskmap config {} is empty (write {{}} to keep the defaults)",
            path.display()
        );
    }

    let config: RiskmapConfig = serde_json::from_str(&content).with_context(|| {
        format!(
            "{} is not a riskmap config (known sections: {})",
            path.display(),
            CONFIG_SECTIONS.join(", ")
        )
    })?;

    config
        .validate()
        .with_context(|| format!("invalid riskmap config {}", path.display()))?;

    tracing::debug!("loaded config {}", path.display());
    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from `root`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(root)? {
            Some((config, path)) => (config, Some(path)),
            None => (RiskmapConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if let Some(path) = &source_path {
        tracing::info!("using config: {}", path.display());
    }
    resolved.config_path = source_path;
    Ok(resolved)
}
